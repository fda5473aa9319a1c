//! Domain model (ids, lifecycle states, injection tags, errors).

pub mod errors;
pub mod ids;
pub mod state;
pub mod tag;

pub use self::errors::{BootError, HookError};
pub use self::ids::{LoaderId, ModuleId};
pub use self::state::{LifecycleState, Phase};
pub use self::tag::InjectTag;
