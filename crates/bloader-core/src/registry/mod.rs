//! Registry: module wrappers and the group that holds them.

pub mod group;
pub mod wrapped;

pub use self::group::{AfterAdded, Group};
pub use self::wrapped::ModuleWrapper;
