//! bloader-core
//!
//! Process-local module registry and dependency-injection runtime.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, lifecycle state, inject tag, errors）
//! - **typed**: 型付き Module API（Module trait, Registration, Inject/Property slots）
//! - **properties**: 階層設定のフラット化ストア
//! - **registry**: ModuleWrapper（状態機械）と Group（名前 / 型検索）
//! - **app**: Bootloader, Injector, PhaseRunner, BootConfig, Status
//! - **global**: アプリ境界用のデフォルト Bootloader
//!
//! # 使用例
//! ```ignore
//! let loader = Bootloader::builder().build();
//! loader.set_properties(&serde_json::json!({"server": {"port": 8080}}))?;
//! loader.add("db", Registration::new(Database::default()))?;
//! loader.add_by_type(Registration::new(Server::default()))?;
//! loader.launch().await?;
//! ```

pub mod app;
pub mod domain;
pub mod global;
pub mod properties;
pub mod registry;
pub mod typed;

pub use crate::app::{BootConfig, Bootloader, BootloaderBuilder, LifecycleContext, Status};
pub use crate::domain::{BootError, HookError, LifecycleState, Phase};
pub use crate::properties::PropertyStore;
pub use crate::typed::{
    Field, Inject, Module, OnCreate, OnDestroy, OnMount, OnStart, Property, Registration, Source,
};
