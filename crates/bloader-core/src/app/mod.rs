//! App - アプリケーション層
//!
//! registry / properties / typed を組み合わせて起動処理を実装します。
//!
//! # 主要コンポーネント
//! - **Bootloader**: 登録・注入・フェーズ実行のオーケストレーター
//! - **Injector**: fixed-point 依存解決
//! - **PhaseRunner**: 1 フェーズ = 並行 task + barrier
//! - **LifecycleContext**: hook に渡す loader id / log flag / shutdown signal
//! - **BootConfig**: figment による設定読み込み
//! - **Status**: ステータススナップショット

pub mod bootloader;
pub mod config;
pub mod context;
pub mod injector;
pub mod phase;
pub mod status;

// 主要な型を再エクスポート
pub use self::bootloader::{Bootloader, BootloaderBuilder};
pub use self::config::{BootConfig, ENV_PREFIX};
pub use self::context::{LifecycleContext, Shutdown};
pub use self::injector::{CompletedHook, FieldHook, Injector};
pub use self::phase::PhaseRunner;
pub use self::status::{ModuleStatus, PhaseMark, StateCounts, Status};
