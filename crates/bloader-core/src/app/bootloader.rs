//! Bootloader - 登録・注入・ライフサイクルのオーケストレーター
//!
//! # 学習ポイント
//! - Builder パターン（`BootloaderBuilder`）
//! - 起動時検証（Fail-fast: `launch()` は verify に通らないと hook を一切呼ばない）
//! - 並行フェーズ + barrier（`PhaseRunner`）
//!
//! # フロー
//! ```text
//! add / add_by_type ──> Group ──(after added)──> Injector::inject_all
//! launch: inject_all -> verify -> Create -> Mount -> Start
//! wait:   shutdown signal -> Destroy
//! ```

use std::any::{TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use super::config::BootConfig;
use super::context::{LifecycleContext, Shutdown};
use super::injector::Injector;
use super::phase::PhaseRunner;
use super::status::{PhaseMark, Status};
use crate::domain::{BootError, LoaderId, Phase};
use crate::properties::PropertyStore;
use crate::registry::{Group, ModuleWrapper};
use crate::typed::{FieldRef, Source};

/// BootloaderBuilder は Bootloader を構築
///
/// # 使用例
/// ```ignore
/// let loader = Bootloader::builder()
///     .log(false)
///     .phase_timeout(Duration::from_secs(5))
///     .ignore(["metrics"])
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct BootloaderBuilder {
    config: BootConfig,
    ignores: Vec<String>,
}

impl BootloaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting with `config`.
    pub fn config(mut self, config: BootConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.config.log = enabled;
        self
    }

    pub fn phase_timeout(mut self, timeout: Duration) -> Self {
        // saturate: a deadline beyond u64 millis is "forever" anyway
        self.config.phase_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn property_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.property_prefix = prefix.into();
        self
    }

    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignores.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Bootloader {
        let id = LoaderId::generate();
        let log = Arc::new(AtomicBool::new(self.config.log));
        let props = Arc::new(PropertyStore::new(self.config.property_prefix.clone()));
        let injector = Arc::new(injector_for(id, &log, props.clone()));

        let group = {
            let log = log.clone();
            let injector = injector.clone();
            Group::with_after_added(Box::new(
                move |group: &Group, wrapper: &Arc<ModuleWrapper>| {
                    if log.load(Ordering::Relaxed) {
                        info!(loader = %id, module = %wrapper.label(), "bootloader: registered {}", wrapper.label());
                    }
                    // other modules' faults resurface from set_properties / launch
                    if let Err(err) = injector.inject_all(group)
                        && log.load(Ordering::Relaxed)
                    {
                        warn!(loader = %id, error = %err, "bootloader: injection failed");
                    }
                },
            ))
        };
        group.set_ignores(self.ignores);

        Bootloader {
            id,
            log,
            group,
            props,
            injector,
            shutdown: Shutdown::new(),
            runner: PhaseRunner::new(self.config.phase_timeout()),
            phases: Mutex::new(Vec::new()),
        }
    }
}

fn injector_for(id: LoaderId, log: &Arc<AtomicBool>, props: Arc<PropertyStore>) -> Injector {
    let on_field = log.clone();
    let on_completed = log.clone();
    Injector::new(props)
        .on_field_injected(Box::new(move |module: &ModuleWrapper, field: &FieldRef<'_>| {
            if on_field.load(Ordering::Relaxed) {
                info!(loader = %id, module = %module.label(), field = field.name, tag = %field.tag, "bootloader: injected {}.{}", module.path(), field.name);
            }
        }))
        .on_completed(Box::new(move |module: &Arc<ModuleWrapper>| {
            if on_completed.load(Ordering::Relaxed) {
                info!(loader = %id, module = %module.label(), "bootloader: {} fully injected", module.label());
            }
        }))
}

/// The orchestrator: owns the registry, the property store and the
/// shutdown signal of one application.
///
/// All methods take `&self`; share it with `Arc<Bootloader>` when another
/// task needs to call `shutdown()`.
pub struct Bootloader {
    id: LoaderId,
    log: Arc<AtomicBool>,
    group: Group,
    props: Arc<PropertyStore>,
    injector: Arc<Injector>,
    shutdown: Shutdown,
    runner: PhaseRunner,
    phases: Mutex<Vec<PhaseMark>>,
}

impl Bootloader {
    /// Default settings; the environment is not consulted.
    pub fn new() -> Self {
        BootloaderBuilder::new().build()
    }

    pub fn builder() -> BootloaderBuilder {
        BootloaderBuilder::new()
    }

    pub fn from_config(config: BootConfig) -> Self {
        BootloaderBuilder::new().config(config).build()
    }

    /// Defaults merged with `APP_BLOADER_*` environment variables.
    pub fn from_env() -> Result<Self, BootError> {
        Ok(Self::from_config(BootConfig::load()?))
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn show_log(&self, enabled: bool) {
        self.log.store(enabled, Ordering::Relaxed);
    }

    pub fn log_enabled(&self) -> bool {
        self.log.load(Ordering::Relaxed)
    }

    // ========================================
    // 登録
    // ========================================

    /// Register under `name`. Returns `Ok(false)` when the name is ignored.
    ///
    /// The module's own fields are resolved against the current group before
    /// it is stored; a fault there (unset property store, incompatible target,
    /// undeserializable property) rejects it and nothing is stored. Every
    /// successful registration then runs one injection pass over the whole
    /// group.
    pub fn add(&self, name: &str, source: impl Into<Source>) -> Result<bool, BootError> {
        if self.group.is_ignored(name) {
            if self.log_enabled() {
                info!(loader = %self.id, name, "bootloader: ignored {name}");
            }
            return Ok(false);
        }
        let wrapper = Arc::new(ModuleWrapper::named(name, source.into().into_entry()?));
        self.injector.inject(&self.group, &wrapper)?;
        self.group.add_by_name(name, wrapper)
    }

    /// Register without a name; reachable through `auto` fields and `find`.
    pub fn add_by_type(&self, source: impl Into<Source>) -> Result<bool, BootError> {
        let wrapper = Arc::new(ModuleWrapper::new(source.into().into_entry()?));
        self.injector.inject(&self.group, &wrapper)?;
        self.group.add_by_type(wrapper)
    }

    pub fn set_ignores<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group.set_ignores(names);
    }

    /// Unregister a module that has not entered any phase yet.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<ModuleWrapper>>, BootError> {
        self.group.remove(name)
    }

    // ========================================
    // プロパティ
    // ========================================

    /// Merge `data` into the property store, then retry pending fields.
    pub fn set_properties<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), BootError> {
        self.props.set(data).map_err(BootError::Properties)?;
        self.injector.inject_all(&self.group)
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.props.value(name)
    }

    pub fn must_property(&self, name: &str) -> Result<Value, BootError> {
        self.property(name).ok_or_else(|| BootError::PropertyNotFound {
            name: name.to_string(),
        })
    }

    pub fn property_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, BootError> {
        serde_json::from_value(self.must_property(name)?).map_err(|source| BootError::PropertyType {
            name: name.to_string(),
            expected: type_name::<T>(),
            source,
        })
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.props
    }

    // ========================================
    // 検索
    // ========================================

    /// Named module viewed as `T` (its own type or a declared alias).
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.group.find_by_name(name)?.entry().downcast::<T>()
    }

    pub fn must_get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, BootError> {
        let wrapper = self.group.find_by_name(name).ok_or_else(|| BootError::ModuleNotFound {
            name: name.to_string(),
        })?;
        wrapper.entry().downcast::<T>().ok_or_else(|| BootError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            actual: wrapper.path(),
        })
    }

    /// Same lookup rule as `auto` fields: exact type, then first convertible.
    pub fn find<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.group.find_by_type(TypeId::of::<T>())?.entry().downcast::<T>()
    }

    pub fn modules(&self) -> Vec<Arc<ModuleWrapper>> {
        self.group.list()
    }

    // ========================================
    // ライフサイクル
    // ========================================

    /// Inject, verify, then run Create, Mount and Start, each behind a
    /// barrier. The first failing phase stops the launch.
    pub async fn launch(&self) -> Result<(), BootError> {
        self.injector.inject_all(&self.group)?;
        self.injector.verify(&self.group)?;

        let ctx = self.context();
        for phase in [Phase::Create, Phase::Mount, Phase::Start] {
            self.run_phase(phase, &ctx).await?;
        }
        Ok(())
    }

    /// Block until `shutdown()` is called, then run Destroy.
    pub async fn wait(&self) -> Result<(), BootError> {
        self.shutdown.requested().await;
        if self.log_enabled() {
            info!(loader = %self.id, "bootloader: shutdown requested");
        }
        self.run_phase(Phase::Destroy, &self.context()).await
    }

    /// `launch()` then `wait()`.
    pub async fn run(&self) -> Result<(), BootError> {
        self.launch().await?;
        self.wait().await
    }

    /// Advisory: hooks see it through their context; nothing is aborted.
    pub fn shutdown(&self) {
        self.shutdown.request();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Wire everything without running any lifecycle hook, then hand the
    /// loader to `f`.
    pub fn test_unit<R>(&self, f: impl FnOnce(&Bootloader) -> R) -> Result<R, BootError> {
        self.injector.inject_all(&self.group)?;
        self.injector.verify(&self.group)?;
        Ok(f(self))
    }

    pub fn status(&self) -> Status {
        Status::collect(
            self.id,
            self.shutdown.is_requested(),
            self.props.len(),
            &self.group.list(),
            self.phases.lock().clone(),
        )
    }

    fn context(&self) -> LifecycleContext {
        LifecycleContext::new(self.id, self.log_enabled(), &self.shutdown)
    }

    async fn run_phase(&self, phase: Phase, ctx: &LifecycleContext) -> Result<(), BootError> {
        let result = self.runner.run(phase, self.group.list(), ctx).await;
        match &result {
            Ok(()) => {
                self.phases.lock().push(PhaseMark::now(phase));
                if self.log_enabled() {
                    info!(loader = %self.id, %phase, "bootloader: {phase} phase complete");
                }
            }
            Err(err) => {
                if self.log_enabled() {
                    warn!(loader = %self.id, %phase, error = %err, "bootloader: {phase} phase failed");
                }
            }
        }
        result
    }
}

impl Default for Bootloader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bootloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootloader")
            .field("id", &self.id)
            .field("modules", &self.group.len())
            .field("log", &self.log_enabled())
            .finish()
    }
}
