//! ModuleWrapper: one registered module plus its injection latch and
//! lifecycle state machine.
//!
//! Design:
//! - `injected` is a monotonic latch (false -> true, never reset).
//! - `state` moves strictly forward. Every phase is a compare-and-set from the
//!   exact predecessor state; anything else is a `LifecycleOrderViolation`.
//! - A failing hook leaves the module in the in-progress state of that phase,
//!   so it is never picked up by a later phase.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::{debug, info};

use crate::app::LifecycleContext;
use crate::domain::{BootError, LifecycleState, ModuleId, Phase};
use crate::typed::{FieldRef, ModuleEntry};

pub struct ModuleWrapper {
    id: ModuleId,
    name: Option<String>,
    entry: ModuleEntry,
    injected: AtomicBool,
    state: AtomicU8,
}

impl ModuleWrapper {
    /// Wrap an anonymous (type-only) module.
    pub fn new(entry: ModuleEntry) -> Self {
        Self {
            id: ModuleId::generate(),
            name: None,
            entry,
            injected: AtomicBool::new(false),
            state: AtomicU8::new(LifecycleState::Initial.as_u8()),
        }
    }

    pub fn named(name: impl Into<String>, entry: ModuleEntry) -> Self {
        let mut wrapper = Self::new(entry);
        wrapper.name = Some(name.into());
        wrapper
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Type path of the wrapped instance.
    pub fn path(&self) -> &'static str {
        self.entry.type_name()
    }

    /// Human readable identity used in errors and logs.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({name})", self.path()),
            None => self.path().to_string(),
        }
    }

    pub fn entry(&self) -> &ModuleEntry {
        &self.entry
    }

    pub fn field_count(&self) -> usize {
        self.entry.field_count()
    }

    /// Stored fields (reverse declaration order); `.rev()` walks them from the end.
    pub fn fields(&self) -> impl DoubleEndedIterator<Item = FieldRef<'_>> {
        (0..self.entry.field_count()).map(|i| self.entry.field(i))
    }

    pub fn is_injected(&self) -> bool {
        self.injected.load(Ordering::Acquire)
    }

    /// Is there injection work left?
    ///
    /// Returns `false` when the module has no fields or was already seen fully
    /// injected. Otherwise returns `true` if some field is still pending, and
    /// latches `injected` the first time nothing is pending.
    pub fn try_inject(&self) -> bool {
        if self.field_count() == 0 || self.is_injected() {
            return false;
        }
        let pending = self.fields().any(|f| !f.slot.is_injected());
        if !pending {
            self.injected.store(true, Ordering::Release);
        }
        pending
    }

    /// Strict check: every declared field must be satisfied.
    pub fn must_inject(&self) -> Result<(), BootError> {
        if self.field_count() == 0 || self.is_injected() {
            return Ok(());
        }
        if let Some(field) = self.fields().find(|f| !f.slot.is_injected()) {
            return Err(BootError::UnresolvedDependency {
                module: self.label(),
                field: field.name,
            });
        }
        self.injected.store(true, Ordering::Release);
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        // only ever written with valid discriminants
        LifecycleState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(LifecycleState::Initial)
    }

    pub async fn create(&self, ctx: &LifecycleContext) -> Result<(), BootError> {
        self.run(Phase::Create, ctx).await
    }

    pub async fn mount(&self, ctx: &LifecycleContext) -> Result<(), BootError> {
        self.run(Phase::Mount, ctx).await
    }

    pub async fn start(&self, ctx: &LifecycleContext) -> Result<(), BootError> {
        self.run(Phase::Start, ctx).await
    }

    pub async fn destroy(&self, ctx: &LifecycleContext) -> Result<(), BootError> {
        self.run(Phase::Destroy, ctx).await
    }

    /// Run one phase: CAS into the running state, invoke the hook (if the
    /// module has that capability), store the done state.
    ///
    /// Mount additionally requires every field to be injected.
    pub async fn run(&self, phase: Phase, ctx: &LifecycleContext) -> Result<(), BootError> {
        if phase == Phase::Mount {
            self.must_inject()?;
        }
        self.advance(phase.expected(), phase.running(), phase)?;

        let hooks = self.entry.hooks();
        let outcome = match phase {
            Phase::Create => match hooks.as_on_create() {
                Some(hook) => Some(self.traced(phase, ctx, hook.on_create(ctx)).await),
                None => None,
            },
            Phase::Mount => match hooks.as_on_mount() {
                Some(hook) => Some(self.traced(phase, ctx, hook.on_mount(ctx)).await),
                None => None,
            },
            Phase::Start => match hooks.as_on_start() {
                Some(hook) => Some(self.traced(phase, ctx, hook.on_start(ctx)).await),
                None => None,
            },
            Phase::Destroy => match hooks.as_on_destroy() {
                Some(hook) => Some(self.traced(phase, ctx, hook.on_destroy(ctx)).await),
                None => None,
            },
        };

        if let Some(Err(source)) = outcome {
            return Err(BootError::Hook {
                module: self.label(),
                phase,
                source,
            });
        }
        self.state.store(phase.done().as_u8(), Ordering::Release);
        Ok(())
    }

    async fn traced<F, T>(&self, phase: Phase, ctx: &LifecycleContext, hook: F) -> T
    where
        F: Future<Output = T>,
    {
        if ctx.log_enabled() {
            info!(loader = %ctx.loader_id(), module = %self.label(), %phase, "bootloader: {phase} {} begin", self.path());
        }
        let out = hook.await;
        if ctx.log_enabled() {
            info!(loader = %ctx.loader_id(), module = %self.label(), %phase, "bootloader: {phase} {} end", self.path());
        }
        out
    }

    fn advance(&self, from: LifecycleState, to: LifecycleState, phase: Phase) -> Result<(), BootError> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| {
                debug!(module = %self.label(), %phase, "lifecycle order violation");
                BootError::LifecycleOrderViolation {
                    module: self.label(),
                    phase,
                    expected: from,
                    actual: LifecycleState::from_u8(actual).unwrap_or(LifecycleState::Initial),
                }
            })
    }
}

impl std::fmt::Debug for ModuleWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleWrapper")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path())
            .field("injected", &self.is_injected())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::LifecycleContext;
    use crate::domain::HookError;
    use crate::typed::{Field, Inject, Module, OnCreate, OnStart, Registration, Resolved};
    use async_trait::async_trait;
    use std::any::type_name;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Leaf;

    impl Module for Leaf {}

    #[derive(Default)]
    struct Needy {
        leaf: Inject<Leaf>,
        other: Inject<Leaf>,
    }

    impl Module for Needy {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::named("leaf", "leaf", |m: &Self| &m.leaf),
                Field::auto("other", |m: &Self| &m.other),
            ]
        }
    }

    #[derive(Default)]
    struct Counting {
        created: AtomicUsize,
        started: AtomicUsize,
    }

    impl Module for Counting {
        fn as_on_create(&self) -> Option<&dyn OnCreate> {
            Some(self)
        }

        fn as_on_start(&self) -> Option<&dyn OnStart> {
            Some(self)
        }
    }

    #[async_trait]
    impl OnCreate for Counting {
        async fn on_create(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl OnStart for Counting {
        async fn on_start(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Err("port in use".into())
        }
    }

    fn leaf_value() -> Resolved {
        Resolved::Module {
            handle: Box::new(Arc::new(Leaf)),
            type_name: type_name::<Leaf>(),
        }
    }

    #[test]
    fn try_inject_reports_pending_then_latches() {
        let wrapper = ModuleWrapper::new(Registration::new(Needy::default()).into_entry());
        assert!(wrapper.try_inject());
        assert!(!wrapper.is_injected());

        for field in wrapper.fields() {
            field.slot.assign(leaf_value()).unwrap();
        }

        assert!(!wrapper.try_inject());
        assert!(wrapper.is_injected());
        // latched: nothing to do any more
        assert!(!wrapper.try_inject());
    }

    #[test]
    fn fields_walk_both_ways() {
        let wrapper = ModuleWrapper::new(Registration::new(Needy::default()).into_entry());
        let forward: Vec<_> = wrapper.fields().map(|f| f.name).collect();
        let backward: Vec<_> = wrapper.fields().rev().map(|f| f.name).collect();
        assert_eq!(forward, ["other", "leaf"]);
        assert_eq!(backward, ["leaf", "other"]);
    }

    #[test]
    fn module_without_fields_has_nothing_to_do() {
        let wrapper = ModuleWrapper::new(Registration::new(Leaf).into_entry());
        assert!(!wrapper.try_inject());
        assert!(wrapper.must_inject().is_ok());
    }

    #[test]
    fn must_inject_names_the_missing_field() {
        let wrapper = ModuleWrapper::named("needy", Registration::new(Needy::default()).into_entry());
        // only the named field gets satisfied
        wrapper.fields().find(|f| f.name == "leaf").unwrap().slot.assign(leaf_value()).unwrap();

        let err = wrapper.must_inject().unwrap_err();
        assert!(matches!(err, BootError::UnresolvedDependency { field: "other", .. }));
        assert!(err.to_string().contains("Needy"));
        assert!(err.to_string().contains("needy"));
    }

    #[tokio::test]
    async fn phases_run_in_order_and_invoke_hooks() {
        let module = Arc::new(Counting::default());
        let wrapper = ModuleWrapper::new(Registration::from_arc(module.clone()).into_entry());
        let ctx = LifecycleContext::detached();

        wrapper.create(&ctx).await.unwrap();
        assert_eq!(wrapper.state(), LifecycleState::Created);
        assert_eq!(module.created.load(Ordering::SeqCst), 1);

        wrapper.mount(&ctx).await.unwrap();
        assert_eq!(wrapper.state(), LifecycleState::Mounted);

        let err = wrapper.start(&ctx).await.unwrap_err();
        assert!(matches!(err, BootError::Hook { phase: Phase::Start, .. }));
        assert_eq!(module.started.load(Ordering::SeqCst), 1);
        assert_eq!(wrapper.state(), LifecycleState::Starting);

        // a module that never finished starting cannot be destroyed
        let err = wrapper.destroy(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            BootError::LifecycleOrderViolation {
                expected: LifecycleState::Started,
                actual: LifecycleState::Starting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn out_of_order_phase_is_rejected() {
        let wrapper = ModuleWrapper::new(Registration::new(Leaf).into_entry());
        let ctx = LifecycleContext::detached();

        let err = wrapper.start(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            BootError::LifecycleOrderViolation {
                phase: Phase::Start,
                expected: LifecycleState::Mounted,
                actual: LifecycleState::Initial,
                ..
            }
        ));

        wrapper.create(&ctx).await.unwrap();
        let err = wrapper.create(&ctx).await.unwrap_err();
        assert!(matches!(err, BootError::LifecycleOrderViolation { phase: Phase::Create, .. }));
    }

    #[tokio::test]
    async fn full_cycle_without_hooks_still_advances() {
        let wrapper = ModuleWrapper::new(Registration::new(Leaf).into_entry());
        let ctx = LifecycleContext::detached();
        for phase in Phase::ORDER {
            wrapper.run(phase, &ctx).await.unwrap();
            assert_eq!(wrapper.state(), phase.done());
        }
        assert_eq!(wrapper.state(), LifecycleState::Destroyed);
    }

    #[tokio::test]
    async fn mount_requires_injection() {
        let wrapper = ModuleWrapper::new(Registration::new(Needy::default()).into_entry());
        let ctx = LifecycleContext::detached();
        wrapper.create(&ctx).await.unwrap();
        let err = wrapper.mount(&ctx).await.unwrap_err();
        assert!(matches!(err, BootError::UnresolvedDependency { .. }));
        assert_eq!(wrapper.state(), LifecycleState::Created);
    }
}
