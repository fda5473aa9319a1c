//! Injector - 依存解決（fixed-point）
//!
//! # フロー
//! 1. `inject_all()` は group のスナップショットを逆順に走査
//! 2. 各 module で `try_inject()` が true なら未解決フィールドを解決
//! 3. 解決先が未登録ならそのまま（次のパスで再挑戦）
//! 4. 全フィールドが揃ったら completed callback
//!
//! Resolution is not topological: every registration triggers another pass,
//! so a module registered later can satisfy a field of one registered earlier.
//! A field that has been assigned is never touched again.
//!
//! Passes are serialized by `pass`: concurrent registrations never resolve
//! the same field twice, and the completed callback fires once per module.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{BootError, InjectTag};
use crate::properties::PropertyStore;
use crate::registry::{Group, ModuleWrapper};
use crate::typed::{FieldRef, Resolved, Slot, SlotError};

/// Called after a field has been assigned.
pub type FieldHook = Box<dyn Fn(&ModuleWrapper, &FieldRef<'_>) + Send + Sync>;

/// Called once per module, when its last pending field is assigned.
pub type CompletedHook = Box<dyn Fn(&Arc<ModuleWrapper>) + Send + Sync>;

pub struct Injector {
    props: Arc<PropertyStore>,
    pass: Mutex<()>,
    on_field_injected: Option<FieldHook>,
    on_completed: Option<CompletedHook>,
}

impl Injector {
    pub fn new(props: Arc<PropertyStore>) -> Self {
        Self {
            props,
            pass: Mutex::new(()),
            on_field_injected: None,
            on_completed: None,
        }
    }

    pub fn on_field_injected(mut self, hook: FieldHook) -> Self {
        self.on_field_injected = Some(hook);
        self
    }

    pub fn on_completed(mut self, hook: CompletedHook) -> Self {
        self.on_completed = Some(hook);
        self
    }

    /// One pass over every module, reverse registration order.
    ///
    /// A failing module does not stop the pass; the first error is returned
    /// once every module has been visited.
    pub fn inject_all(&self, group: &Group) -> Result<(), BootError> {
        let _pass = self.pass.lock();
        let mut first = None;
        for module in group.list().iter().rev() {
            if let Err(err) = self.inject_locked(group, module) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Try to resolve every pending field of one module. `module` need not be
    /// stored in `group` yet.
    pub fn inject(&self, group: &Group, module: &Arc<ModuleWrapper>) -> Result<(), BootError> {
        let _pass = self.pass.lock();
        self.inject_locked(group, module)
    }

    fn inject_locked(&self, group: &Group, module: &Arc<ModuleWrapper>) -> Result<(), BootError> {
        if !module.try_inject() {
            return Ok(());
        }

        for field in module.fields().rev() {
            if field.slot.is_injected() {
                continue;
            }
            self.inject_field(group, module, &field)?;
        }

        if !module.try_inject()
            && let Some(hook) = &self.on_completed
        {
            hook(module);
        }
        Ok(())
    }

    /// Post-condition: no module may still have a pending field.
    pub fn verify(&self, group: &Group) -> Result<(), BootError> {
        group.verify()
    }

    fn inject_field(
        &self,
        group: &Group,
        module: &ModuleWrapper,
        field: &FieldRef<'_>,
    ) -> Result<(), BootError> {
        let resolved = match field.tag {
            InjectTag::Name(name) => group
                .find_by_name(name)
                .map(|target| view_for(&target, field.slot)),
            InjectTag::Auto => group
                .find_by_type(field.slot.wanted())
                .map(|target| view_for(&target, field.slot)),
            InjectTag::Property(path) => {
                if !self.props.is_configured() {
                    return Err(BootError::PropertyStoreUnset {
                        module: module.label(),
                        field: field.name,
                    });
                }
                self.props.value(path).map(|value| Ok(Resolved::Property(value)))
            }
        };

        // target not registered yet: stays pending
        let Some(resolved) = resolved else {
            return Ok(());
        };

        resolved
            .and_then(|value| field.slot.assign(value))
            .map_err(|source| BootError::Injection {
                module: module.label(),
                field: field.name,
                source,
            })?;

        if let Some(hook) = &self.on_field_injected {
            hook(module, field);
        }
        Ok(())
    }
}

fn view_for(target: &ModuleWrapper, slot: &dyn Slot) -> Result<Resolved, SlotError> {
    target
        .entry()
        .view(slot.wanted())
        .ok_or(SlotError::IncompatibleModule {
            expected: slot.wanted_name(),
            actual: target.path(),
        })
}
