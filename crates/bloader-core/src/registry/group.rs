//! Group - モジュールの登録と検索
//!
//! Design:
//! - `named`: name -> wrapper (unique names)
//! - `modules`: every wrapper (named and anonymous), registration order
//! - `ignores`: names whose later registration is silently dropped
//! - Invariant: every wrapper in `named` is also in `modules`
//!
//! The lock is never held while the after-added callback runs, so the
//! callback may freely read the group again.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::wrapped::ModuleWrapper;
use crate::domain::{BootError, LifecycleState, Phase};

/// Called after a wrapper has been stored. It cannot fail the registration.
pub type AfterAdded = Box<dyn Fn(&Group, &Arc<ModuleWrapper>) + Send + Sync>;

#[derive(Default)]
struct GroupInner {
    named: HashMap<String, Arc<ModuleWrapper>>,
    modules: Vec<Arc<ModuleWrapper>>,
    ignores: HashSet<String>,
}

#[derive(Default)]
pub struct Group {
    inner: RwLock<GroupInner>,
    after_added: Option<AfterAdded>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_after_added(after_added: AfterAdded) -> Self {
        Self {
            inner: RwLock::new(GroupInner::default()),
            after_added: Some(after_added),
        }
    }

    pub fn set_ignores<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.write();
        inner.ignores.extend(names.into_iter().map(Into::into));
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.inner.read().ignores.contains(name)
    }

    /// Register under `name`.
    ///
    /// - `Ok(false)`: the name is ignored, nothing stored.
    /// - `Err(DuplicateRegistration)`: the name is taken; the first one stays.
    /// - `Ok(true)`: stored, after-added callback ran.
    ///
    /// An `Err` always means nothing was stored.
    pub fn add_by_name(&self, name: &str, wrapper: Arc<ModuleWrapper>) -> Result<bool, BootError> {
        {
            let mut inner = self.inner.write();
            if inner.ignores.contains(name) {
                return Ok(false);
            }
            if inner.named.contains_key(name) {
                return Err(BootError::DuplicateRegistration {
                    name: name.to_string(),
                });
            }
            inner.named.insert(name.to_string(), wrapper.clone());
            inner.modules.push(wrapper.clone());
        }
        self.after_added(&wrapper);
        Ok(true)
    }

    /// Register without a name (type lookup only).
    pub fn add_by_type(&self, wrapper: Arc<ModuleWrapper>) -> Result<bool, BootError> {
        self.inner.write().modules.push(wrapper.clone());
        self.after_added(&wrapper);
        Ok(true)
    }

    fn after_added(&self, wrapper: &Arc<ModuleWrapper>) {
        if let Some(callback) = &self.after_added {
            callback(self, wrapper);
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        self.inner.read().named.get(name).cloned()
    }

    /// Exact type first; otherwise the first module (registration order)
    /// that can be viewed as `wanted`.
    ///
    /// When several modules only convert to `wanted`, the first registered one
    /// wins silently.
    pub fn find_by_type(&self, wanted: TypeId) -> Option<Arc<ModuleWrapper>> {
        let inner = self.inner.read();
        inner
            .modules
            .iter()
            .find(|m| m.entry().is_exactly(wanted))
            .or_else(|| inner.modules.iter().find(|m| m.entry().converts_to(wanted)))
            .cloned()
    }

    /// Snapshot in registration order.
    pub fn list(&self) -> Vec<Arc<ModuleWrapper>> {
        self.inner.read().modules.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().modules.is_empty()
    }

    /// Every module must be fully injected. Reverse registration order, so the
    /// most recently declared (usually most dependent) module fails first.
    pub fn verify(&self) -> Result<(), BootError> {
        let inner = self.inner.read();
        for wrapper in inner.modules.iter().rev() {
            wrapper.must_inject()?;
        }
        Ok(())
    }

    /// Remove a named module that has not entered any lifecycle phase.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<ModuleWrapper>>, BootError> {
        let mut inner = self.inner.write();
        let Some(wrapper) = inner.named.get(name).cloned() else {
            return Ok(None);
        };
        let state = wrapper.state();
        if state != LifecycleState::Initial {
            return Err(BootError::LifecycleOrderViolation {
                module: wrapper.label(),
                phase: Phase::Create,
                expected: LifecycleState::Initial,
                actual: state,
            });
        }
        inner.named.remove(name);
        inner.modules.retain(|m| !Arc::ptr_eq(m, &wrapper));
        Ok(Some(wrapper))
    }
}
