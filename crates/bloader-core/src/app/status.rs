//! Status - ステータスクエリ
//!
//! `Bootloader::status()` が返すスナップショット。
//! 各 module の state と injection、フェーズ完了時刻を含みます。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LifecycleState, LoaderId, ModuleId, Phase};
use crate::registry::ModuleWrapper;

/// Number of modules per lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub initial: usize,
    pub creating: usize,
    pub created: usize,
    pub mounting: usize,
    pub mounted: usize,
    pub starting: usize,
    pub started: usize,
    pub destroying: usize,
    pub destroyed: usize,
}

impl StateCounts {
    pub fn record(&mut self, state: LifecycleState) {
        let slot = match state {
            LifecycleState::Initial => &mut self.initial,
            LifecycleState::Creating => &mut self.creating,
            LifecycleState::Created => &mut self.created,
            LifecycleState::Mounting => &mut self.mounting,
            LifecycleState::Mounted => &mut self.mounted,
            LifecycleState::Starting => &mut self.starting,
            LifecycleState::Started => &mut self.started,
            LifecycleState::Destroying => &mut self.destroying,
            LifecycleState::Destroyed => &mut self.destroyed,
        };
        *slot += 1;
    }

    /// Modules whose hook is running right now (or failed mid-phase).
    pub fn in_flight(&self) -> usize {
        self.creating + self.mounting + self.starting + self.destroying
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub id: ModuleId,
    pub name: Option<String>,
    pub path: String,
    pub state: LifecycleState,
    /// No field left to resolve. Modules without fields count as injected.
    pub injected: bool,
}

impl ModuleStatus {
    pub fn of(wrapper: &ModuleWrapper) -> Self {
        Self {
            id: wrapper.id(),
            name: wrapper.name().map(str::to_string),
            path: wrapper.path().to_string(),
            state: wrapper.state(),
            injected: wrapper.field_count() == 0 || wrapper.is_injected(),
        }
    }
}

/// A phase barrier that completed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMark {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

impl PhaseMark {
    pub fn now(phase: Phase) -> Self {
        Self {
            phase,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub loader: LoaderId,
    pub shutdown_requested: bool,
    pub properties: usize,
    pub counts: StateCounts,
    pub modules: Vec<ModuleStatus>,
    pub phases: Vec<PhaseMark>,
}

impl Status {
    pub(crate) fn collect(
        loader: LoaderId,
        shutdown_requested: bool,
        properties: usize,
        modules: &[Arc<ModuleWrapper>],
        phases: Vec<PhaseMark>,
    ) -> Self {
        let mut counts = StateCounts::default();
        let modules = modules
            .iter()
            .map(|wrapper| {
                let status = ModuleStatus::of(wrapper);
                counts.record(status.state);
                status
            })
            .collect();
        Self {
            loader,
            shutdown_requested,
            properties,
            counts,
            modules,
            phases,
        }
    }

    pub fn completed(&self, phase: Phase) -> Option<DateTime<Utc>> {
        self.phases.iter().find(|m| m.phase == phase).map(|m| m.at)
    }

    /// Modules that still have a pending field.
    pub fn pending(&self) -> impl Iterator<Item = &ModuleStatus> {
        self.modules.iter().filter(|m| !m.injected)
    }
}
