//! Module lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one module.
///
/// State transitions (strictly forward):
/// - Initial -> Creating -> Created
/// - Created -> Mounting -> Mounted
/// - Mounted -> Starting -> Started
/// - Started -> Destroying -> Destroyed
///
/// Stored as `u8` inside an `AtomicU8`; the discriminants are the wire values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Initial = 0,
    Creating = 1,
    Created = 2,
    Mounting = 3,
    Mounted = 4,
    Starting = 5,
    Started = 6,
    Destroying = 7,
    Destroyed = 8,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 9] = [
        LifecycleState::Initial,
        LifecycleState::Creating,
        LifecycleState::Created,
        LifecycleState::Mounting,
        LifecycleState::Mounted,
        LifecycleState::Starting,
        LifecycleState::Started,
        LifecycleState::Destroying,
        LifecycleState::Destroyed,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a value previously produced by [`LifecycleState::as_u8`].
    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Is a phase hook currently running?
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            LifecycleState::Creating
                | LifecycleState::Mounting
                | LifecycleState::Starting
                | LifecycleState::Destroying
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Initial => "initial",
            LifecycleState::Creating => "creating",
            LifecycleState::Created => "created",
            LifecycleState::Mounting => "mounting",
            LifecycleState::Mounted => "mounted",
            LifecycleState::Starting => "starting",
            LifecycleState::Started => "started",
            LifecycleState::Destroying => "destroying",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// One lifecycle phase. Each phase is a `from -> running -> done` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Create,
    Mount,
    Start,
    Destroy,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [Phase::Create, Phase::Mount, Phase::Start, Phase::Destroy];

    /// The state a module must be in before this phase may run.
    pub fn expected(self) -> LifecycleState {
        match self {
            Phase::Create => LifecycleState::Initial,
            Phase::Mount => LifecycleState::Created,
            Phase::Start => LifecycleState::Mounted,
            Phase::Destroy => LifecycleState::Started,
        }
    }

    pub fn running(self) -> LifecycleState {
        match self {
            Phase::Create => LifecycleState::Creating,
            Phase::Mount => LifecycleState::Mounting,
            Phase::Start => LifecycleState::Starting,
            Phase::Destroy => LifecycleState::Destroying,
        }
    }

    pub fn done(self) -> LifecycleState {
        match self {
            Phase::Create => LifecycleState::Created,
            Phase::Mount => LifecycleState::Mounted,
            Phase::Start => LifecycleState::Started,
            Phase::Destroy => LifecycleState::Destroyed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Create => "create",
            Phase::Mount => "mount",
            Phase::Start => "start",
            Phase::Destroy => "destroy",
        };
        f.write_str(s)
    }
}
