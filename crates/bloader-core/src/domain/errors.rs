//! Errors - エラー型と分類
//!
//! Every variant is fatal for the operation that produced it. Nothing here is
//! downgraded to a warning; the only retry in the system is the non-fatal
//! "field still pending" state between injection passes, which is not an error.

use std::time::Duration;

use thiserror::Error;

use super::state::{LifecycleState, Phase};
use crate::typed::SlotError;

/// Error type returned by lifecycle hooks and providers.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("bootloader: {name} has been added")]
    DuplicateRegistration { name: String },

    #[error("bootloader: module {module}, field {field}: the injection was not completed")]
    UnresolvedDependency { module: String, field: &'static str },

    #[error("bootloader: module {module}, field {field}: properties not set")]
    PropertyStoreUnset { module: String, field: &'static str },

    #[error("bootloader: unable to {phase} module {module}, state {actual} expected {expected}")]
    LifecycleOrderViolation {
        module: String,
        phase: Phase,
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("bootloader: maximum provider depth {max} exceeded")]
    DepthExceeded { max: usize },

    #[error("bootloader: module {module}, field {field}: {source}")]
    Injection {
        module: String,
        field: &'static str,
        #[source]
        source: SlotError,
    },

    #[error("bootloader: module {name} not found")]
    ModuleNotFound { name: String },

    #[error("bootloader: module {name} is {actual}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("bootloader: property {name} not found")]
    PropertyNotFound { name: String },

    #[error("bootloader: property {name} does not fit {expected}: {source}")]
    PropertyType {
        name: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("bootloader: properties could not be serialized: {0}")]
    Properties(#[source] serde_json::Error),

    #[error("bootloader: {phase} {module} failed: {source}")]
    Hook {
        module: String,
        phase: Phase,
        #[source]
        source: HookError,
    },

    #[error("bootloader: {phase} {module} panicked")]
    HookPanicked { module: String, phase: Phase },

    #[error("bootloader: {phase} phase did not finish within {timeout:?}")]
    PhaseTimeout { phase: Phase, timeout: Duration },

    #[error("bootloader: provider failed: {0}")]
    Provider(#[source] HookError),

    #[error("bootloader: invalid configuration: {0}")]
    Config(#[from] figment::Error),
}

impl BootError {
    /// Name of the module the error is about, when there is one.
    pub fn module(&self) -> Option<&str> {
        match self {
            BootError::UnresolvedDependency { module, .. }
            | BootError::PropertyStoreUnset { module, .. }
            | BootError::LifecycleOrderViolation { module, .. }
            | BootError::Injection { module, .. }
            | BootError::Hook { module, .. }
            | BootError::HookPanicked { module, .. } => Some(module.as_str()),
            _ => None,
        }
    }

    /// Name of the field the error is about, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            BootError::UnresolvedDependency { field, .. }
            | BootError::PropertyStoreUnset { field, .. }
            | BootError::Injection { field, .. } => Some(*field),
            _ => None,
        }
    }
}
