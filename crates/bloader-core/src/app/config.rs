//! BootConfig - 起動設定
//!
//! Configuration sources are merged in this order (later sources override earlier):
//! 1. Default values from `BootConfig::default()`
//! 2. Environment variables with prefix `APP_BLOADER_` (e.g. `APP_BLOADER_LOG=false`)
//!
//! `APP_BLOADER_LOG` is a toggle, not a strict bool: `true` in any case or an
//! empty value turns logging on, anything else turns it off.

use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::BootError;
use crate::properties::DEFAULT_PREFIX;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "APP_BLOADER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Emit registration / injection / lifecycle log events.
    #[serde(deserialize_with = "log_toggle")]
    pub log: bool,

    /// Deadline for each lifecycle phase barrier. `None` waits forever.
    pub phase_timeout_ms: Option<u64>,

    /// Prefix of every key in the property store.
    pub property_prefix: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            log: true,
            phase_timeout_ms: None,
            property_prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

fn log_toggle<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(enabled) => enabled,
        Value::String(text) => text.is_empty() || text.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

impl BootConfig {
    /// Defaults merged with `APP_BLOADER_*` environment variables.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(BootConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self, BootError> {
        Ok(Self::figment().extract()?)
    }

    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_ms.map(Duration::from_millis)
    }
}
