//! Process-wide default `Bootloader` for application edges (`main`, demos).
//!
//! Library code should take a `&Bootloader` instead. The default loader is
//! created on first use from `APP_BLOADER_*` environment variables; an
//! unreadable environment falls back to the defaults.

use std::sync::{Arc, LazyLock};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::app::{BootConfig, Bootloader, Status};
use crate::domain::BootError;
use crate::typed::Source;

static GLOBAL: LazyLock<Bootloader> = LazyLock::new(|| {
    let config = BootConfig::load().unwrap_or_else(|err| {
        warn!(error = %err, "bootloader: ignoring invalid environment");
        BootConfig::default()
    });
    Bootloader::from_config(config)
});

pub fn global() -> &'static Bootloader {
    &GLOBAL
}

pub fn add(name: &str, source: impl Into<Source>) -> Result<bool, BootError> {
    GLOBAL.add(name, source)
}

pub fn add_by_type(source: impl Into<Source>) -> Result<bool, BootError> {
    GLOBAL.add_by_type(source)
}

pub fn get<T: ?Sized + Send + Sync + 'static>(name: &str) -> Option<Arc<T>> {
    GLOBAL.get(name)
}

pub fn must_get<T: ?Sized + Send + Sync + 'static>(name: &str) -> Result<Arc<T>, BootError> {
    GLOBAL.must_get(name)
}

pub fn set_ignores<I, S>(names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    GLOBAL.set_ignores(names);
}

pub fn set_properties<T: Serialize + ?Sized>(data: &T) -> Result<(), BootError> {
    GLOBAL.set_properties(data)
}

pub fn property(name: &str) -> Option<Value> {
    GLOBAL.property(name)
}

pub fn must_property(name: &str) -> Result<Value, BootError> {
    GLOBAL.must_property(name)
}

pub async fn launch() -> Result<(), BootError> {
    GLOBAL.launch().await
}

pub async fn wait() -> Result<(), BootError> {
    GLOBAL.wait().await
}

pub async fn run() -> Result<(), BootError> {
    GLOBAL.run().await
}

pub fn shutdown() {
    GLOBAL.shutdown();
}

pub fn show_log(enabled: bool) {
    GLOBAL.show_log(enabled);
}

pub fn test_unit<R>(f: impl FnOnce(&Bootloader) -> R) -> Result<R, BootError> {
    GLOBAL.test_unit(f)
}

pub fn status() -> Status {
    GLOBAL.status()
}
