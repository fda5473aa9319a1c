//! LifecycleContext - hook に渡されるコンテキスト
//!
//! Shutdown is advisory: `Bootloader::shutdown()` flips a watch channel, hooks
//! may observe it through the context, but nothing running is aborted.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::LoaderId;

/// Owner side of the shutdown signal.
///
/// - `request()` で全 hook に通知される
/// - 何度呼んでも同じ（冪等）
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn request(&self) {
        // send_replace works without live receivers
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once `request()` has been called.
    pub async fn requested(&self) {
        let mut rx = self.subscribe();
        // the sender lives in `self`, so this cannot observe a closed channel
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Passed to every lifecycle hook.
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    loader: LoaderId,
    log: bool,
    shutdown: watch::Receiver<bool>,
    _owned: Option<Arc<Shutdown>>,
}

impl LifecycleContext {
    pub(crate) fn new(loader: LoaderId, log: bool, shutdown: &Shutdown) -> Self {
        Self {
            loader,
            log,
            shutdown: shutdown.subscribe(),
            _owned: None,
        }
    }

    /// A context not tied to any `Bootloader`. Shutdown is never signalled.
    pub fn detached() -> Self {
        let shutdown = Arc::new(Shutdown::new());
        Self {
            loader: LoaderId::generate(),
            log: false,
            shutdown: shutdown.subscribe(),
            _owned: Some(shutdown),
        }
    }

    pub fn loader_id(&self) -> LoaderId {
        self.loader
    }

    pub fn log_enabled(&self) -> bool {
        self.log
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested, or the loader is gone.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.clone();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}
