use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{Duration, interval};
use tracing::info;

use bloader_core::typed::Source;
use bloader_core::{
    BootError, Bootloader, Field, HookError, Inject, LifecycleContext, Module, OnCreate, OnDestroy,
    OnStart, Property, Registration,
};

#[derive(Debug, Clone, Serialize)]
struct User {
    username: String,
}

#[derive(Debug, Serialize)]
struct RuntimeInfo {
    os: &'static str,
    version: &'static str,
    num_cpu: usize,
}

impl Module for RuntimeInfo {}

/// Provider: the module is built only when it is registered.
fn runtime_info() -> Result<Source, HookError> {
    Ok(Registration::new(RuntimeInfo {
        os: std::env::consts::OS,
        version: env!("CARGO_PKG_VERSION"),
        num_cpu: std::thread::available_parallelism()?.get(),
    })
    .into())
}

#[derive(Default)]
struct UserService {
    user: RwLock<Option<User>>,
}

impl UserService {
    fn user(&self) -> Option<User> {
        self.user.read().clone()
    }
}

impl Module for UserService {
    fn as_on_create(&self) -> Option<&dyn OnCreate> {
        Some(self)
    }
}

#[async_trait]
impl OnCreate for UserService {
    async fn on_create(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        *self.user.write() = Some(User {
            username: "root".into(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct Server {
    users: Inject<UserService>,
    runtime: Inject<RuntimeInfo>,
    port: Property<u16>,
    tick_ms: Property<u64>,
}

impl Server {
    fn home(&self) -> Result<String, HookError> {
        let body = serde_json::json!({
            "user": self.users.require()?.user(),
            "runtime": &**self.runtime.require()?,
        });
        Ok(body.to_string())
    }
}

impl Module for Server {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::named("users", "user-service", |m: &Self| &m.users),
            Field::auto("runtime", |m: &Self| &m.runtime),
            Field::property("port", "server.port", |m: &Self| &m.port),
            Field::property("tick_ms", "server.tick_ms", |m: &Self| &m.tick_ms),
        ]
    }

    fn as_on_start(&self) -> Option<&dyn OnStart> {
        Some(self)
    }

    fn as_on_destroy(&self) -> Option<&dyn OnDestroy> {
        Some(self)
    }
}

#[async_trait]
impl OnStart for Server {
    async fn on_start(&self, ctx: &LifecycleContext) -> Result<(), HookError> {
        let port = *self.port.require()?;
        let body = self.home()?;
        info!(port, "server started: GET / -> {body}");

        // heartbeat until shutdown; the hook itself returns right away
        let ctx = ctx.clone();
        let mut ticker = interval(Duration::from_millis(*self.tick_ms.require()?));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ctx.shutdown_requested() => break,
                    _ = ticker.tick() => info!(port, "server alive"),
                }
            }
        });
        Ok(())
    }
}

#[async_trait]
impl OnDestroy for Server {
    async fn on_destroy(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        info!("server stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), BootError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) 設定: APP_BLOADER_* の環境変数 + デフォルト
    let loader = Arc::new(Bootloader::from_env()?);
    loader.set_properties(&serde_json::json!({
        "Server": { "Port": 8888, "Tick_MS": 1000 }
    }))?;

    // (B) 登録順は自由（依存は fixed-point で解決される）
    loader.add_by_type(Registration::new(Server::default()))?;
    loader.add("user-service", Registration::new(UserService::default()))?;
    loader.add_by_type(Source::provider(runtime_info))?;

    // (C) Ctrl-C で shutdown
    {
        let loader = loader.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                loader.shutdown();
            }
        });
    }

    loader.run().await?;
    println!("{}", serde_json::to_string_pretty(&loader.status()).unwrap_or_default());
    Ok(())
}
