//! Module trait - 登録されるコンポーネントの定義
//!
//! # 学習ポイント
//! - 静的なフィールド宣言（リフレクションの代わり）
//! - Optional capability: `as_on_create()` などが `Some(self)` を返す
//! - Object-safe trait (`dyn Module`) と `where Self: Sized` の組み合わせ

use async_trait::async_trait;

use super::slot::Slot;
use crate::app::LifecycleContext;
use crate::domain::{HookError, InjectTag};

/// Runs once per module in the Create phase.
#[async_trait]
pub trait OnCreate: Send + Sync {
    async fn on_create(&self, ctx: &LifecycleContext) -> Result<(), HookError>;
}

/// Runs once per module in the Mount phase, after every field is injected.
#[async_trait]
pub trait OnMount: Send + Sync {
    async fn on_mount(&self, ctx: &LifecycleContext) -> Result<(), HookError>;
}

/// Runs once per module in the Start phase.
#[async_trait]
pub trait OnStart: Send + Sync {
    async fn on_start(&self, ctx: &LifecycleContext) -> Result<(), HookError>;
}

/// Runs once per module in the Destroy phase, during shutdown.
#[async_trait]
pub trait OnDestroy: Send + Sync {
    async fn on_destroy(&self, ctx: &LifecycleContext) -> Result<(), HookError>;
}

/// A component that can be registered with a `Bootloader`.
///
/// # 使用例
/// ```ignore
/// #[derive(Default)]
/// struct Server {
///     users: Inject<UserService>,
///     port: Property<u16>,
/// }
///
/// impl Module for Server {
///     fn fields() -> Vec<Field<Self>> {
///         vec![
///             Field::named("users", "user-service", |s: &Self| &s.users),
///             Field::property("port", "server.port", |s: &Self| &s.port),
///         ]
///     }
///
///     fn as_on_start(&self) -> Option<&dyn OnStart> {
///         Some(self)
///     }
/// }
/// ```
///
/// Fields not listed in [`Module::fields`] are never touched by the injector.
pub trait Module: Send + Sync + 'static {
    /// Injectable fields in declaration order.
    fn fields() -> Vec<Field<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }

    fn as_on_create(&self) -> Option<&dyn OnCreate> {
        None
    }

    fn as_on_mount(&self) -> Option<&dyn OnMount> {
        None
    }

    fn as_on_start(&self) -> Option<&dyn OnStart> {
        None
    }

    fn as_on_destroy(&self) -> Option<&dyn OnDestroy> {
        None
    }
}

/// Accessor from a module to one of its slots.
pub type SlotAccessor<M> = for<'a> fn(&'a M) -> &'a dyn Slot;

/// Declaration of one injectable field: `(name, tag, accessor)`.
pub struct Field<M> {
    name: &'static str,
    tag: InjectTag,
    slot: SlotAccessor<M>,
}

impl<M> Field<M> {
    /// Resolve by registry name.
    pub fn named(name: &'static str, target: impl Into<String>, slot: SlotAccessor<M>) -> Self {
        Self {
            name,
            tag: InjectTag::Name(target.into()),
            slot,
        }
    }

    /// Resolve by the slot's declared type.
    pub fn auto(name: &'static str, slot: SlotAccessor<M>) -> Self {
        Self {
            name,
            tag: InjectTag::Auto,
            slot,
        }
    }

    /// Resolve from the property store.
    pub fn property(name: &'static str, path: impl Into<String>, slot: SlotAccessor<M>) -> Self {
        Self {
            name,
            tag: InjectTag::Property(path.into()),
            slot,
        }
    }

    /// Build from a raw tag string. An empty tag means "not injectable".
    pub fn tagged(name: &'static str, raw: &str, slot: SlotAccessor<M>) -> Option<Self> {
        InjectTag::parse(raw).map(|tag| Self { name, tag, slot })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> &InjectTag {
        &self.tag
    }

    pub fn slot<'a>(&self, module: &'a M) -> &'a dyn Slot {
        (self.slot)(module)
    }
}
