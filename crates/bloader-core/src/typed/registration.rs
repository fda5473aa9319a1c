//! Registration - 型消去された登録エントリ
//!
//! # 学習ポイント
//! - Type erasure パターン (`Registration<M>` → `ModuleEntry`)
//! - `Arc<M>` を `Arc<dyn Trait>` として公開する「view」
//! - Provider チェーンと深さ制限

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use super::module::{Field, Module};
use super::slot::{Resolved, Slot};
use crate::domain::{BootError, HookError, InjectTag};

/// Maximum number of nested providers unwrapped for one registration.
///
/// Counts provider calls: five nested providers ending in a module are
/// accepted, a sixth is `DepthExceeded`.
pub const MAX_PROVIDER_DEPTH: usize = 5;

type MakeView = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// One type a module can be looked up as.
struct View {
    type_id: TypeId,
    type_name: &'static str,
    make: MakeView,
}

impl View {
    fn of<T: ?Sized + Send + Sync + 'static>(arc: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            make: Box::new(move || -> Box<dyn Any + Send + Sync> { Box::new(arc.clone()) }),
        }
    }

    fn resolve(&self) -> Resolved {
        Resolved::Module {
            handle: (self.make)(),
            type_name: self.type_name,
        }
    }
}

/// A module instance ready to be registered.
///
/// # 使用例
/// ```ignore
/// let reg = Registration::new(EnglishGreeter::default())
///     .provides::<dyn Greeter>(|m| m);
/// loader.add("greeter", reg)?;
/// ```
pub struct Registration<M: Module> {
    instance: Arc<M>,
    aliases: Vec<View>,
}

impl<M: Module> Registration<M> {
    pub fn new(module: M) -> Self {
        Self::from_arc(Arc::new(module))
    }

    pub fn from_arc(instance: Arc<M>) -> Self {
        Self {
            instance,
            aliases: Vec::new(),
        }
    }

    /// Also expose this module as `T` (usually a trait object) for `auto`
    /// lookups and typed `get`. This is the convertible fallback used when no
    /// module has `T` as its exact type.
    pub fn provides<T: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<M>) -> Arc<T>) -> Self {
        self.aliases.push(View::of(cast(self.instance.clone())));
        self
    }

    pub fn instance(&self) -> &Arc<M> {
        &self.instance
    }

    pub fn into_entry(self) -> ModuleEntry {
        let mut fields = M::fields();
        // stored in reverse declaration order
        fields.reverse();
        let hooks: Arc<dyn Module> = self.instance.clone();
        ModuleEntry {
            type_id: TypeId::of::<M>(),
            type_name: type_name::<M>(),
            exact: View::of(self.instance.clone()),
            aliases: self.aliases,
            hooks,
            fields: Box::new(TypedFields {
                instance: self.instance,
                fields,
            }),
        }
    }
}

/// Erased access to a module's declared fields.
trait FieldTable: Send + Sync {
    fn len(&self) -> usize;
    fn name(&self, index: usize) -> &'static str;
    fn tag(&self, index: usize) -> &InjectTag;
    fn slot(&self, index: usize) -> &dyn Slot;
}

struct TypedFields<M: Module> {
    instance: Arc<M>,
    fields: Vec<Field<M>>,
}

impl<M: Module> FieldTable for TypedFields<M> {
    fn len(&self) -> usize {
        self.fields.len()
    }

    fn name(&self, index: usize) -> &'static str {
        self.fields[index].name()
    }

    fn tag(&self, index: usize) -> &InjectTag {
        self.fields[index].tag()
    }

    fn slot(&self, index: usize) -> &dyn Slot {
        self.fields[index].slot(&self.instance)
    }
}

/// Borrowed view of one stored field.
pub struct FieldRef<'a> {
    pub name: &'static str,
    pub tag: &'a InjectTag,
    pub slot: &'a dyn Slot,
}

/// A type-erased registered module.
pub struct ModuleEntry {
    type_id: TypeId,
    type_name: &'static str,
    exact: View,
    aliases: Vec<View>,
    hooks: Arc<dyn Module>,
    fields: Box<dyn FieldTable>,
}

impl ModuleEntry {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn hooks(&self) -> &Arc<dyn Module> {
        &self.hooks
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field at `index` in stored (reverse declaration) order.
    pub fn field(&self, index: usize) -> FieldRef<'_> {
        FieldRef {
            name: self.fields.name(index),
            tag: self.fields.tag(index),
            slot: self.fields.slot(index),
        }
    }

    pub fn is_exactly(&self, wanted: TypeId) -> bool {
        self.type_id == wanted
    }

    pub fn converts_to(&self, wanted: TypeId) -> bool {
        self.aliases.iter().any(|v| v.type_id == wanted)
    }

    /// Produce a boxed `Arc<T>` for `wanted == TypeId::of::<T>()`: exact type
    /// first, then the first matching alias.
    pub fn view(&self, wanted: TypeId) -> Option<Resolved> {
        if self.exact.type_id == wanted {
            return Some(self.exact.resolve());
        }
        self.aliases
            .iter()
            .find(|v| v.type_id == wanted)
            .map(View::resolve)
    }

    /// Typed variant of [`ModuleEntry::view`].
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.view(TypeId::of::<T>())? {
            Resolved::Module { handle, .. } => handle.downcast::<Arc<T>>().ok().map(|arc| *arc),
            Resolved::Property(_) => None,
        }
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

/// Produces a module lazily, possibly through another provider.
pub trait Provider: Send {
    fn provide(self: Box<Self>) -> Result<Source, HookError>;
}

impl<F> Provider for F
where
    F: FnOnce() -> Result<Source, HookError> + Send,
{
    fn provide(self: Box<Self>) -> Result<Source, HookError> {
        (*self)()
    }
}

/// What `Bootloader::add` accepts: a module, or a provider of one.
pub enum Source {
    Module(ModuleEntry),
    Provider(Box<dyn Provider>),
}

impl Source {
    pub fn provider(provider: impl Provider + 'static) -> Self {
        Source::Provider(Box::new(provider))
    }

    /// Unwrap provider chains up to [`MAX_PROVIDER_DEPTH`] levels.
    pub fn into_entry(self) -> Result<ModuleEntry, BootError> {
        let mut current = self;
        for _ in 0..MAX_PROVIDER_DEPTH {
            match current {
                Source::Module(entry) => return Ok(entry),
                Source::Provider(provider) => {
                    current = provider.provide().map_err(BootError::Provider)?;
                }
            }
        }
        match current {
            Source::Module(entry) => Ok(entry),
            Source::Provider(_) => Err(BootError::DepthExceeded {
                max: MAX_PROVIDER_DEPTH,
            }),
        }
    }
}

impl<M: Module> From<Registration<M>> for Source {
    fn from(reg: Registration<M>) -> Self {
        Source::Module(reg.into_entry())
    }
}

impl From<ModuleEntry> for Source {
    fn from(entry: ModuleEntry) -> Self {
        Source::Module(entry)
    }
}
