//! Slot - 書き込み一回だけのフィールド
//!
//! # 学習ポイント
//! - `OnceLock` による write-once セマンティクス（ロック不要）
//! - `Box<dyn Any>` からの downcast による型消去の解除
//!
//! A module declares injectable fields as `Inject<T>` (another module) or
//! `Property<T>` (a configuration value). The injector only ever talks to the
//! object-safe [`Slot`] trait.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// A value produced by resolving one field tag.
pub enum Resolved {
    /// A boxed `Arc<T>` view of some registered module.
    Module {
        handle: Box<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
    /// A property store value slot.
    Property(serde_json::Value),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Module { type_name, .. } => f.debug_tuple("Module").field(type_name).finish(),
            Resolved::Property(value) => f.debug_tuple("Property").field(value).finish(),
        }
    }
}

/// SlotError は値の代入に失敗したときのエラー
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("cannot assign {actual} to a field of type {expected}")]
    IncompatibleModule {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("a field of type {expected} cannot hold a property value")]
    PropertyIntoModuleField { expected: &'static str },

    #[error("a property field of type {expected} cannot hold a module")]
    ModuleIntoPropertyField { expected: &'static str },

    #[error("property value does not fit {expected}: {source}")]
    Deserialize {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("field of type {expected} has already been injected")]
    AlreadyInjected { expected: &'static str },

    #[error("field of type {expected} has not been injected")]
    NotInjected { expected: &'static str },
}

/// Object-safe view of one injectable field.
pub trait Slot: Send + Sync {
    /// Type requested by `auto` lookups.
    fn wanted(&self) -> TypeId;

    fn wanted_name(&self) -> &'static str;

    fn is_injected(&self) -> bool;

    /// Store a resolved value. Succeeds at most once.
    fn assign(&self, value: Resolved) -> Result<(), SlotError>;
}

/// A reference to another registered module.
///
/// `T` may be the module's concrete type or a trait object the module was
/// registered as (see [`Registration::provides`](crate::typed::Registration::provides)).
pub struct Inject<T: ?Sized + Send + Sync + 'static> {
    cell: OnceLock<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Inject<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }

    /// Like [`Inject::get`], for hooks that prefer `?` over `Option`.
    pub fn require(&self) -> Result<&Arc<T>, SlotError> {
        self.cell.get().ok_or(SlotError::NotInjected {
            expected: type_name::<T>(),
        })
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("type", &type_name::<T>())
            .field("injected", &self.cell.get().is_some())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Slot for Inject<T> {
    fn wanted(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn wanted_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn is_injected(&self) -> bool {
        self.cell.get().is_some()
    }

    fn assign(&self, value: Resolved) -> Result<(), SlotError> {
        let expected = type_name::<T>();
        let (handle, actual) = match value {
            Resolved::Module { handle, type_name } => (handle, type_name),
            Resolved::Property(_) => return Err(SlotError::PropertyIntoModuleField { expected }),
        };
        let arc = handle
            .downcast::<Arc<T>>()
            .map_err(|_| SlotError::IncompatibleModule { expected, actual })?;
        self.cell
            .set(*arc)
            .map_err(|_| SlotError::AlreadyInjected { expected })
    }
}

/// A configuration value taken from the property store.
pub struct Property<T: DeserializeOwned + Send + Sync + 'static> {
    cell: OnceLock<T>,
}

impl<T: DeserializeOwned + Send + Sync + 'static> Property<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn require(&self) -> Result<&T, SlotError> {
        self.cell.get().ok_or(SlotError::NotInjected {
            expected: type_name::<T>(),
        })
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + Sync + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&self.cell.get()).finish()
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Slot for Property<T> {
    fn wanted(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn wanted_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn is_injected(&self) -> bool {
        self.cell.get().is_some()
    }

    fn assign(&self, value: Resolved) -> Result<(), SlotError> {
        let expected = type_name::<T>();
        let raw = match value {
            Resolved::Property(raw) => raw,
            Resolved::Module { .. } => return Err(SlotError::ModuleIntoPropertyField { expected }),
        };
        let parsed: T = serde_json::from_value(raw)
            .map_err(|source| SlotError::Deserialize { expected, source })?;
        self.cell
            .set(parsed)
            .map_err(|_| SlotError::AlreadyInjected { expected })
    }
}
