//! Typed - 型付き Module API
//!
//! # 二層構造
//! - **表層（Typed）**: `Module` trait, `Registration<M>`, `Inject<T>`, `Property<T>`
//! - **内部（Dyn）**: `ModuleEntry`, `Slot` - object-safe, type erasure

pub mod module;
pub mod registration;
pub mod slot;

pub use self::module::{Field, Module, OnCreate, OnDestroy, OnMount, OnStart, SlotAccessor};
pub use self::registration::{
    FieldRef, MAX_PROVIDER_DEPTH, ModuleEntry, Provider, Registration, Source,
};
pub use self::slot::{Inject, Property, Resolved, Slot, SlotError};
