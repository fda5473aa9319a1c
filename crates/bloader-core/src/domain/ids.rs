//! Identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! Anonymous (type-only) modules have no registry name, so every wrapped
//! module gets a `ModuleId` for logs and status output. A `LoaderId` tags
//! every event emitted by one `Bootloader`.
//!
//! ## Phantom Type パターン
//! `Id<T>` は共通実装を提供し、`T` はコンパイル時だけのマーカー型です。
//! `ModuleId` と `LoaderId` は混同できません。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"module-", "loader-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Generate a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Module のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {}

impl IdMarker for Module {
    fn prefix() -> &'static str {
        "module-"
    }
}

/// Loader のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Loader {}

impl IdMarker for Loader {
    fn prefix() -> &'static str {
        "loader-"
    }
}

/// Identifier of one wrapped module instance.
pub type ModuleId = Id<Module>;

/// Identifier of one `Bootloader`.
pub type LoaderId = Id<Loader>;
