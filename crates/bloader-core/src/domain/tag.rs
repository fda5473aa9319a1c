//! InjectTag - フィールドの解決方法
//!
//! # 文法
//! - `""`       : 注入対象外（宣言エラー）
//! - `"auto"`   : 型で解決
//! - `"$path"`  : プロパティで解決（`"${path}"` も可）
//! - その他      : 登録名で解決

use std::fmt;

/// Sentinel tag value meaning "resolve by declared field type".
pub const AUTO: &str = "auto";

/// How one injectable field is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InjectTag {
    /// Exact registry name lookup.
    Name(String),
    /// Type lookup (exact type first, then convertible fallback).
    Auto,
    /// Dotted path into the property store.
    Property(String),
}

impl InjectTag {
    /// Parse a raw tag. Returns `None` for an empty (non-injectable) tag.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw == AUTO {
            return Some(InjectTag::Auto);
        }
        if let Some(path) = raw.strip_prefix('$') {
            let path = path
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .unwrap_or(path)
                .trim();
            if path.is_empty() {
                return None;
            }
            return Some(InjectTag::Property(path.to_string()));
        }
        Some(InjectTag::Name(raw.to_string()))
    }
}

impl fmt::Display for InjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectTag::Name(name) => f.write_str(name),
            InjectTag::Auto => f.write_str(AUTO),
            InjectTag::Property(path) => write!(f, "${path}"),
        }
    }
}
