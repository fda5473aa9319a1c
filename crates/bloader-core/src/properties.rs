//! Property store: flattened, case-insensitive configuration lookup.
//!
//! Design:
//! - Input is anything `Serialize`; it is turned into a JSON tree and walked.
//! - Every object member becomes `prefix + parent.key` (keys lower-cased),
//!   nested objects are walked recursively.
//! - Zero values (null, false, 0, "", [], objects of zeros) are never
//!   recorded, so a later `set` with an empty branch does not clobber an
//!   earlier non-empty one.
//! - Invariant: keys in `data` always start with `prefix` and are lower-case.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

/// Prefix applied to every stored path.
pub const DEFAULT_PREFIX: &str = "prop-";

#[derive(Default)]
struct Inner {
    data: HashMap<String, Value>,
    configured: bool,
}

pub struct PropertyStore {
    prefix: String,
    inner: RwLock<Inner>,
}

impl PropertyStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Serialize `data` and merge it into the store.
    pub fn set<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.set_value(&value);
        Ok(())
    }

    /// Merge an already built JSON tree into the store.
    pub fn set_value(&self, value: &Value) {
        let mut inner = self.inner.write();
        inner.configured = true;
        walk(&self.prefix, "", value, &mut inner.data);
    }

    /// Case-insensitive lookup of a dotted path.
    pub fn value(&self, name: &str) -> Option<Value> {
        let key = format!("{}{}", self.prefix, name.to_lowercase());
        self.inner.read().data.get(&key).cloned()
    }

    /// Has `set` been called at least once?
    pub fn is_configured(&self) -> bool {
        self.inner.read().configured
    }

    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Stored paths without the prefix, sorted.
    pub fn paths(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut paths: Vec<String> = inner
            .data
            .keys()
            .map(|k| k[self.prefix.len()..].to_string())
            .collect();
        paths.sort();
        paths
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn walk(prefix: &str, dot: &str, value: &Value, data: &mut HashMap<String, Value>) {
    let Value::Object(members) = value else {
        return;
    };
    for (key, member) in members {
        if is_zero(member) {
            continue;
        }
        let name = if dot.is_empty() {
            key.to_lowercase()
        } else {
            format!("{dot}.{}", key.to_lowercase())
        };
        data.insert(format!("{prefix}{name}"), member.clone());
        walk(prefix, &name, member, data);
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.values().all(is_zero),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Db {
        username: String,
        password: String,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Config {
        port: u16,
        #[serde(rename = "DB")]
        db: Db,
    }

    fn sample() -> Config {
        Config {
            port: 80,
            db: Db {
                username: "root".into(),
                password: "toor".into(),
            },
        }
    }

    #[test]
    fn flattens_nested_records() {
        let store = PropertyStore::default();
        store.set(&sample()).unwrap();

        assert_eq!(store.value("port"), Some(json!(80)));
        assert_eq!(store.value("db.username"), Some(json!("root")));
        assert_eq!(store.value("db.password"), Some(json!("toor")));
        assert_eq!(
            store.value("db"),
            Some(json!({"Username": "root", "Password": "toor"}))
        );
    }

    #[rstest]
    #[case("DB.USERNAME")]
    #[case("Db.Username")]
    #[case("db.username")]
    fn lookup_ignores_case(#[case] name: &str) {
        let store = PropertyStore::default();
        store.set(&sample()).unwrap();
        assert_eq!(store.value(name), Some(json!("root")));
    }

    #[test]
    fn string_keyed_maps_are_flattened() {
        let store = PropertyStore::default();
        let mut users = HashMap::new();
        users.insert("Admin", json!({"Name": "admin", "Password": "admin123"}));
        store.set(&users).unwrap();

        assert_eq!(store.value("admin.name"), Some(json!("admin")));
        assert_eq!(store.value("ADMIN.password"), Some(json!("admin123")));
    }

    #[test]
    fn zero_values_do_not_overwrite() {
        let store = PropertyStore::default();
        store.set(&sample()).unwrap();
        store
            .set(&Config {
                port: 0,
                db: Db {
                    username: String::new(),
                    password: "secret".into(),
                },
            })
            .unwrap();

        assert_eq!(store.value("port"), Some(json!(80)));
        assert_eq!(store.value("db.username"), Some(json!("root")));
        assert_eq!(store.value("db.password"), Some(json!("secret")));
    }

    #[test]
    fn branch_of_zeros_keeps_earlier_branch() {
        let store = PropertyStore::default();
        store.set(&sample()).unwrap();
        store.set(&json!({"db": {"username": "", "password": null}})).unwrap();

        assert_eq!(
            store.value("db"),
            Some(json!({"Username": "root", "Password": "toor"}))
        );
    }

    #[test]
    fn absent_path_is_none() {
        let store = PropertyStore::default();
        assert!(!store.is_configured());
        assert_eq!(store.value("port"), None);

        store.set(&json!({})).unwrap();
        assert!(store.is_configured());
        assert!(store.is_empty());
        assert_eq!(store.value("port"), None);
    }

    #[test]
    fn non_object_roots_contribute_nothing() {
        let store = PropertyStore::default();
        store.set(&42).unwrap();
        store.set(&vec!["a", "b"]).unwrap();
        assert!(store.is_configured());
        assert!(store.is_empty());
    }

    #[test]
    fn keys_are_prefix_scoped() {
        let store = PropertyStore::new("app-");
        store.set(&json!({"Port": 8080})).unwrap();
        assert_eq!(store.prefix(), "app-");
        assert_eq!(store.paths(), vec!["port".to_string()]);
        assert_eq!(store.value("port"), Some(json!(8080)));
    }
}
