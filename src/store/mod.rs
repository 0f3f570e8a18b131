//! Storage collaborators.
//!
//! Two traits stand in for the managed services the handlers talk to:
//! [`KeyValueStore`] for the pages/widgets/page-templates tables and
//! [`ObjectStore`] for the definitions and site buckets. Both are injected
//! into the pipeline and handlers, never held globally.
//!
//! # Item convention
//!
//! Table items are JSON objects keyed by their `slug` attribute. Attributes
//! are stored as native JSON, not as stringified JSON.

mod fs;
mod memory;

pub use fs::{FsKeyValueStore, FsObjectStore};
pub use memory::{MemoryKeyValueStore, MemoryObjectStore};

use serde_json::{Map, Value};
use std::path::{Component, Path};
use thiserror::Error;

/// A table row.
pub type Item = Map<String, Value>;

/// Attribute every item is keyed by.
pub const KEY_ATTRIBUTE: &str = "slug";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {location}")]
    NotFound { location: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("I/O error at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Lock,
}

impl StoreError {
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound { location: location.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Key-value tables.
pub trait KeyValueStore: Send + Sync {
    /// Fetch one item, `None` when the key is absent.
    fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError>;

    /// Fetch many items. Absent keys are simply missing from the result;
    /// callers must detect short results themselves.
    fn batch_get(&self, table: &str, keys: &[String]) -> Result<Vec<Item>, StoreError>;

    /// Insert or replace an item by its `slug` attribute.
    fn put(&self, table: &str, item: Item) -> Result<(), StoreError>;

    fn batch_put(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError> {
        for item in items {
            self.put(table, item)?;
        }
        Ok(())
    }

    /// All items, reduced to the `projection` attributes when non-empty.
    fn scan(&self, table: &str, projection: &[&str]) -> Result<Vec<Item>, StoreError>;
}

/// A stored blob and its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl StoredObject {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Object buckets.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError>;

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), StoreError>;

    fn get_text(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        self.get(bucket, key).map(|object| object.text())
    }
}

/// Extract the key attribute of an item.
pub fn item_key(item: &Item) -> Result<&str, StoreError> {
    item.get(KEY_ATTRIBUTE)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidKey {
            key: String::new(),
            reason: "item has no string 'slug' attribute",
        })
}

/// Keep only the `projection` attributes of an item.
pub fn project(item: &Item, projection: &[&str]) -> Item {
    if projection.is_empty() {
        return item.clone();
    }
    projection
        .iter()
        .filter_map(|attr| item.get(*attr).map(|v| ((*attr).to_string(), v.clone())))
        .collect()
}

/// Reject keys that could escape their bucket or table.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &'static str| StoreError::InvalidKey { key: key.to_string(), reason };
    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid("key must be a relative path"));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("key must not contain '.' or '..' segments"));
    }
    Ok(())
}

/// Guess a media type from the key's extension.
pub fn guess_content_type(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("about/index.html").is_ok());
        assert!(validate_key("mainPageTemplate.html").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../secrets").is_err());
        assert!(validate_key("a/../b").is_err());
    }

    #[test]
    fn test_project() {
        let item = json!({"slug": "a", "name": "A", "html": "x"});
        let item = item.as_object().unwrap();
        let projected = project(item, &["name", "slug", "missing"]);
        assert_eq!(Value::Object(projected), json!({"name": "A", "slug": "a"}));
        assert_eq!(project(item, &[]).len(), 3);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a/index.html"), "text/html; charset=utf-8");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }
}
