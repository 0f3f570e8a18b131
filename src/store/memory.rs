//! In-memory stores for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::{
    guess_content_type, item_key, project, validate_key, Item, KeyValueStore, ObjectStore,
    StoreError, StoredObject,
};

type Table = BTreeMap<String, Item>;

/// Key-value tables held in memory. Scans return items ordered by slug.
///
/// # Example
///
/// ```ignore
/// let store = MemoryKeyValueStore::new()
///     .with_item("pages", json!({"slug": "index", "name": "Home"}));
/// ```
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item. Values that are not objects or lack a `slug` are ignored.
    pub fn with_item(mut self, table: &str, item: serde_json::Value) -> Self {
        if let serde_json::Value::Object(item) = item {
            if let Ok(key) = item_key(&item) {
                let key = key.to_string();
                self.tables
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(table.to_string())
                    .or_default()
                    .insert(key, item);
            }
        }
        self
    }

    /// Number of items in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Lock)?;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn batch_get(&self, table: &str, keys: &[String]) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Lock)?;
        let Some(rows) = tables.get(table) else {
            return Ok(vec![]);
        };
        Ok(keys.iter().filter_map(|k| rows.get(k)).cloned().collect())
    }

    fn put(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let key = item_key(&item)?.to_string();
        let mut tables = self.tables.write().map_err(|_| StoreError::Lock)?;
        tables.entry(table.to_string()).or_default().insert(key, item);
        Ok(())
    }

    fn batch_put(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError> {
        // Validate every key first so a bad item leaves the table untouched.
        let keyed = items
            .into_iter()
            .map(|item| {
                let key = item_key(&item)?.to_string();
                Ok::<_, StoreError>((key, item))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Lock)?;
        tables.entry(table.to_string()).or_default().extend(keyed);
        Ok(())
    }

    fn scan(&self, table: &str, projection: &[&str]) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Lock)?;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().map(|item| project(item, projection)).collect())
            .unwrap_or_default())
    }
}

/// Object buckets held in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object; the content type is guessed from the key.
    pub fn with_object(mut self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        let object = StoredObject {
            body: body.into(),
            content_type: guess_content_type(key).to_string(),
        };
        self.buckets
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        self
    }

    /// Keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .buckets
            .read()
            .map(|b| b.get(bucket).map(|o| o.keys().cloned().collect()).unwrap_or_default())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let buckets = self.buckets.read().map_err(|_| StoreError::Lock)?;
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", bucket, key)))
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut buckets = self.buckets.write().map_err(|_| StoreError::Lock)?;
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
