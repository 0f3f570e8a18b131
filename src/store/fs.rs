//! Filesystem-backed stores.
//!
//! Layout under a root directory:
//! - `tables/<table>/<slug>.json` - one pretty-printed JSON object per item
//! - `buckets/<bucket>/<key>` - raw object bodies

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    guess_content_type, item_key, project, validate_key, Item, KeyValueStore, ObjectStore,
    StoreError, StoredObject,
};

fn io_error(path: &Path, source: io::Error) -> StoreError {
    if source.kind() == io::ErrorKind::NotFound {
        return StoreError::not_found(path.display().to_string());
    }
    StoreError::Io {
        location: path.display().to_string(),
        source,
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    validate_key(name)?;
    if name.contains('/') {
        return Err(StoreError::InvalidKey {
            key: name.to_string(),
            reason: "name must be a single path segment",
        });
    }
    Ok(())
}

/// Key-value tables stored as JSON files.
#[derive(Debug, Clone)]
pub struct FsKeyValueStore {
    root: PathBuf,
}

impl FsKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf, StoreError> {
        validate_name(table)?;
        Ok(self.root.join("tables").join(table))
    }

    fn item_path(&self, table: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_name(key)?;
        Ok(self.table_dir(table)?.join(format!("{}.json", key)))
    }

    fn write_item(table: &str, path: &Path, item: &Item) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let content = serde_json::to_string_pretty(item)?;
        fs::write(path, content).map_err(|e| io_error(path, e))?;
        debug!(table, path = %path.display(), "Wrote item");
        Ok(())
    }

    fn read_item(path: &Path) -> Result<Item, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeyValueStore for FsKeyValueStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError> {
        let path = self.item_path(table, key)?;
        match Self::read_item(&path) {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn batch_get(&self, table: &str, keys: &[String]) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.get(table, key)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn put(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let path = self.item_path(table, item_key(&item)?)?;
        Self::write_item(table, &path, &item)
    }

    fn batch_put(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError> {
        // Resolve every item path before touching the table.
        let staged = items
            .iter()
            .map(|item| {
                let path = self.item_path(table, item_key(item)?)?;
                Ok::<_, StoreError>((path, item))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        for (path, item) in staged {
            Self::write_item(table, &path, item)?;
        }
        Ok(())
    }

    fn scan(&self, table: &str, projection: &[&str]) -> Result<Vec<Item>, StoreError> {
        let dir = self.table_dir(table)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut paths = vec![];
        for entry in entries {
            let path = entry.map_err(|e| io_error(&dir, e))?.path();
            if path.extension().is_some_and(|e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| Self::read_item(path).map(|item| project(&item, projection)))
            .collect()
    }
}

/// Object buckets stored as plain files. Content types are inferred from
/// the key extension on read.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_name(bucket)?;
        validate_key(key)?;
        Ok(self.root.join("buckets").join(bucket).join(key))
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.object_path(bucket, key)?;
        let body = fs::read(&path).map_err(|e| io_error(&path, e))?;
        Ok(StoredObject {
            body,
            content_type: guess_content_type(key).to_string(),
        })
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        fs::write(&path, body).map_err(|e| io_error(&path, e))?;
        debug!(bucket, key, content_type, "Wrote object");
        Ok(())
    }
}
