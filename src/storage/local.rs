//! Local filesystem storage implementation.
//!
//! Keeps the whole key space in one JSON document, loaded once on open and
//! rewritten atomically after every change.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Tracker configuration
//! └── store.json            # All keys: stats, settings, gamification, site_*
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::KeyValueStore;

/// Default file name of the store document.
pub const DEFAULT_FILE_NAME: &str = "store.json";

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl LocalStore {
    /// Open the store at `{root_dir}/store.json`, creating it lazily.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_file(root_dir.into().join(DEFAULT_FILE_NAME)).await
    }

    /// Open a store document at an explicit path.
    pub async fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match read_bytes(&path).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::storage(path.display().to_string(), format!("corrupt store: {e}"))
            })?,
            None => {
                log::info!("No store found at {}, starting empty", path.display());
                BTreeMap::new()
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the store document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Persist a candidate key space; the cache is only replaced on success.
    async fn persist(&self, next: &BTreeMap<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(next)?;
        self.write_bytes(&bytes).await.map_err(|e| {
            log::error!("Failed to write store {}: {}", self.path.display(), e);
            e
        })
    }
}

/// Read bytes, returning None if file doesn't exist.
async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl KeyValueStore for LocalStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.extend(items);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        let next = BTreeMap::new();
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        let mut items = HashMap::new();
        items.insert("site_example.com".to_string(), json!({ "visitCount": 2 }));
        store.set(items).await.unwrap();

        let reopened = LocalStore::open(tmp.path()).await.unwrap();
        let values = reopened.get(&["site_example.com"]).await.unwrap();
        assert_eq!(values["site_example.com"]["visitCount"], 2);
    }

    #[tokio::test]
    async fn test_open_nonexistent_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("nested")).await.unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_store_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(DEFAULT_FILE_NAME), b"{ not json").unwrap();

        let result = LocalStore::open(tmp.path()).await;
        assert!(matches!(result, Err(AppError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_remove_and_clear_persist() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        let mut items = HashMap::new();
        items.insert("a".to_string(), json!(1));
        items.insert("b".to_string(), json!(2));
        store.set(items).await.unwrap();
        store.remove(&["a"]).await.unwrap();

        let reopened = LocalStore::open(tmp.path()).await.unwrap();
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("b"));

        reopened.clear().await.unwrap();
        let again = LocalStore::open(tmp.path()).await.unwrap();
        assert!(again.get_all().await.unwrap().is_empty());
    }
}
