//! Key-value storage for aggregates, settings and gamification state.
//!
//! The store mirrors a browser extension's local storage area: string keys,
//! JSON values, `get`/`set` without transactions. Read-modify-write cycles
//! are serialized by callers through [`KeyLocks`].
//!
//! ## Keys
//!
//! ```text
//! stats              # GlobalStats
//! settings           # Settings
//! gamification       # GamificationState
//! site_<domain>      # SiteAggregate, one per domain
//! ```

pub mod local;
pub mod locks;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStore;
pub use locks::KeyLocks;
pub use memory::MemoryStore;

pub const STATS_KEY: &str = "stats";
pub const SETTINGS_KEY: &str = "settings";
pub const GAMIFICATION_KEY: &str = "gamification";
pub const SITE_PREFIX: &str = "site_";

/// Storage key for a domain's aggregate.
pub fn site_key(domain: &str) -> String {
    format!("{}{}", SITE_PREFIX, domain)
}

/// Trait for key-value storage backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Fetch every stored key.
    async fn get_all(&self) -> Result<HashMap<String, Value>>;

    /// Insert or overwrite the given entries.
    async fn set(&self, items: HashMap<String, Value>) -> Result<()>;

    /// Delete the given keys. Missing keys are ignored.
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Delete everything.
    async fn clear(&self) -> Result<()>;
}

/// Load a typed document, merging missing fields with defaults.
///
/// A value that cannot be deserialized at all is logged and replaced by
/// the default instead of failing the caller.
pub async fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let mut values = store.get(&[key]).await?;
    Ok(match values.remove(key) {
        Some(value) => decode_or_default(key, value),
        None => T::default(),
    })
}

/// Load a typed document if present.
pub async fn load_optional<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned + Default,
{
    let mut values = store.get(&[key]).await?;
    Ok(values.remove(key).map(|value| decode_or_default(key, value)))
}

/// Serialize and store a typed document.
pub async fn save<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let mut items = HashMap::new();
    items.insert(key.to_string(), serde_json::to_value(value)?);
    store.set(items).await
}

/// Decode a stored value, repairing malformed documents with the default.
pub fn decode_or_default<T>(key: &str, value: Value) -> T
where
    T: DeserializeOwned + Default,
{
    serde_json::from_value(value).unwrap_or_else(|e| {
        log::warn!("Malformed value under '{}': {}. Using defaults.", key, e);
        T::default()
    })
}
