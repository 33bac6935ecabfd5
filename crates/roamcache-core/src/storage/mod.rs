//! Key-value persistence used by the cache, the offline queue and the session.
//!
//! This module provides:
//! - `KeyValueStore`: async string get/set/remove with batch variants
//! - `MemoryStore`: process-local store for tests and ephemeral hosts
//! - `FileStore`: a single JSON document in the application data directory
//!
//! Keys are opaque strings. Callers namespace them with prefixes such as
//! `@roamcache:cache:` so unrelated data can share one store.

#[cfg(test)]
pub mod failing;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Async key-value store.
///
/// The batch operations default to looping over the single-key ones;
/// implementations that can apply a batch in one write should override them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn all_keys(&self) -> Result<Vec<String>>;

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn multi_set(&self, entries: Vec<(String, String)>) -> Result<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}
