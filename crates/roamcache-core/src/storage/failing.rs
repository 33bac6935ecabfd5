//! Store for testing storage failures
//!
//! Wraps a `MemoryStore`. Individual operations ("get", "set", "remove",
//! "keys") can be switched to fail with an I/O error. Batch operations go
//! through the single-key ones, so failing "get" also fails `multi_get`.

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KeyValueStore, MemoryStore, Result, StorageError};

#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<&'static str>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail until `recover` is called
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("{} failed: disk unavailable", op),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check("get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.check("set")?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check("remove")?;
        self.inner.remove(key).await
    }

    async fn all_keys(&self) -> Result<Vec<String>> {
        self.check("keys")?;
        self.inner.all_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fails_on_demand() {
        let store = FailingStore::new();
        store.set("a", "1".to_string()).await.unwrap();

        store.fail("get");
        assert!(store.get("a").await.is_err());
        assert!(store.multi_get(&["a".to_string()]).await.is_err());

        store.recover("get");
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
    }
}
