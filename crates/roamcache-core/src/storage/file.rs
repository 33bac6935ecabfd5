use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, Result};

/// Store file name in the data directory
const STORE_FILE: &str = "store.json";

/// Key-value store persisted as one JSON object on disk.
///
/// The file is read on first access and rewritten after every mutation.
/// Writes go to a sibling temp file which is then renamed over the original,
/// so a crash mid-write leaves the previous contents intact.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Open the store file inside `data_dir`, creating the directory if needed.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self::at(data_dir.join(STORE_FILE)))
    }

    /// Use an explicit file path.
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), keys = entries.len(), "Store written");
        Ok(())
    }

    /// Run `f` against the loaded map, persisting afterwards if it reports a change.
    async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
    {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        let entries = guard.get_or_insert_with(BTreeMap::new);
        if f(entries) {
            self.write_file(entries).await?;
        }
        Ok(())
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BTreeMap<String, String>) -> T + Send,
    {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        Ok(f(guard.get_or_insert_with(BTreeMap::new)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(|entries| entries.get(key).cloned()).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|entries| entries.remove(key).is_some()).await
    }

    async fn all_keys(&self) -> Result<Vec<String>> {
        self.read(|entries| entries.keys().cloned().collect()).await
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.read(|entries| keys.iter().map(|k| entries.get(k).cloned()).collect())
            .await
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        self.mutate(|entries| {
            let changed = !pairs.is_empty();
            entries.extend(pairs);
            changed
        })
        .await
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        self.mutate(|entries| {
            let mut changed = false;
            for key in keys {
                changed |= entries.remove(key).is_some();
            }
            changed
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        store.set("token", "abc".to_string()).await.unwrap();
        store
            .multi_set(vec![("k1".to_string(), "v1".to_string())])
            .await
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("token").await.unwrap(), Some("abc".to_string()));
        assert_eq!(reopened.get("k1").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.get("anything").await.unwrap(), None);
        assert!(store.all_keys().await.unwrap().is_empty());
        // Reads alone never create the file
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_store_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "2".to_string()).await.unwrap();

        store.multi_remove(&["a".to_string()]).await.unwrap();
        store.remove("missing").await.unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.all_keys().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("a").await.is_err());
    }
}
