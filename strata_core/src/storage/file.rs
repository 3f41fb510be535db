use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{KvPair, KvStore, MemStore};
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<KvPair>,
}

/// A key-value store persisted to a single JSON file.
///
/// Writes go to memory and only reach disk on [`FileStore::commit`], which
/// mirrors how block execution commits state once per height.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemStore,
}

impl FileStore {
    /// Open the store at `path`, loading the last committed snapshot if one exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let inner = if path.exists() {
            debug!("Loading store snapshot from {:?}", path);
            let json = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&json)?;
            MemStore::from_entries(snapshot.entries)
        } else {
            debug!("No snapshot at {:?}, starting empty", path);
            MemStore::new()
        };

        Ok(Self { path, inner })
    }

    /// Write the current contents to disk.
    pub fn commit(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let snapshot = Snapshot {
            entries: self.inner.snapshot(),
        };
        let json = serde_json::to_string(&snapshot)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            "Committed {} entries to {:?}",
            snapshot.entries.len(),
            self.path
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        self.inner.has(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) {
        self.inner.delete(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<KvPair> {
        self.inner.prefix_scan(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_uncommitted_writes_are_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set(b"k", b"v");
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get(b"k").is_none());
    }

    #[test]
    fn test_commit_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set(b"k", b"v");
        store.commit().unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
