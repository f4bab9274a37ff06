// Key/value stores backing the reward cache

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::CacheError;
use crate::logger::{self, LogTag};

/// String key/value persistence
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Process-local store, used by tests and embedders without a disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

/// All keys in one JSON object on disk, written through on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or start) the store at `path`. An unreadable file is logged and
    /// replaced on the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(data) => data,
                Err(e) => {
                    logger::warning(
                        LogTag::Cache,
                        &format!("Ignoring unreadable cache file {}: {}", path.display(), e),
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        logger::debug(
            LogTag::Cache,
            &format!("Opened {} with {} keys", path.display(), data.len()),
        );

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut data = self.data.lock();
        data.insert(key.to_string(), value);
        self.flush(&data)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut data = self.data.lock();
        if data.remove(key).is_some() {
            self.flush(&data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string()).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("k", "v".to_string()).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v".to_string()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("\"k\""));
    }
}
