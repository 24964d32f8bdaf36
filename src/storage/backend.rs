use std::{
    fs, io,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage is unavailable")]
    Unavailable,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Minimal string key-value store, modelled on browser storage.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store. An optional byte quota makes oversized writes fail
/// the way browser storage does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota: Option<usize>,
    // held across the quota check and the insert
    writes: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            quota: Some(max_bytes),
            ..Self::default()
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.writes.lock();
        if let Some(quota) = self.quota {
            if self.used_bytes_without(key) + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stand-in for a storage API that is switched off; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

impl KeyValueStore for DisabledStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Durable store keeping one file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_enforces_quota() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "small").expect("fits");
        let err = store.set("other", "way too large for the quota");
        assert!(matches!(err, Err(StorageError::QuotaExceeded)));

        // overwriting an existing key only counts the new value
        store.set("k", "replaced").expect("fits after replace");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("replaced"));
    }

    #[test]
    fn concurrent_writers_cannot_overshoot_the_quota() {
        let store = MemoryStore::with_quota(12);
        std::thread::scope(|scope| {
            for n in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    let _ = store.set(&format!("k{n}"), "ten bytes!");
                });
            }
        });

        let stored = (0..8)
            .filter(|n| store.get(&format!("k{n}")).expect("get").is_some())
            .count();
        assert_eq!(stored, 1);
    }

    #[test]
    fn file_store_persists_across_instances() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        FileStore::open(dir.path())?.set("cart/data", "{\"a\":1}")?;

        let reopened = FileStore::open(dir.path())?;
        assert_eq!(reopened.get("cart/data")?.as_deref(), Some("{\"a\":1}"));

        reopened.remove("cart/data")?;
        assert_eq!(reopened.get("cart/data")?, None);
        // removing a missing key is not an error
        reopened.remove("cart/data")?;
        Ok(())
    }
}
