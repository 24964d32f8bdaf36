use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::backend::{KeyValueStore, MemoryStore};

const PROBE_KEY: &str = "__storage_probe__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Survives process restarts.
    Durable,
    /// Survives a reload but not the end of the session.
    Session,
    /// Process-local and fastest.
    Memory,
    /// Durable and session together.
    Hybrid,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageType::Durable => "durable",
            StorageType::Session => "session",
            StorageType::Memory => "memory",
            StorageType::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "durable" | "local" => Ok(StorageType::Durable),
            "session" => Ok(StorageType::Session),
            "memory" => Ok(StorageType::Memory),
            "hybrid" => Ok(StorageType::Hybrid),
            other => Err(format!("unknown storage type: {other}")),
        }
    }
}

#[derive(Debug)]
struct Backend {
    kind: StorageType,
    store: Arc<dyn KeyValueStore>,
    available: bool,
}

impl Backend {
    fn probe(kind: StorageType, store: Arc<dyn KeyValueStore>) -> Self {
        let available = store
            .set(PROBE_KEY, PROBE_KEY)
            .and_then(|()| store.remove(PROBE_KEY))
            .map_err(|err| tracing::warn!(storage = %kind, error = %err, "storage backend unavailable"))
            .is_ok();
        Self {
            kind,
            store,
            available,
        }
    }

    fn write(&self, key: &str, value: &str) -> bool {
        if !self.available {
            return false;
        }
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(storage = %self.kind, key, error = %err, "storage write failed");
                false
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        if !self.available {
            return None;
        }
        self.store
            .get(key)
            .map_err(|err| tracing::debug!(storage = %self.kind, key, error = %err, "storage read failed"))
            .ok()
            .flatten()
    }

    fn remove(&self, key: &str) -> bool {
        if !self.available {
            return false;
        }
        match self.store.remove(key) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(storage = %self.kind, key, error = %err, "storage remove failed");
                false
            }
        }
    }
}

/// Uniform access to the durable, session and memory stores.
///
/// None of the operations fail loudly: backend errors are logged and turned
/// into `false` / `None`.
#[derive(Debug)]
pub struct StorageAdapter {
    durable: Backend,
    session: Backend,
    memory: Backend,
}

impl StorageAdapter {
    /// Wraps the three stores, smoke-testing each one. A store that fails the
    /// probe is treated as failing for the lifetime of the adapter.
    pub fn new(
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        memory: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            durable: Backend::probe(StorageType::Durable, durable),
            session: Backend::probe(StorageType::Session, session),
            memory: Backend::probe(StorageType::Memory, memory),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn is_available(&self, kind: StorageType) -> bool {
        match kind {
            StorageType::Durable => self.durable.available,
            StorageType::Session => self.session.available,
            StorageType::Memory => self.memory.available,
            StorageType::Hybrid => self.durable.available || self.session.available,
        }
    }

    pub fn write(&self, kind: StorageType, key: &str, value: &str) -> bool {
        match kind {
            StorageType::Durable => self.durable.write(key, value),
            StorageType::Session => self.session.write(key, value),
            StorageType::Memory => self.memory.write(key, value),
            StorageType::Hybrid => {
                let durable = self.durable.write(key, value);
                let session = self.session.write(key, value);
                durable || session
            }
        }
    }

    pub fn read(&self, kind: StorageType, key: &str) -> Option<String> {
        match kind {
            StorageType::Durable => self.durable.read(key),
            StorageType::Session => self.session.read(key),
            StorageType::Memory => self.memory.read(key),
            StorageType::Hybrid => self.durable.read(key).or_else(|| self.session.read(key)),
        }
    }

    pub fn remove(&self, kind: StorageType, key: &str) -> bool {
        match kind {
            StorageType::Durable => self.durable.remove(key),
            StorageType::Session => self.session.remove(key),
            StorageType::Memory => self.memory.remove(key),
            StorageType::Hybrid => {
                let durable = self.durable.remove(key);
                let session = self.session.remove(key);
                durable || session
            }
        }
    }
}
