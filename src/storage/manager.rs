use std::{sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::adapter::{StorageAdapter, StorageType};
use crate::models::StoredCartPayload;

pub const CART_STORAGE_KEY: &str = "restaurant_cart";
pub const STORAGE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub primary_storage: StorageType,
    pub backup_storage: Option<StorageType>,
    pub auto_save: bool,
    #[serde(with = "millis")]
    pub save_interval: Duration,
    /// Reserved; no save or load path retries yet.
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            primary_storage: StorageType::Hybrid,
            backup_storage: Some(StorageType::Session),
            auto_save: true,
            save_interval: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug)]
struct ManagerInner {
    adapter: Arc<StorageAdapter>,
    config: RwLock<StorageConfig>,
    cache: Mutex<Option<StoredCartPayload>>,
}

impl ManagerInner {
    fn save(&self, mut payload: StoredCartPayload) -> bool {
        payload.last_updated = Utc::now().to_rfc3339();
        payload.version = STORAGE_VERSION.to_string();

        let saved = self.persist(&payload);
        *self.cache.lock() = Some(payload);
        if !saved {
            tracing::warn!("cart payload kept in memory only");
        }
        saved
    }

    /// Writes `payload` to primary, then backup, as-is. The cache is not touched.
    fn persist(&self, payload: &StoredCartPayload) -> bool {
        let config = self.config.read().clone();
        match serde_json::to_string(payload) {
            Ok(raw) => {
                self.adapter
                    .write(config.primary_storage, CART_STORAGE_KEY, &raw)
                    || config.backup_storage.is_some_and(|backup| {
                        tracing::debug!(%backup, "primary storage failed, writing backup");
                        self.adapter.write(backup, CART_STORAGE_KEY, &raw)
                    })
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize cart payload");
                false
            }
        }
    }

    fn load_from(&self, kind: StorageType) -> Option<StoredCartPayload> {
        // validate each tier on its own so a bad durable record never takes
        // the session copy with it
        if kind == StorageType::Hybrid {
            return self
                .load_from(StorageType::Durable)
                .or_else(|| self.load_from(StorageType::Session));
        }
        let raw = self.adapter.read(kind, CART_STORAGE_KEY)?;
        match parse_payload(&raw) {
            Some(payload) => Some(payload),
            None => {
                tracing::warn!(storage = %kind, "discarding invalid stored cart payload");
                self.adapter.remove(kind, CART_STORAGE_KEY);
                None
            }
        }
    }
}

/// Structural check of a stored record, followed by typed decoding.
fn parse_payload(raw: &str) -> Option<StoredCartPayload> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let valid = value.get("items").is_some_and(Value::is_array)
        && value
            .get("selectedBranchId")
            .is_some_and(|branch| branch.is_null() || branch.is_number())
        && value.get("lastUpdated").is_some_and(Value::is_string)
        && value.get("version").and_then(Value::as_str) == Some(STORAGE_VERSION);
    if !valid {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Persists the locally held cart under a single key, falling back from the
/// primary backend to the backup and finally to an in-memory copy.
#[derive(Debug)]
pub struct StorageManager {
    inner: Arc<ManagerInner>,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

impl StorageManager {
    pub fn new(adapter: Arc<StorageAdapter>, config: StorageConfig) -> Self {
        let manager = Self {
            inner: Arc::new(ManagerInner {
                adapter,
                config: RwLock::new(config),
                cache: Mutex::new(None),
            }),
            autosave: Mutex::new(None),
        };
        manager.rearm_autosave();
        manager
    }

    pub fn config(&self) -> StorageConfig {
        self.inner.config.read().clone()
    }

    /// Replaces the configuration and re-arms or stops autosave right away.
    pub fn set_config(&self, config: StorageConfig) {
        *self.inner.config.write() = config;
        self.rearm_autosave();
    }

    pub fn cached(&self) -> Option<StoredCartPayload> {
        self.inner.cache.lock().clone()
    }

    pub fn save(&self, payload: StoredCartPayload) -> bool {
        self.inner.save(payload)
    }

    pub fn load(&self) -> Option<StoredCartPayload> {
        let config = self.config();
        let loaded = self
            .inner
            .load_from(config.primary_storage)
            .or_else(|| {
                config
                    .backup_storage
                    .and_then(|backup| self.inner.load_from(backup))
            });

        match loaded {
            Some(payload) => {
                *self.inner.cache.lock() = Some(payload.clone());
                Some(payload)
            }
            None => self.cached(),
        }
    }

    pub fn clear(&self) {
        let config = self.config();
        self.inner
            .adapter
            .remove(config.primary_storage, CART_STORAGE_KEY);
        if let Some(backup) = config.backup_storage {
            self.inner.adapter.remove(backup, CART_STORAGE_KEY);
        }
        *self.inner.cache.lock() = None;
    }

    fn rearm_autosave(&self) {
        let mut slot = self.autosave.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let config = self.config();
        if !config.auto_save || config.save_interval.is_zero() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime, cart autosave disabled");
            return;
        };

        let inner = Arc::clone(&self.inner);
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(config.save_interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = inner.cache.lock().clone();
                if let Some(payload) = snapshot {
                    inner.persist(&payload);
                }
            }
        }));
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        if let Some(handle) = self.autosave.lock().take() {
            handle.abort();
        }
    }
}
