use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    catalog::Catalog,
    storage::{
        DisabledStore, FileStore, KeyValueStore, MemoryStore, StorageAdapter, StorageConfig,
        StorageType,
    },
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let catalog_path = env::var("CATALOG_PATH").ok().map(PathBuf::from);
        Ok(Self {
            host,
            port,
            catalog_path,
        })
    }

    pub async fn load_catalog(&self) -> anyhow::Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::from_json_file(path).await,
            None => {
                tracing::info!("CATALOG_PATH not set, serving the demo menu");
                Ok(Catalog::demo())
            }
        }
    }
}

/// Settings for the cart client and its local persistence.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub storage_dir: Option<PathBuf>,
    pub storage: StorageConfig,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = StorageConfig::default();

        let primary_storage = match var("CART_PRIMARY_STORAGE") {
            Some(raw) => raw
                .parse::<StorageType>()
                .map_err(anyhow::Error::msg)
                .context("CART_PRIMARY_STORAGE")?,
            None => defaults.primary_storage,
        };
        let backup_storage = match var("CART_BACKUP_STORAGE") {
            Some(raw) if raw.eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(
                raw.parse::<StorageType>()
                    .map_err(anyhow::Error::msg)
                    .context("CART_BACKUP_STORAGE")?,
            ),
            None => defaults.backup_storage,
        };
        let auto_save = match var("CART_AUTOSAVE") {
            Some(raw) => raw.parse::<bool>().context("CART_AUTOSAVE")?,
            None => defaults.auto_save,
        };
        let save_interval = match var("CART_SAVE_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().context("CART_SAVE_INTERVAL_MS")?),
            None => defaults.save_interval,
        };

        Ok(Self {
            api_url: var("CART_API_URL").unwrap_or_else(|| "http://127.0.0.1:3000/api".to_string()),
            storage_dir: var("CART_STORAGE_DIR").map(PathBuf::from),
            storage: StorageConfig {
                primary_storage,
                backup_storage,
                auto_save,
                save_interval,
                ..defaults
            },
        })
    }

    /// Durable storage lives in `storage_dir` when set; otherwise it is kept
    /// in memory. A directory that cannot be opened leaves durable storage
    /// disabled rather than failing.
    pub fn storage_adapter(&self) -> StorageAdapter {
        let durable: Arc<dyn KeyValueStore> = match &self.storage_dir {
            Some(dir) => match FileStore::open(dir) {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "durable storage disabled");
                    Arc::new(DisabledStore)
                }
            },
            None => Arc::new(MemoryStore::new()),
        };
        StorageAdapter::new(
            durable,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }
}
