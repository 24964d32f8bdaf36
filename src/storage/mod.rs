//! Client-side cart persistence across durable, session and memory stores.

pub mod adapter;
pub mod backend;
pub mod manager;

pub use adapter::{StorageAdapter, StorageType};
pub use backend::{DisabledStore, FileStore, KeyValueStore, MemoryStore, StorageError};
pub use manager::{CART_STORAGE_KEY, STORAGE_VERSION, StorageConfig, StorageManager};
