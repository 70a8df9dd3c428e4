//! Persistence port for the engines.
//!
//! Both engines persist their full state after every mutation as JSON blobs
//! under fixed logical keys. Any durable, synchronous string key-value store
//! can back them; [`MemoryStore`] and [`SqliteStore`] are provided.

mod schema;
mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

pub use sqlite::{default_data_dir, SqliteStore, DB_FILE};

/// Key holding the serialized [`crate::models::SessionRecord`].
pub const SESSION_KEY: &str = "ctdp_state";
/// Key holding the live commitment node list.
pub const NODES_KEY: &str = "rsip_nodes";
/// Key holding the list of imported tree snapshots.
pub const IMPORTED_KEY: &str = "rsip_imported_trees";
/// Key holding the daily quota record.
pub const DAILY_KEY: &str = "rsip_daily";
/// Key holding the tree share flag.
pub const SHARED_KEY: &str = "rsip_is_shared";
/// Key holding the list of [`crate::models::TaskGroup`]s.
pub const TASK_GROUPS_KEY: &str = "task_groups";

/// A durable, synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Read and deserialize `key`, or `None` if the key was never written.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Serialize `value` and write it under `key`.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Process-local store, lost on drop. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().expect("memory store lock poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
