//! Key-value persistence for timer snapshots
//!
//! The timer has no opinion on the storage medium; it only needs a string
//! get/set/remove contract and one well-known key.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use tracing::debug;

use crate::{
    error::{Result, StoreError, TimerError},
    state::TimerSnapshot,
};

/// String key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Keys are used as file names by [`FileStore`], so keep them plain
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Reads and writes the timer snapshot under a single key
#[derive(Debug, Clone)]
pub struct SnapshotStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> SnapshotStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(&self.key, &json)?;
        Ok(())
    }

    /// `Ok(None)` when nothing was saved; undecodable data is an error
    pub fn load(&self) -> Result<Option<TimerSnapshot>> {
        let Some(raw) = self.store.get(&self.key)? else {
            debug!("No snapshot stored under '{}'", self.key);
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TimerError::MalformedSnapshot(e.to_string()))
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key)?;
        Ok(())
    }
}
