//! Persistent key-value state shared by every component.
//!
//! Values are JSON. Writes go through [`WriteBatch`]es that are applied
//! atomically and published to subscribers as a single [`StorageChange`].
//! Nothing above this layer caches store contents; every handler re-reads.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{ConfigError, StoreError};

/// Persisted key names.
pub mod keys {
    pub const SESSION_STATE: &str = "sessionState";
    pub const END_TIME: &str = "endTime";
    pub const TOTAL_DURATION: &str = "totalDuration";
    pub const POMODOROS_COMPLETED: &str = "pomodorosCompleted";
    pub const POMODORO_HISTORY: &str = "pomodoroHistory";
    pub const SESSION_REVISION: &str = "sessionRevision";
    pub const POMODORO_SETTINGS: &str = "pomodoroSettings";
    pub const BLOCKED_SITES: &str = "blockedSites";
    pub const WHITELISTED_SITES: &str = "whitelistedSites";
    pub const SELECTED_SOUND: &str = "selectedSound";
    pub const CUSTOM_SOUND_NAME: &str = "customSoundName";
    pub const CUSTOM_SOUND_DATA: &str = "customSoundData";
    pub const TASKS: &str = "tasks";
    pub const TASK_ID_SEQ: &str = "taskIdSeq";
    pub const ALARMS: &str = "alarms";
}

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// One key's transition inside a [`StorageChange`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// All key transitions produced by one atomic write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorageChange {
    pub changes: Vec<KeyChange>,
}

impl StorageChange {
    pub fn get(&self, key: &str) -> Option<&KeyChange> {
        self.changes.iter().find(|c| c.key == key)
    }

    pub fn touches(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// An ordered list of sets and removals applied as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<(String, Option<Value>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.writes.push((key.into(), Some(value.into())));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.writes.push((key.into(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn into_writes(self) -> Vec<(String, Option<Value>)> {
        self.writes
    }
}

/// The store contract every backend implements.
pub trait Store: Send + Sync {
    /// Read one key. `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Read several keys from one consistent snapshot. Absent keys are omitted.
    fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Apply every write in `batch` atomically and publish one change.
    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Atomic read-modify-write of a single key. Returning `None` from `f`
    /// removes the key. Returns the value `f` produced.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<Option<Value>, StoreError>;

    /// Subscribe to change batches.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Publish changes made by other processes since the last call.
    /// Backends without external writers have nothing to do.
    fn poll_external(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Typed helpers on top of [`Store`].
pub trait StoreExt: Store {
    /// Decode a key. JSON `null` reads as absent.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Decode a key, substituting the default when absent or malformed.
    fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        match self.get_as(key) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(StoreError::Corrupt { key, message }) => {
                warn!(%key, %message, "ignoring malformed stored value");
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Decode a value out of a `get_many` snapshot, treating malformed as absent.
pub(crate) fn snapshot_value<T: DeserializeOwned>(
    snapshot: &HashMap<String, Value>,
    key: &str,
) -> Option<T> {
    let value = snapshot.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(%key, error = %e, "ignoring malformed stored value");
            None
        }
    }
}

pub(crate) fn new_change_channel() -> broadcast::Sender<StorageChange> {
    broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}

/// Returns `~/.config/focusguard[-dev]/` based on FOCUSGUARD_ENV.
///
/// Set FOCUSGUARD_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSGUARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusguard-dev")
    } else {
        base_dir.join("focusguard")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_batch_keeps_order() {
        let batch = WriteBatch::new()
            .set("a", 1)
            .remove("b")
            .set("c", "x");
        assert_eq!(batch.len(), 3);
        let writes = batch.into_writes();
        assert_eq!(writes[0], ("a".to_string(), Some(json!(1))));
        assert_eq!(writes[1], ("b".to_string(), None));
        assert_eq!(writes[2], ("c".to_string(), Some(json!("x"))));
    }

    #[test]
    fn get_as_treats_null_as_absent() {
        let store = MemoryStore::new();
        store.apply(WriteBatch::new().set("endTime", Value::Null)).unwrap();
        assert_eq!(store.get_as::<u64>("endTime").unwrap(), None);
    }

    #[test]
    fn get_or_default_swallows_malformed_values() {
        let store = MemoryStore::new();
        store.apply(WriteBatch::new().set("tasks", "not a list")).unwrap();
        let tasks: Vec<u64> = store.get_or_default("tasks").unwrap();
        assert!(tasks.is_empty());
        assert!(store.get_as::<Vec<u64>>("tasks").is_err());
    }
}
