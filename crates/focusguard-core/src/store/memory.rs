//! In-process store backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::broadcast;

use super::{new_change_channel, KeyChange, StorageChange, Store, WriteBatch};
use crate::error::StoreError;

/// Store held entirely in memory. Used by tests and by embedders that
/// bring their own persistence.
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            changes: new_change_channel(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: StorageChange) {
        if !change.is_empty() {
            // No receivers is fine.
            let _ = self.changes.send(change);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let data = self.lock();
        Ok(keys
            .iter()
            .filter_map(|k| data.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let change = {
            let mut data = self.lock();
            let mut change = StorageChange::default();
            for (key, value) in batch.into_writes() {
                let old_value = match &value {
                    Some(v) => data.insert(key.clone(), v.clone()),
                    None => data.remove(&key),
                };
                if old_value != value {
                    change.changes.push(KeyChange {
                        key,
                        old_value,
                        new_value: value,
                    });
                }
            }
            change
        };
        self.publish(change);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        let (result, change) = {
            let mut data = self.lock();
            let old_value = data.get(key).cloned();
            let new_value = f(old_value.clone());
            match &new_value {
                Some(v) => {
                    data.insert(key.to_string(), v.clone());
                }
                None => {
                    data.remove(key);
                }
            }
            let mut change = StorageChange::default();
            if old_value != new_value {
                change.changes.push(KeyChange {
                    key: key.to_string(),
                    old_value,
                    new_value: new_value.clone(),
                });
            }
            (new_value, change)
        };
        self.publish(change);
        Ok(result)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
