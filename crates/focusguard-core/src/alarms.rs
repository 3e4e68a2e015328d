//! Named one-shot wake-ups.
//!
//! An alarm is armed for an absolute time and fires at most once. Arming a
//! name that is already armed replaces it; clearing removes it so it can
//! never fire. Alarms are persisted under one store key, so any process can
//! arm or clear them and the daemon that polls [`StoreAlarms::take_due`]
//! fires them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{keys, Store};

pub trait AlarmScheduler: Send + Sync {
    /// Arm `name` for `when_ms` (ms since epoch), replacing any earlier arm.
    fn create(&self, name: &str, when_ms: i64) -> Result<(), StoreError>;

    /// Disarm `name`. Returns whether an alarm was pending.
    fn clear(&self, name: &str) -> Result<bool, StoreError>;

    /// The pending fire time of `name`, if armed.
    fn scheduled(&self, name: &str) -> Result<Option<i64>, StoreError>;
}

pub type AlarmTable = BTreeMap<String, i64>;

fn decode(value: Option<&Value>) -> AlarmTable {
    match value {
        None | Some(Value::Null) => AlarmTable::new(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "discarding malformed alarm table");
            AlarmTable::new()
        }),
    }
}

fn encode(table: &AlarmTable) -> Option<Value> {
    if table.is_empty() {
        None
    } else {
        serde_json::to_value(table).ok()
    }
}

/// Alarms persisted in the shared store.
#[derive(Clone)]
pub struct StoreAlarms {
    store: Arc<dyn Store>,
}

impl StoreAlarms {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Remove and return every alarm due at `now_ms`, earliest first.
    ///
    /// The read and the removal happen in one atomic update, so an alarm is
    /// handed out exactly once even with several pollers.
    pub fn take_due(&self, now_ms: i64) -> Result<Vec<String>, StoreError> {
        let mut due: Vec<(i64, String)> = Vec::new();
        self.store.update(keys::ALARMS, &mut |current| {
            due.clear();
            let mut table = decode(current.as_ref());
            table.retain(|name, when| {
                if *when <= now_ms {
                    due.push((*when, name.clone()));
                    false
                } else {
                    true
                }
            });
            if due.is_empty() {
                current
            } else {
                encode(&table)
            }
        })?;
        due.sort();
        if !due.is_empty() {
            debug!(count = due.len(), "alarms due");
        }
        Ok(due.into_iter().map(|(_, name)| name).collect())
    }

    /// Every armed alarm.
    pub fn pending(&self) -> Result<AlarmTable, StoreError> {
        Ok(decode(self.store.get(keys::ALARMS)?.as_ref()))
    }
}

impl AlarmScheduler for StoreAlarms {
    fn create(&self, name: &str, when_ms: i64) -> Result<(), StoreError> {
        self.store.update(keys::ALARMS, &mut |current| {
            let mut table = decode(current.as_ref());
            table.insert(name.to_string(), when_ms);
            encode(&table)
        })?;
        debug!(%name, when_ms, "alarm armed");
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<bool, StoreError> {
        let mut existed = false;
        self.store.update(keys::ALARMS, &mut |current| {
            let mut table = decode(current.as_ref());
            existed = table.remove(name).is_some();
            if existed {
                encode(&table)
            } else {
                current
            }
        })?;
        Ok(existed)
    }

    fn scheduled(&self, name: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.pending()?.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn alarms() -> StoreAlarms {
        StoreAlarms::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn fires_once_when_due() {
        let a = alarms();
        a.create("focus", 1_000).unwrap();
        assert!(a.take_due(999).unwrap().is_empty());
        assert_eq!(a.take_due(1_000).unwrap(), vec!["focus"]);
        assert!(a.take_due(5_000).unwrap().is_empty());
    }

    #[test]
    fn cleared_alarm_never_fires() {
        let a = alarms();
        a.create("focus", 1_000).unwrap();
        assert!(a.clear("focus").unwrap());
        assert!(!a.clear("focus").unwrap());
        assert!(a.take_due(10_000).unwrap().is_empty());
    }

    #[test]
    fn rearming_supersedes() {
        let a = alarms();
        a.create("focus", 1_000).unwrap();
        a.create("focus", 9_000).unwrap();
        assert_eq!(a.pending().unwrap().len(), 1);
        assert!(a.take_due(5_000).unwrap().is_empty());
        assert_eq!(a.scheduled("focus").unwrap(), Some(9_000));
    }

    #[test]
    fn due_alarms_come_out_earliest_first() {
        let a = alarms();
        a.create("late", 300).unwrap();
        a.create("early", 100).unwrap();
        a.create("future", 10_000).unwrap();
        assert_eq!(a.take_due(500).unwrap(), vec!["early", "late"]);
        assert_eq!(a.scheduled("future").unwrap(), Some(10_000));
    }
}
