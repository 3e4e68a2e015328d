//! SQLite-backed store.
//!
//! Every key lives in one `kv` table with JSON text values. Batches run in
//! an immediate transaction so concurrent processes serialize on the
//! database lock. Commits made by other processes are detected through
//! `PRAGMA data_version` and republished as regular change batches.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{data_dir, new_change_channel, KeyChange, StorageChange, Store, WriteBatch};
use crate::error::{Result, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Last state of the database as seen by this connection.
struct ExternalView {
    data_version: i64,
    snapshot: HashMap<String, Value>,
}

/// SQLite key-value store shared by every process on the machine.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    external: Mutex<ExternalView>,
    changes: broadcast::Sender<StorageChange>,
}

impl SqliteStore {
    /// Open the store at `~/.config/focusguard/focusguard.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open_default() -> Result<Self> {
        let path = data_dir()?.join("focusguard.db");
        Ok(Self::open(&path)?)
    }

    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate(&conn)?;
        let external = ExternalView {
            data_version: data_version(&conn)?,
            snapshot: load_all(&conn)?,
        };
        Ok(Self {
            conn: Mutex::new(conn),
            external: Mutex::new(external),
            changes: new_change_channel(),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_external(&self) -> MutexGuard<'_, ExternalView> {
        self.external
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_own_change(&self, change: &StorageChange) {
        let mut external = self.lock_external();
        for c in &change.changes {
            match &c.new_value {
                Some(v) => {
                    external.snapshot.insert(c.key.clone(), v.clone());
                }
                None => {
                    external.snapshot.remove(&c.key);
                }
            }
        }
    }

    fn publish(&self, change: StorageChange) {
        if !change.is_empty() {
            let _ = self.changes.send(change);
        }
    }
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA data_version", [], |row| row.get(0))
}

fn read_raw(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
}

fn decode(key: &str, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn write_value(conn: &Connection, key: &str, value: Option<&Value>) -> Result<(), StoreError> {
    match value {
        Some(v) => {
            let text = serde_json::to_string(v).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, text],
            )?;
        }
        None => {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        }
    }
    Ok(())
}

fn load_all(conn: &Connection) -> Result<HashMap<String, Value>, StoreError> {
    let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = HashMap::new();
    for row in rows {
        let (key, raw) = row?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                out.insert(key, value);
            }
            Err(e) => warn!(%key, error = %e, "skipping undecodable row"),
        }
    }
    Ok(out)
}

fn diff(before: &HashMap<String, Value>, after: &HashMap<String, Value>) -> StorageChange {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let changes = keys
        .into_iter()
        .filter_map(|key| {
            let old_value = before.get(key).cloned();
            let new_value = after.get(key).cloned();
            (old_value != new_value).then(|| KeyChange {
                key: key.clone(),
                old_value,
                new_value,
            })
        })
        .collect();
    StorageChange { changes }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.lock_conn();
        read_raw(&conn, key)?
            .map(|raw| decode(key, &raw))
            .transpose()
    }

    fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let mut out = HashMap::new();
        for key in keys {
            if let Some(raw) = read_raw(&tx, key)? {
                out.insert(key.to_string(), decode(key, &raw)?);
            }
        }
        tx.commit()?;
        Ok(out)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let change = {
            let mut conn = self.lock_conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut change = StorageChange::default();
            for (key, value) in batch.into_writes() {
                let old_value = read_raw(&tx, &key)?.and_then(|raw| serde_json::from_str(&raw).ok());
                write_value(&tx, &key, value.as_ref())?;
                if old_value != value {
                    change.changes.push(KeyChange {
                        key,
                        old_value,
                        new_value: value,
                    });
                }
            }
            tx.commit()?;
            self.record_own_change(&change);
            change
        };
        debug!(keys = change.changes.len(), "applied write batch");
        self.publish(change);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        let (result, change) = {
            let mut conn = self.lock_conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let old_value = read_raw(&tx, key)?.and_then(|raw| serde_json::from_str(&raw).ok());
            let new_value = f(old_value.clone());
            write_value(&tx, key, new_value.as_ref())?;
            tx.commit()?;
            let mut change = StorageChange::default();
            if old_value != new_value {
                change.changes.push(KeyChange {
                    key: key.to_string(),
                    old_value,
                    new_value: new_value.clone(),
                });
            }
            self.record_own_change(&change);
            (new_value, change)
        };
        self.publish(change);
        Ok(result)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn poll_external(&self) -> Result<(), StoreError> {
        let change = {
            let conn = self.lock_conn();
            let version = data_version(&conn)?;
            let mut external = self.lock_external();
            if version == external.data_version {
                return Ok(());
            }
            let current = load_all(&conn)?;
            let change = diff(&external.snapshot, &current);
            external.data_version = version;
            external.snapshot = current;
            change
        };
        if !change.is_empty() {
            debug!(keys = change.changes.len(), "observed external write");
        }
        self.publish(change);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;
    use serde_json::json;

    #[test]
    fn kv_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("test").unwrap().is_none());
        store
            .apply(WriteBatch::new().set("test", json!({"a": [1, 2]})))
            .unwrap();
        assert_eq!(store.get("test").unwrap().unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn batch_removes_and_sets_together() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .apply(WriteBatch::new().set("sessionState", "WORK").set("endTime", 10))
            .unwrap();
        let mut rx = store.subscribe();
        store
            .apply(
                WriteBatch::new()
                    .set("sessionState", "IDLE")
                    .remove("endTime"),
            )
            .unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.changes.len(), 2);
        assert_eq!(change.get("endTime").unwrap().old_value, Some(json!(10)));
        assert_eq!(change.get("endTime").unwrap().new_value, None);
        assert!(store.get("endTime").unwrap().is_none());
    }

    #[test]
    fn corrupt_row_reports_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock_conn()
            .execute(
                "INSERT INTO kv (key, value) VALUES ('tasks', '{broken')",
                [],
            )
            .unwrap();
        let err = store.get_as::<Vec<u64>>("tasks").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == "tasks"));
    }

    #[test]
    fn external_commit_is_republished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let writer = SqliteStore::open(&path).unwrap();
        let reader = SqliteStore::open(&path).unwrap();
        let mut rx = reader.subscribe();

        writer
            .apply(WriteBatch::new().set("blockedSites", json!(["a.com"])))
            .unwrap();
        reader.poll_external().unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(
            change.get("blockedSites").unwrap().new_value,
            Some(json!(["a.com"]))
        );

        // Nothing new: no duplicate publication.
        reader.poll_external().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn own_writes_are_not_republished_by_poll() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();
        store.apply(WriteBatch::new().set("k", 1)).unwrap();
        assert!(rx.try_recv().is_ok());
        store.poll_external().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
