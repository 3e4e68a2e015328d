//! Persisted session record and the commands that drive it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{keys, snapshot_value, Store};

/// Name of the single wake-up alarm a running session owns.
pub const ALARM_NAME: &str = "focus_mode_alarm";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionPhase {
    #[default]
    Idle,
    Work,
    Break,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Work => "WORK",
            SessionPhase::Break => "BREAK",
        }
    }

    pub fn is_running(self) -> bool {
        self != SessionPhase::Idle
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed pomodoros per UTC day (`YYYY-MM-DD`).
pub type History = BTreeMap<String, u64>;

/// Snapshot of every session field, read in one consistent pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub phase: SessionPhase,
    /// Ms since epoch. Unset while idle.
    pub end_time: Option<i64>,
    /// Planned length of the current session in ms. Unset while idle.
    pub total_duration: Option<i64>,
    pub pomodoros_completed: u64,
    pub history: History,
    pub revision: u64,
}

impl SessionRecord {
    pub const KEYS: [&'static str; 6] = [
        keys::SESSION_STATE,
        keys::END_TIME,
        keys::TOTAL_DURATION,
        keys::POMODOROS_COMPLETED,
        keys::POMODORO_HISTORY,
        keys::SESSION_REVISION,
    ];

    /// Read the record. Missing or malformed fields take their defaults.
    pub fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let snapshot = store.get_many(&Self::KEYS)?;
        Ok(Self {
            phase: snapshot_value(&snapshot, keys::SESSION_STATE).unwrap_or_default(),
            end_time: snapshot_value(&snapshot, keys::END_TIME),
            total_duration: snapshot_value(&snapshot, keys::TOTAL_DURATION),
            pomodoros_completed: snapshot_value(&snapshot, keys::POMODOROS_COMPLETED)
                .unwrap_or_default(),
            history: snapshot_value(&snapshot, keys::POMODORO_HISTORY).unwrap_or_default(),
            revision: snapshot_value(&snapshot, keys::SESSION_REVISION).unwrap_or_default(),
        })
    }

    /// Completed pomodoros recorded for `day`.
    pub fn completed_on(&self, day: &str) -> u64 {
        self.history.get(day).copied().unwrap_or(0)
    }
}

/// Messages accepted by the engine, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartTimer,
    StopTimer,
    UpdateRules,
    PlaySoundPreview { src: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WriteBatch};
    use serde_json::json;

    #[test]
    fn phase_wire_names() {
        assert_eq!(serde_json::to_value(SessionPhase::Work).unwrap(), json!("WORK"));
        let phase: SessionPhase = serde_json::from_value(json!("BREAK")).unwrap();
        assert_eq!(phase, SessionPhase::Break);
        assert_eq!(SessionPhase::Idle.to_string(), "IDLE");
    }

    #[test]
    fn commands_are_type_tagged() {
        let cmd: Command = serde_json::from_str(r#"{"type":"START_TIMER"}"#).unwrap();
        assert_eq!(cmd, Command::StartTimer);
        let cmd: Command =
            serde_json::from_str(r#"{"type":"PLAY_SOUND_PREVIEW","src":"sounds/bell.mp3"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::PlaySoundPreview {
                src: "sounds/bell.mp3".into()
            }
        );
        assert_eq!(
            serde_json::to_value(Command::UpdateRules).unwrap(),
            json!({"type": "UPDATE_RULES"})
        );
        assert!(serde_json::from_str::<Command>(r#"{"type":"PAUSE"}"#).is_err());
    }

    #[test]
    fn empty_store_reads_as_idle() {
        let store = MemoryStore::new();
        let record = SessionRecord::load(&store).unwrap();
        assert_eq!(record, SessionRecord::default());
    }

    #[test]
    fn malformed_fields_fall_back() {
        let store = MemoryStore::new();
        store
            .apply(
                WriteBatch::new()
                    .set(keys::SESSION_STATE, "PAUSED")
                    .set(keys::POMODOROS_COMPLETED, "three")
                    .set(keys::END_TIME, 42),
            )
            .unwrap();
        let record = SessionRecord::load(&store).unwrap();
        assert_eq!(record.phase, SessionPhase::Idle);
        assert_eq!(record.pomodoros_completed, 0);
        assert_eq!(record.end_time, Some(42));
    }
}
