//! User-configured Pomodoro settings and sound selection.
//!
//! Both live in the store, not in `config.toml`: every observer reads the
//! same values the engine uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, StoreError, ValidationError};
use crate::store::{keys, Store, StoreExt, WriteBatch};

fn default_work_duration() -> u32 {
    25
}
fn default_short_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}

/// Durations in minutes, interval in completed pomodoros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub long_break_interval: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            short_break_duration: default_short_break_duration(),
            long_break_duration: default_long_break_duration(),
            long_break_interval: default_long_break_interval(),
        }
    }
}

impl PomodoroSettings {
    /// Decode a stored settings object. Each field that is missing,
    /// non-numeric or not positive falls back to its own default.
    pub fn from_value(value: Option<&Value>) -> Self {
        let field = |name: &str, default: fn() -> u32| -> u32 {
            match value.and_then(|v| v.get(name)) {
                None => default(),
                Some(raw) => match raw.as_u64().filter(|n| *n > 0 && *n <= u32::MAX as u64) {
                    Some(n) => n as u32,
                    None => {
                        warn!(field = name, value = %raw, "invalid pomodoro setting, using default");
                        default()
                    }
                },
            }
        };
        Self {
            work_duration: field("workDuration", default_work_duration),
            short_break_duration: field("shortBreakDuration", default_short_break_duration),
            long_break_duration: field("longBreakDuration", default_long_break_duration),
            long_break_interval: field("longBreakInterval", default_long_break_interval),
        }
    }

    /// Read the effective settings from the store.
    pub fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let value = store.get(keys::POMODORO_SETTINGS)?;
        Ok(Self::from_value(value.as_ref()))
    }

    /// Persist these settings as one nested object.
    pub fn save(&self, store: &dyn Store) -> Result<()> {
        self.validate()?;
        store.apply(WriteBatch::new().set(keys::POMODORO_SETTINGS, serde_json::to_value(self)?))?;
        Ok(())
    }

    /// Set one field by its stored (camelCase) name.
    pub fn set_field(&mut self, name: &str, value: u32) -> Result<(), ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidValue {
                field: name.to_string(),
                message: "must be a positive integer".into(),
            });
        }
        let slot = match name {
            "workDuration" => &mut self.work_duration,
            "shortBreakDuration" => &mut self.short_break_duration,
            "longBreakDuration" => &mut self.long_break_duration,
            "longBreakInterval" => &mut self.long_break_interval,
            other => {
                return Err(ValidationError::InvalidValue {
                    field: other.to_string(),
                    message: "unknown setting".into(),
                })
            }
        };
        *slot = value;
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, v) in [
            ("workDuration", self.work_duration),
            ("shortBreakDuration", self.short_break_duration),
            ("longBreakDuration", self.long_break_duration),
            ("longBreakInterval", self.long_break_interval),
        ] {
            if v == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: "must be a positive integer".into(),
                });
            }
        }
        Ok(())
    }
}

/// A built-in sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundPreset {
    pub name: &'static str,
    pub path: &'static str,
}

pub const DEFAULT_SOUNDS: [SoundPreset; 4] = [
    SoundPreset { name: "Notification", path: "sounds/notification.mp3" },
    SoundPreset { name: "Bell", path: "sounds/bell.mp3" },
    SoundPreset { name: "Chime", path: "sounds/chime.mp3" },
    SoundPreset { name: "None", path: "none" },
];

const CUSTOM: &str = "custom";
const NONE: &str = "none";

/// What to play when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SoundSource {
    /// A bundled sound, by relative path.
    Preset(String),
    /// The uploaded payload stored under `customSoundData`.
    Custom,
    /// Silence.
    None,
}

impl From<String> for SoundSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            CUSTOM => SoundSource::Custom,
            NONE | "" => SoundSource::None,
            _ => SoundSource::Preset(s),
        }
    }
}

impl From<&str> for SoundSource {
    fn from(s: &str) -> Self {
        SoundSource::from(s.to_string())
    }
}

impl From<SoundSource> for String {
    fn from(src: SoundSource) -> Self {
        match src {
            SoundSource::Preset(path) => path,
            SoundSource::Custom => CUSTOM.to_string(),
            SoundSource::None => NONE.to_string(),
        }
    }
}

impl Default for SoundSource {
    fn default() -> Self {
        SoundSource::Preset(DEFAULT_SOUNDS[0].path.to_string())
    }
}

impl SoundSource {
    /// Resolve a preset by display name (case-insensitive) or by path.
    pub fn from_user_input(input: &str) -> Self {
        let trimmed = input.trim();
        DEFAULT_SOUNDS
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(trimmed))
            .map(|p| SoundSource::from(p.path))
            .unwrap_or_else(|| SoundSource::from(trimmed))
    }

    pub fn selected(store: &dyn Store) -> Result<Self, StoreError> {
        Ok(store
            .get_or_default::<Option<SoundSource>>(keys::SELECTED_SOUND)?
            .unwrap_or_default())
    }

    pub fn select(&self, store: &dyn Store) -> Result<(), StoreError> {
        store.apply(WriteBatch::new().set(keys::SELECTED_SOUND, String::from(self.clone())))
    }
}

/// Store an uploaded sound as a data URL and select it.
pub fn upload_custom_sound(
    store: &dyn Store,
    file_name: &str,
    mime: &str,
    bytes: &[u8],
) -> Result<(), StoreError> {
    use base64::Engine as _;
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    store.apply(
        WriteBatch::new()
            .set(keys::CUSTOM_SOUND_DATA, format!("data:{mime};base64,{payload}"))
            .set(keys::CUSTOM_SOUND_NAME, file_name)
            .set(keys::SELECTED_SOUND, CUSTOM),
    )
}

/// Drop the uploaded sound and revert to the default preset.
pub fn remove_custom_sound(store: &dyn Store) -> Result<(), StoreError> {
    store.apply(
        WriteBatch::new()
            .remove(keys::CUSTOM_SOUND_DATA)
            .remove(keys::CUSTOM_SOUND_NAME)
            .set(keys::SELECTED_SOUND, DEFAULT_SOUNDS[0].path),
    )
}
