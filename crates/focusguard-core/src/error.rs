//! Core error types for focusguard-core.
//!
//! Every fallible operation in the library returns [`CoreError`] (or one of
//! its component errors). Engine entry points log and swallow these; the
//! lower layers propagate them with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The rule sink refused a rule batch
    #[error("Rule sink error: {0}")]
    RuleSink(#[from] RuleSinkError),

    /// Sound playback errors
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another process
    #[error("Store is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Corrupt value for key '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// No home/data directory available
    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Validation errors for user input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Input could not be reduced to a hostname
    #[error("Invalid hostname: '{0}'")]
    InvalidHostname(String),

    /// Task text was empty after trimming
    #[error("Task text must not be empty")]
    EmptyTaskText,

    /// No task with the given id
    #[error("Task {0} not found")]
    UnknownTask(u64),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Rule sink rejections.
#[derive(Error, Debug)]
pub enum RuleSinkError {
    /// Rule ids must be positive
    #[error("Rule id must be positive")]
    ZeroId,

    /// Rule ids must be unique within a batch
    #[error("Duplicate rule id {0}")]
    DuplicateId(u32),

    /// The match pattern is not usable
    #[error("Malformed pattern in rule {id}: '{pattern}'")]
    MalformedPattern { id: u32, pattern: String },

    /// Reading the installed set failed
    #[error("Failed to read rules from {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    /// Writing the installed set failed
    #[error("Failed to write rules to {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },
}

/// Sound playback errors.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The playback surface could not be created
    #[error("Failed to create playback surface: {0}")]
    SurfaceUnavailable(String),

    /// The sound payload could not be decoded
    #[error("Invalid sound payload: {0}")]
    InvalidPayload(String),

    /// The player failed to start
    #[error("Player failed: {0}")]
    PlayerFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
