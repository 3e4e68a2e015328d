//! # FocusGuard Core Library
//!
//! Core logic for the FocusGuard focus timer: a Pomodoro session state
//! machine paired with a site-blocking rule compiler. The `focusguard` CLI is
//! a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Store**: JSON key-value state with atomic batches and change
//!   notification, backed by SQLite so several processes share one session
//! - **Session Engine**: IDLE/WORK/BREAK transitions driven by one wake-up
//!   alarm; every transition is persisted before anything else happens
//! - **Rule Compiler**: pure projection of session state and site lists onto
//!   redirect rules, installed through a [`RuleSink`]
//! - **Daemon**: tick + command loop that fires alarms
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: transitions, commands and wake-up handling
//! - [`Store`]: persistence contract ([`SqliteStore`], [`MemoryStore`])
//! - [`compile`]: rule compiler
//! - [`Config`]: application configuration

pub mod alarms;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod rules;
pub mod session;
pub mod settings;
pub mod sites;
pub mod store;
pub mod tasks;
pub mod view;

pub use alarms::{AlarmScheduler, StoreAlarms};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::{Dispatcher, Notification, Notifier, PlaybackSurface, SoundClip, SurfaceFactory};
pub use error::{ConfigError, CoreError, PlaybackError, RuleSinkError, StoreError, ValidationError};
pub use rules::{compile, compile_with, CompileOptions, JsonRuleSink, MemoryRuleSink, Rule, RuleSet, RuleSink};
pub use session::{Command, SessionEngine, SessionPhase, SessionRecord, ALARM_NAME};
pub use settings::{PomodoroSettings, SoundSource, DEFAULT_SOUNDS};
pub use sites::{normalize_hostname, AddOutcome, SiteList};
pub use store::{keys, MemoryStore, SqliteStore, StorageChange, Store, StoreExt, WriteBatch};
pub use tasks::{Task, TaskList};
pub use view::SessionView;
