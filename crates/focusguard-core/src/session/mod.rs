//! Focus session state machine.

mod engine;
mod state;

pub use engine::SessionEngine;
pub use state::{Command, History, SessionPhase, SessionRecord, ALARM_NAME};
