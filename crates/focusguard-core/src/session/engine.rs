//! Session state machine.
//!
//! ## State Transitions
//!
//! ```text
//! IDLE --START--> WORK --wake--> BREAK --wake--> WORK ...
//!   ^                                              |
//!   +-------------------- STOP --------------------+
//! ```
//!
//! Every transition writes the whole session record in one store batch,
//! re-arms the single wake-up alarm and recompiles the blocking rules. The
//! engine holds no session state of its own; each handler starts from a
//! fresh store read.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::state::{Command, SessionPhase, SessionRecord, ALARM_NAME};
use crate::alarms::AlarmScheduler;
use crate::clock::{Clock, SystemClock};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::rules::{compile_with, CompileOptions, RuleSet, RuleSink};
use crate::settings::{PomodoroSettings, SoundSource};
use crate::store::{keys, snapshot_value, Store, StoreExt, WriteBatch};

const MS_PER_MINUTE: i64 = 60_000;

pub struct SessionEngine {
    store: Arc<dyn Store>,
    alarms: Arc<dyn AlarmScheduler>,
    sink: Arc<dyn RuleSink>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    options: CompileOptions,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn Store>,
        alarms: Arc<dyn AlarmScheduler>,
        sink: Arc<dyn RuleSink>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            store,
            alarms,
            sink,
            dispatcher,
            clock: Arc::new(SystemClock),
            options: CompileOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current phase. A malformed stored value reads as IDLE.
    pub fn phase(&self) -> Result<SessionPhase> {
        Ok(self.store.get_or_default(keys::SESSION_STATE)?)
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Move to the next session.
    ///
    /// After WORK the completed counter and today's history bucket go up by
    /// one and a break follows; every `longBreakInterval`-th break is long.
    /// After a break (or from IDLE) a WORK session follows.
    pub fn advance_session(&self, was_work_session: bool) -> Result<SessionPhase> {
        let record = SessionRecord::load(self.store.as_ref())?;
        let settings = PomodoroSettings::load(self.store.as_ref())?;

        let mut completed = record.pomodoros_completed;
        let mut history = record.history;
        let (next, minutes) = if was_work_session {
            completed += 1;
            *history.entry(self.clock.today()).or_insert(0) += 1;
            if completed % u64::from(settings.long_break_interval) == 0 {
                (SessionPhase::Break, settings.long_break_duration)
            } else {
                (SessionPhase::Break, settings.short_break_duration)
            }
        } else {
            (SessionPhase::Work, settings.work_duration)
        };

        let duration_ms = i64::from(minutes) * MS_PER_MINUTE;
        let end_time = self.clock.now_ms() + duration_ms;

        let batch = WriteBatch::new()
            .set(keys::SESSION_STATE, next.as_str())
            .set(keys::END_TIME, end_time)
            .set(keys::TOTAL_DURATION, duration_ms)
            .set(keys::POMODOROS_COMPLETED, completed)
            .set(keys::POMODORO_HISTORY, serde_json::to_value(&history)?)
            .set(keys::SESSION_REVISION, record.revision + 1);

        // Arm before writing: a running session must always have a wake-up.
        let previous = self.alarms.scheduled(ALARM_NAME)?;
        self.alarms.create(ALARM_NAME, end_time)?;
        if let Err(e) = self.store.apply(batch) {
            let restored = match previous {
                Some(when) => self.alarms.create(ALARM_NAME, when),
                None => self.alarms.clear(ALARM_NAME).map(|_| ()),
            };
            if let Err(re) = restored {
                warn!(error = %re, "could not restore previous alarm");
            }
            return Err(e.into());
        }

        info!(
            phase = %next,
            minutes,
            completed,
            end_time,
            "session advanced"
        );
        self.refresh_rules();
        Ok(next)
    }

    /// Start a WORK session from any state.
    pub fn start(&self) -> Result<()> {
        self.advance_session(false).map(|_| ())
    }

    /// Return to IDLE. The alarm is cleared before state is written so a
    /// pending wake-up can never act on the stopped session.
    pub fn stop(&self) -> Result<()> {
        let cleared = self.alarms.clear(ALARM_NAME)?;
        let record = SessionRecord::load(self.store.as_ref())?;
        self.store.apply(
            WriteBatch::new()
                .set(keys::SESSION_STATE, SessionPhase::Idle.as_str())
                .remove(keys::END_TIME)
                .remove(keys::TOTAL_DURATION)
                .set(keys::POMODOROS_COMPLETED, 0)
                .set(keys::SESSION_REVISION, record.revision + 1),
        )?;
        info!(alarm_cleared = cleared, "session stopped");
        self.refresh_rules();
        Ok(())
    }

    // ── Rules ───────────────────────────────────────────────────────

    /// Compile the rule set for the stored state and site lists.
    pub fn compile_current(&self) -> Result<RuleSet> {
        let snapshot = self.store.get_many(&[
            keys::SESSION_STATE,
            keys::BLOCKED_SITES,
            keys::WHITELISTED_SITES,
        ])?;
        let phase: SessionPhase =
            snapshot_value(&snapshot, keys::SESSION_STATE).unwrap_or_default();
        let blocked: Vec<String> =
            snapshot_value(&snapshot, keys::BLOCKED_SITES).unwrap_or_default();
        let whitelisted: Vec<String> =
            snapshot_value(&snapshot, keys::WHITELISTED_SITES).unwrap_or_default();
        Ok(compile_with(&self.options, phase, &blocked, &whitelisted))
    }

    /// Recompile and replace every installed rule.
    pub fn try_refresh_rules(&self) -> Result<RuleSet> {
        let set = self.compile_current()?;
        let installed = self.sink.installed_ids()?;
        self.sink.replace(&installed, &set.rules)?;
        debug!(removed = installed.len(), added = set.len(), "rules replaced");
        Ok(set)
    }

    /// Like [`try_refresh_rules`](Self::try_refresh_rules), but a failure is
    /// logged and the previously installed rules stay in place.
    pub fn refresh_rules(&self) {
        if let Err(e) = self.try_refresh_rules() {
            error!(error = %e, "failed to update blocking rules");
        }
    }

    // ── Event handlers ──────────────────────────────────────────────

    pub async fn on_command(&self, command: Command) {
        debug!(?command, "command received");
        let result = match command {
            Command::StartTimer => self.start(),
            Command::StopTimer => self.stop(),
            Command::UpdateRules => {
                self.refresh_rules();
                Ok(())
            }
            Command::PlaySoundPreview { src } => {
                self.dispatcher.preview(&SoundSource::from(src)).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            error!(error = %e, "command failed");
        }
    }

    /// Handle a fired alarm.
    pub async fn on_wake_up(&self, name: &str) {
        if name != ALARM_NAME {
            debug!(%name, "ignoring unrelated alarm");
            return;
        }
        let before = match SessionRecord::load(self.store.as_ref()) {
            Ok(record) if record.phase == SessionPhase::Idle => {
                info!("stale wake-up while idle");
                return;
            }
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "could not read session state");
                return;
            }
        };
        let ended = before.phase;

        self.dispatcher.session_ended(ended).await;

        // Another handler (a STOP or a fresh START) may have written the
        // session while the notification was out; its write wins.
        match SessionRecord::load(self.store.as_ref()) {
            Ok(current) if current.revision != before.revision => {
                info!(
                    ended = %ended,
                    phase = %current.phase,
                    "session changed during wake-up, not advancing"
                );
            }
            Ok(_) => {
                if let Err(e) = self.advance_session(ended == SessionPhase::Work) {
                    error!(error = %e, "failed to advance session");
                }
            }
            Err(e) => error!(error = %e, "could not read session state"),
        }
    }

    /// Reconcile persisted state after a (re)start.
    ///
    /// A live session gets its alarm back; one whose end time has already
    /// passed is reset to IDLE. Rules are always recompiled.
    pub fn on_startup(&self) {
        if let Err(e) = self.restore_session() {
            error!(error = %e, "failed to restore session");
        }
        self.refresh_rules();
    }

    fn restore_session(&self) -> Result<()> {
        let record = SessionRecord::load(self.store.as_ref())?;
        if !record.phase.is_running() {
            return Ok(());
        }
        let now = self.clock.now_ms();
        match record.end_time {
            Some(end) if end > now => {
                self.alarms.create(ALARM_NAME, end)?;
                info!(phase = %record.phase, end_time = end, "session restored");
            }
            _ => {
                warn!(phase = %record.phase, end_time = ?record.end_time, "session expired, resetting");
                self.alarms.clear(ALARM_NAME)?;
                self.store.apply(
                    WriteBatch::new()
                        .set(keys::SESSION_STATE, SessionPhase::Idle.as_str())
                        .remove(keys::END_TIME)
                        .remove(keys::TOTAL_DURATION)
                        .set(keys::SESSION_REVISION, record.revision + 1),
                )?;
            }
        }
        Ok(())
    }
}
