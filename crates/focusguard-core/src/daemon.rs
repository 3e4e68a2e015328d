//! Single-threaded event loop driving the engine.
//!
//! Two event sources feed one loop: a periodic tick (pick up writes from
//! other processes, fire due alarms) and a command channel. Each event is
//! handled to completion before the next is taken.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::alarms::StoreAlarms;
use crate::session::{Command, SessionEngine};

pub const DEFAULT_TICK: Duration = Duration::from_millis(1000);

pub struct Daemon {
    engine: Arc<SessionEngine>,
    alarms: StoreAlarms,
    tick: Duration,
}

impl Daemon {
    pub fn new(engine: Arc<SessionEngine>, alarms: StoreAlarms) -> Self {
        Self {
            engine,
            alarms,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(10));
        self
    }

    /// One poll: publish external store changes, then fire due alarms.
    pub async fn tick(&self) {
        if let Err(e) = self.engine.store().poll_external() {
            warn!(error = %e, "failed to poll store");
        }
        let now = self.engine.clock().now_ms();
        match self.alarms.take_due(now) {
            Ok(due) => {
                for name in due {
                    debug!(%name, "alarm fired");
                    self.engine.on_wake_up(&name).await;
                }
            }
            Err(e) => error!(error = %e, "failed to read alarms"),
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// A closed command channel does not stop the loop; alarms keep firing.
    pub async fn run(&self, mut commands: mpsc::Receiver<Command>, shutdown: impl Future<Output = ()>) {
        self.engine.on_startup();
        info!(tick_ms = self.tick.as_millis() as u64, "daemon started");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("daemon shutting down");
                    break;
                }
                _ = interval.tick() => self.tick().await,
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.engine.on_command(command).await,
                    None => {
                        debug!("command channel closed");
                        commands_open = false;
                    }
                },
            }
        }
    }
}
