use std::time::Duration;

use focusguard_core::{Command, Daemon};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::{App, CmdResult};

/// Run the alarm loop. Commands arrive as JSON lines on stdin, e.g.
/// `{"type":"START_TIMER"}`.
pub async fn run() -> CmdResult {
    let app = App::open()?;
    let tick = Duration::from_millis(app.config.daemon.tick_ms);
    let daemon = Daemon::new(app.engine.clone(), app.alarms.clone()).with_tick(tick);

    let (tx, rx) = mpsc::channel::<Command>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Command>(line) {
                        Ok(command) => {
                            if tx.send(command).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, %line, "ignoring malformed command"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    break;
                }
            }
        }
    });

    info!(db = %app.config.db_path()?.display(), "starting daemon");
    daemon
        .run(rx, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
