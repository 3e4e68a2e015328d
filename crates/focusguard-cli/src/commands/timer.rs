use std::io::Write;
use std::time::Duration;

use focusguard_core::{SessionView, SystemClock};
use tokio::sync::broadcast::error::RecvError;

use crate::app::{App, CmdResult};

fn render(view: &SessionView) -> String {
    if view.stale {
        return format!("{} (overdue, run `focusguard daemon`)", view.title);
    }
    match view.phase {
        focusguard_core::SessionPhase::Idle => {
            format!("{}  completed today: {}", view.title, view.today_count)
        }
        _ => format!(
            "{}  {}  {:>3.0}%  completed today: {}",
            view.title,
            view.countdown,
            view.progress * 100.0,
            view.today_count
        ),
    }
}

pub fn start() -> CmdResult {
    let app = App::open()?;
    app.engine.start()?;
    println!("{}", render(&SessionView::from_store(app.store.as_ref(), &SystemClock)?));
    Ok(())
}

pub fn stop() -> CmdResult {
    let app = App::open()?;
    app.engine.stop()?;
    println!("stopped");
    Ok(())
}

pub fn status(json: bool) -> CmdResult {
    let app = App::open()?;
    let view = SessionView::from_store(app.store.as_ref(), &SystemClock)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", render(&view));
    }
    Ok(())
}

/// Redraw every second and on every store change until Ctrl-C.
pub async fn watch() -> CmdResult {
    let app = App::open()?;
    let mut changes = app.store.subscribe();
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = interval.tick() => {
                // Surfaces writes made by other processes on `changes`.
                app.store.poll_external()?;
            }
            change = changes.recv() => match change {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
        let view = SessionView::from_store(app.store.as_ref(), &SystemClock)?;
        let mut out = std::io::stdout().lock();
        write!(out, "\r\x1b[2K{}", render(&view))?;
        out.flush()?;
    }
    println!();
    Ok(())
}
