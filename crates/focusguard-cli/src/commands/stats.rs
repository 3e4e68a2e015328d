use chrono::{Duration, Utc};
use clap::Subcommand;
use focusguard_core::{Clock, SessionRecord, SystemClock};
use serde_json::json;

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Pomodoros completed today
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-day counts for recent days
    History {
        /// Number of days to show
        #[arg(long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: StatsAction) -> CmdResult {
    let app = App::open()?;
    let record = SessionRecord::load(app.store.as_ref())?;

    match action {
        StatsAction::Today { json } => {
            let today = SystemClock.today();
            let count = record.completed_on(&today);
            if json {
                let stats = json!({
                    "date": today,
                    "completed": count,
                    "streak": record.pomodoros_completed,
                });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{today}: {count} pomodoro(s), {} in current run", record.pomodoros_completed);
            }
        }
        StatsAction::History { days, json } => {
            let today = Utc::now().date_naive();
            let rows: Vec<(String, u64)> = (0..i64::from(days))
                .rev()
                .map(|back| {
                    let day = (today - Duration::days(back)).format("%Y-%m-%d").to_string();
                    let count = record.completed_on(&day);
                    (day, count)
                })
                .collect();
            if json {
                let map: serde_json::Map<String, serde_json::Value> =
                    rows.into_iter().map(|(d, c)| (d, c.into())).collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (day, count) in rows {
                    println!("{day}  {count:>3}  {}", "#".repeat(count as usize));
                }
            }
        }
    }
    Ok(())
}
