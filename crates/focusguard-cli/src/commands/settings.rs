use clap::Subcommand;
use focusguard_core::PomodoroSettings;

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the effective durations
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set one field: workDuration, shortBreakDuration, longBreakDuration
    /// (minutes) or longBreakInterval (pomodoros)
    Set { field: String, value: u32 },
}

pub fn run(action: SettingsAction) -> CmdResult {
    let app = App::open()?;
    let store = app.store.as_ref();
    match action {
        SettingsAction::Show { json } => {
            let settings = PomodoroSettings::load(store)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("work:        {} min", settings.work_duration);
                println!("short break: {} min", settings.short_break_duration);
                println!("long break:  {} min", settings.long_break_duration);
                println!("long break every {} pomodoros", settings.long_break_interval);
            }
        }
        SettingsAction::Set { field, value } => {
            let mut settings = PomodoroSettings::load(store)?;
            settings.set_field(&field, value)?;
            settings.save(store)?;
            println!("{field} = {value}");
        }
    }
    Ok(())
}
