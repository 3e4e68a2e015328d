use clap::Subcommand;

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum RulesAction {
    /// Print the rules the current state compiles to
    Show,
    /// Print the rules currently installed in the rule file
    Installed,
    /// Recompile and install
    Refresh,
}

pub fn run(action: RulesAction) -> CmdResult {
    let app = App::open()?;
    match action {
        RulesAction::Show => {
            let set = app.engine.compile_current()?;
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
        RulesAction::Installed => {
            let rules = app.sink.load()?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        RulesAction::Refresh => {
            let set = app.engine.try_refresh_rules()?;
            println!(
                "{} rule(s) installed in {}",
                set.len(),
                app.sink.path().display()
            );
        }
    }
    Ok(())
}
