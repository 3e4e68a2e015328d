use clap::Subcommand;
use focusguard_core::{AddOutcome, SiteList};

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum SitesAction {
    /// Sites blocked during work sessions
    Block {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Sites that stay reachable even under a blocked domain
    Allow {
        #[command(subcommand)]
        action: ListAction,
    },
}

#[derive(Subcommand)]
pub enum ListAction {
    /// Add a site (URL or hostname)
    Add { site: String },
    /// Remove a site
    Rm { site: String },
    /// List sites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SitesAction) -> CmdResult {
    let (list, action) = match action {
        SitesAction::Block { action } => (SiteList::Blocked, action),
        SitesAction::Allow { action } => (SiteList::Whitelisted, action),
    };
    let app = App::open()?;
    let store = app.store.as_ref();

    match action {
        ListAction::Add { site } => {
            match list.add(store, &site)? {
                AddOutcome::Added(host) => println!("added {host}"),
                AddOutcome::AlreadyPresent(host) => println!("{host} is already listed"),
            }
            app.engine.refresh_rules();
        }
        ListAction::Rm { site } => {
            if list.remove(store, &site)? {
                println!("removed {}", site.trim());
                app.engine.refresh_rules();
            } else {
                return Err(format!("{} is not listed", site.trim()).into());
            }
        }
        ListAction::List { json } => {
            let sites = list.list(store)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else if sites.is_empty() {
                println!("(none)");
            } else {
                for site in sites {
                    println!("{site}");
                }
            }
        }
    }
    Ok(())
}
