//! Task management commands for CLI.

use clap::Subcommand;
use focusguard_core::TaskList;

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Task text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List tasks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a task's completed flag
    Done {
        /// Task ID
        id: u64,
    },
    /// Replace a task's text
    Edit {
        /// Task ID
        id: u64,
        /// New text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Delete a task
    Rm {
        /// Task ID
        id: u64,
    },
    /// Move a task to a position (0 = top)
    Move {
        /// Task ID
        id: u64,
        /// Target position
        index: usize,
    },
}

pub fn run(action: TaskAction) -> CmdResult {
    let app = App::open()?;
    let tasks = TaskList::new(app.store.as_ref());

    match action {
        TaskAction::Add { text } => {
            let task = tasks.add(&text.join(" "))?;
            println!("Task created: {} {}", task.id, task.text);
        }
        TaskAction::List { json } => {
            let list = tasks.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.is_empty() {
                println!("No tasks yet. Add one!");
            } else {
                for task in list {
                    let mark = if task.completed { "x" } else { " " };
                    println!("[{mark}] {:>4}  {}", task.id, task.text);
                }
            }
        }
        TaskAction::Done { id } => {
            let completed = tasks.toggle(id)?;
            println!("Task {id} {}", if completed { "completed" } else { "reopened" });
        }
        TaskAction::Edit { id, text } => {
            tasks.edit(id, &text.join(" "))?;
            println!("Task {id} updated");
        }
        TaskAction::Rm { id } => {
            if !tasks.delete(id)? {
                return Err(format!("Task {id} not found").into());
            }
            println!("Task {id} deleted");
        }
        TaskAction::Move { id, index } => {
            tasks.move_to(id, index)?;
            println!("Task {id} moved to {index}");
        }
    }
    Ok(())
}
