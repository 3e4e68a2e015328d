//! To-do list kept next to the timer.
//!
//! Every operation is a single read-modify-write of the `tasks` key, so a
//! fresh read always reflects exactly the last committed list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, StoreError, ValidationError};
use crate::store::{keys, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

fn decode(value: Option<&Value>) -> Vec<Task> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring malformed task list");
            Vec::new()
        }),
    }
}

fn clean_text(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        Err(ValidationError::EmptyTaskText)
    } else {
        Ok(text.to_string())
    }
}

fn position(tasks: &[Task], id: u64) -> Result<usize, ValidationError> {
    tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or(ValidationError::UnknownTask(id))
}

pub struct TaskList<'a> {
    store: &'a dyn Store,
}

impl<'a> TaskList<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Task>> {
        Ok(decode(self.store.get(keys::TASKS)?.as_ref()))
    }

    /// Append a task. Text is trimmed and must not be empty.
    pub fn add(&self, text: &str) -> Result<Task> {
        let text = clean_text(text)?;
        let id = self.next_id()?;
        let task = Task {
            id,
            text,
            completed: false,
        };
        let added = task.clone();
        self.modify(move |tasks| {
            tasks.push(task.clone());
            Ok(())
        })?;
        debug!(id, "task added");
        Ok(added)
    }

    /// Flip `completed`. Returns the new value.
    pub fn toggle(&self, id: u64) -> Result<bool> {
        self.modify(|tasks| {
            let i = position(tasks, id)?;
            tasks[i].completed = !tasks[i].completed;
            Ok(tasks[i].completed)
        })
    }

    /// Replace the text. Empty text is rejected and nothing changes.
    pub fn edit(&self, id: u64, text: &str) -> Result<()> {
        let text = clean_text(text)?;
        self.modify(|tasks| {
            let i = position(tasks, id)?;
            tasks[i].text = text.clone();
            Ok(())
        })
    }

    /// Remove a task. Returns whether it existed.
    pub fn delete(&self, id: u64) -> Result<bool> {
        self.modify(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            Ok(tasks.len() != before)
        })
    }

    /// Put the listed tasks first, in the given order.
    ///
    /// Unknown ids are ignored. Tasks not listed follow in their current
    /// relative order.
    pub fn reorder(&self, ids: &[u64]) -> Result<()> {
        self.modify(|tasks| {
            let mut rest = std::mem::take(tasks);
            for id in ids {
                if let Some(i) = rest.iter().position(|t| t.id == *id) {
                    tasks.push(rest.remove(i));
                }
            }
            tasks.append(&mut rest);
            Ok(())
        })
    }

    /// Move one task to `index`, clamped to the end of the list.
    pub fn move_to(&self, id: u64, index: usize) -> Result<()> {
        self.modify(|tasks| {
            let from = position(tasks, id)?;
            let task = tasks.remove(from);
            let to = index.min(tasks.len());
            tasks.insert(to, task);
            Ok(())
        })
    }

    /// Issue the next id from the persisted counter. Never reused, even
    /// after deletes.
    fn next_id(&self) -> Result<u64, StoreError> {
        let issued = self.store.update(keys::TASK_ID_SEQ, &mut |current| {
            let last = current.as_ref().and_then(Value::as_u64).unwrap_or(0);
            Some(Value::from(last + 1))
        })?;
        Ok(issued.as_ref().and_then(Value::as_u64).unwrap_or(1))
    }

    fn modify<R>(
        &self,
        mut f: impl FnMut(&mut Vec<Task>) -> Result<R, ValidationError>,
    ) -> Result<R> {
        let mut outcome = None;
        self.store.update(keys::TASKS, &mut |current| {
            let mut tasks = decode(current.as_ref());
            match f(&mut tasks) {
                Ok(r) => {
                    outcome = Some(Ok(r));
                    serde_json::to_value(&tasks).ok()
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    current
                }
            }
        })?;
        let outcome = outcome.ok_or_else(|| StoreError::QueryFailed("task update did not run".into()))?;
        Ok(outcome?)
    }
}
