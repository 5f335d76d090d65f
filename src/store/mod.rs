//! Persistence collaborators for the board.
//!
//! Two backends implement the same [`TaskStore`] seam:
//!
//! - [`json::JsonStore`] — a local JSON file with atomic writes, used by the CLI
//! - [`rest::RestStore`] — a hosted row store spoken to over HTTP
//!
//! Change notification is uniform across backends: [`Subscription::watch`]
//! polls a store on its own thread and emits [`StoreEvent`]s until dropped.

pub mod auth;
pub mod json;
pub mod rest;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::task::Task;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Wire record: a task row plus its owning user. Row columns use
/// underscore_case (`ai_enhanced`, `ai_suggested_tags`, `archived_at`, …),
/// which the flattened [`Task`] fields already are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub user_id: String,
    #[serde(flatten)]
    pub task: Task,
}

/// A change observed on the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Inserted(Task),
    Updated(Task),
    Deleted(String),
}

/// Per-user task persistence.
///
/// Implementations may mint their own row ids on insert; callers reconcile
/// by request correlation, not id equality.
pub trait TaskStore: Send + Sync {
    /// Tasks in the working columns, newest first.
    fn list_active(&self, user_id: &str) -> StoreResult<Vec<Task>>;

    /// Archived tasks, most recently archived first.
    fn list_archived(&self, user_id: &str) -> StoreResult<Vec<Task>>;

    /// Insert a task and return the stored record (possibly with a
    /// store-minted id).
    fn insert(&self, user_id: &str, task: &Task) -> StoreResult<Task>;

    /// Replace the row with the given id.
    fn update(&self, id: &str, task: &Task) -> StoreResult<Task>;

    /// Delete the row with the given id.
    fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Handle to a polling change subscription.
///
/// The polling thread stops when the handle is dropped.
pub struct Subscription {
    events: mpsc::Receiver<StoreEvent>,
    stop: Arc<AtomicBool>,
}

impl Subscription {
    /// Watch a store for changes to one user's tasks.
    pub fn watch(
        store: Arc<dyn TaskStore>,
        user_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let user_id = user_id.into();
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let stop_flag = Arc::clone(&stop);
        std::thread::spawn(move || {
            // The baseline must come from a successful snapshot: seeding it
            // empty would replay every pre-existing row as an insert.
            let mut known: Vec<Task> = loop {
                if stop_flag.load(Ordering::Acquire) {
                    return;
                }
                match snapshot(store.as_ref(), &user_id) {
                    Ok(tasks) => break tasks,
                    Err(e) => {
                        tracing::warn!(error = %e, "baseline snapshot failed, retrying");
                        std::thread::sleep(interval);
                    }
                }
            };
            while !stop_flag.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                if stop_flag.load(Ordering::Acquire) {
                    break;
                }
                let current = match snapshot(store.as_ref(), &user_id) {
                    Ok(tasks) => tasks,
                    Err(e) => {
                        tracing::warn!(error = %e, "store poll failed, will retry");
                        continue;
                    }
                };
                for event in diff(&known, &current) {
                    if tx.send(event).is_err() {
                        return; // receiver gone
                    }
                }
                known = current;
            }
        });

        Self { events: rx, stop }
    }

    /// Next pending event, if any.
    pub fn try_next(&self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }

    /// Block up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<StoreEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn snapshot(store: &dyn TaskStore, user_id: &str) -> StoreResult<Vec<Task>> {
    let mut tasks = store.list_active(user_id)?;
    tasks.extend(store.list_archived(user_id)?);
    Ok(tasks)
}

fn diff(known: &[Task], current: &[Task]) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    for task in current {
        match known.iter().find(|k| k.id == task.id) {
            None => events.push(StoreEvent::Inserted(task.clone())),
            Some(old) if old != task => events.push(StoreEvent::Updated(task.clone())),
            Some(_) => {}
        }
    }
    for old in known {
        if !current.iter().any(|t| t.id == old.id) {
            events.push(StoreEvent::Deleted(old.id.clone()));
        }
    }
    events
}
