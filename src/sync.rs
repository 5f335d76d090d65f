//! Optimistic-then-confirm mutation flow.
//!
//! [`SyncedBoard`] composes the in-memory [`Board`] with a [`TaskStore`]:
//! every mutation is applied locally first, then written through. When the
//! store rejects the write, the affected task is rolled back to its
//! pre-mutation snapshot before the error is returned — callers never
//! observe a half-applied optimistic update.
//!
//! A store-minted id on create is adopted by request correlation: the
//! provisional local id is never assumed to match what the store assigns.

use std::sync::Arc;

use crate::ai::PriorityRecommendation;
use crate::board::{Board, Mutation};
use crate::error::{SenetError, SenetResult};
use crate::store::TaskStore;
use crate::task::{Status, Task, TaskDraft, TaskPatch};

/// Board plus write-through persistence.
pub struct SyncedBoard {
    board: Board,
    store: Option<Arc<dyn TaskStore>>,
    user_id: String,
}

impl SyncedBoard {
    /// A board with no backing store; mutations are purely in-memory.
    pub fn detached() -> Self {
        Self {
            board: Board::new(),
            store: None,
            user_id: String::new(),
        }
    }

    /// Open a user's board, loading working and archived tasks from the store.
    pub fn open(store: Arc<dyn TaskStore>, user_id: impl Into<String>) -> SenetResult<Self> {
        let user_id = user_id.into();
        let mut tasks = store.list_active(&user_id).map_err(SenetError::from)?;
        tasks.extend(store.list_archived(&user_id).map_err(SenetError::from)?);
        tracing::debug!(user = %user_id, tasks = tasks.len(), "loaded board from store");
        Ok(Self {
            board: Board::from_tasks(tasks),
            store: Some(store),
            user_id,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Create a task: optimistic local append, then store insert. The
    /// store-confirmed record (possibly with a store-minted id) replaces the
    /// provisional one.
    pub fn create(&mut self, draft: TaskDraft) -> SenetResult<Task> {
        let mutation = self.board.create(draft)?;
        let local = mutation
            .task()
            .cloned()
            .expect("create outcome carries the new task");

        let Some(store) = self.store.clone() else {
            return Ok(local);
        };
        match store.insert(&self.user_id, &local) {
            Ok(stored) => {
                tracing::info!(id = %stored.id, title = %stored.title, "task created");
                self.board.confirm_create(&local.id, stored.clone())?;
                Ok(stored)
            }
            Err(e) => {
                tracing::warn!(id = %local.id, error = %e, "store rejected create, rolling back");
                self.board.rollback(mutation);
                Err(e.into())
            }
        }
    }

    /// Merge a patch into a task and write the result through.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> SenetResult<Task> {
        let mutation = self.board.update(id, patch)?;
        self.write_through(id, mutation)
    }

    /// Delete a task locally and from the store.
    pub fn delete(&mut self, id: &str) -> SenetResult<()> {
        let mutation = self.board.delete(id);
        if !mutation.changed() {
            return Ok(());
        }
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        if let Err(e) = store.delete(id) {
            tracing::warn!(id, error = %e, "store rejected delete, rolling back");
            self.board.rollback(mutation);
            return Err(e.into());
        }
        tracing::info!(id, "task deleted");
        Ok(())
    }

    /// Move a task to another column. Moving to the current column is a
    /// no-op and issues no store call.
    pub fn move_to(&mut self, id: &str, status: Status) -> SenetResult<Task> {
        let mutation = self.board.move_to(id, status)?;
        self.write_through(id, mutation)
    }

    pub fn archive(&mut self, id: &str) -> SenetResult<Task> {
        let mutation = self.board.archive(id)?;
        self.write_through(id, mutation)
    }

    pub fn unarchive(&mut self, id: &str) -> SenetResult<Task> {
        let mutation = self.board.unarchive(id)?;
        self.write_through(id, mutation)
    }

    /// Apply an AI priority recommendation. Recommendations referencing
    /// unknown ids are ignored without error and without state change.
    pub fn apply_recommendation(
        &mut self,
        rec: &PriorityRecommendation,
    ) -> SenetResult<Option<Task>> {
        let mutation = self.board.apply_priority(&rec.task_id, rec.recommended_priority);
        if !mutation.changed() {
            return Ok(None);
        }
        self.write_through(&rec.task_id, mutation).map(Some)
    }

    /// Write an applied update through to the store, rolling back on
    /// rejection. Unchanged mutations return the current task untouched.
    fn write_through(&mut self, id: &str, mutation: Mutation) -> SenetResult<Task> {
        if !mutation.changed() {
            let current = self
                .board
                .get(id)
                .cloned()
                .expect("unchanged mutation leaves the task in place");
            return Ok(current);
        }
        let task = mutation
            .task()
            .cloned()
            .expect("update outcome carries the new task");

        let Some(store) = self.store.clone() else {
            return Ok(task);
        };
        match store.update(&task.id, &task) {
            Ok(stored) => {
                tracing::info!(id = %stored.id, "task updated");
                self.board.absorb(&task.id, stored.clone())?;
                Ok(stored)
            }
            Err(e) => {
                tracing::warn!(id = %task.id, error = %e, "store rejected update, rolling back");
                self.board.rollback(mutation);
                Err(e.into())
            }
        }
    }
}
