//! Board state reconciler: the single owner of in-memory task state.
//!
//! All mutations pass through [`Board`], which applies them optimistically
//! and returns a [`Mutation`] outcome carrying the pre-mutation snapshot.
//! The sync layer uses that snapshot to roll the board back when the backing
//! store rejects a write, so optimistic updates are never left half-applied.
//!
//! Mutations on distinct task ids are independent: any interleaving of
//! create/update/delete/move across different ids yields the same final
//! state.

use chrono::Utc;

use crate::error::BoardError;
use crate::task::{
    Priority, Status, Task, TaskDraft, TaskPatch, generate_task_id, next_timestamp,
    normalize_tags,
};

/// Outcome of a board mutation.
///
/// Carries enough information to undo the mutation: the previous version of
/// the task for updates, the removed task and its position for deletes.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// A new task was appended to the board.
    Created { task: Task },
    /// An existing task was replaced in place.
    Updated { task: Task, previous: Task },
    /// A task was removed.
    Deleted { previous: Task, index: usize },
    /// Nothing changed (no-op move, idempotent delete, unknown recommendation).
    Unchanged,
}

impl Mutation {
    /// Whether the mutation actually changed board state.
    pub fn changed(&self) -> bool {
        !matches!(self, Mutation::Unchanged)
    }

    /// The task as it exists after the mutation, if it still exists.
    pub fn task(&self) -> Option<&Task> {
        match self {
            Mutation::Created { task } | Mutation::Updated { task, .. } => Some(task),
            Mutation::Deleted { .. } | Mutation::Unchanged => None,
        }
    }
}

/// The authoritative in-memory task collection.
#[derive(Debug, Clone, Default)]
pub struct Board {
    tasks: Vec<Task>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from tasks loaded out of a backing store.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Every task, archived or not, in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks in the four working columns (not archived).
    pub fn working(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.archived)
    }

    /// Archived tasks, retained for restore or permanent delete.
    pub fn archived(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.archived)
    }

    /// Working tasks in a given column.
    pub fn by_status(&self, status: Status) -> Vec<&Task> {
        self.working().filter(|t| t.status == status).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Create a task from a draft.
    ///
    /// Assigns a fresh id, stamps `created_at == updated_at`, defaults the
    /// status to backlog and the priority to medium. Fails with a validation
    /// error when the title is empty or blank.
    pub fn create(&mut self, draft: TaskDraft) -> Result<Mutation, BoardError> {
        if draft.title.trim().is_empty() {
            return Err(BoardError::Validation { field: "title" });
        }

        let now = Utc::now();
        let task = Task {
            id: generate_task_id(),
            title: draft.title.trim().to_string(),
            description: draft.description.filter(|d| !d.trim().is_empty()),
            priority: draft.priority.unwrap_or(Priority::Medium),
            status: draft.status.unwrap_or(Status::Backlog),
            tags: normalize_tags(draft.tags),
            ai_enhanced: false,
            ai_suggested_tags: Vec::new(),
            created_at: now,
            updated_at: now,
            archived: false,
            archived_at: None,
        };
        self.tasks.push(task.clone());
        Ok(Mutation::Created { task })
    }

    /// Merge a partial patch into an existing task and bump `updated_at`.
    ///
    /// Unspecified fields are left untouched. An empty patch is a no-op.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Mutation, BoardError> {
        if patch.is_empty() {
            return if self.get(id).is_some() {
                Ok(Mutation::Unchanged)
            } else {
                Err(BoardError::NotFound { id: id.to_string() })
            };
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BoardError::NotFound { id: id.to_string() })?;
        let previous = task.clone();

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(BoardError::Validation { field: "title" });
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(tags) = patch.tags {
            task.tags = normalize_tags(tags);
        }
        if let Some(ai_enhanced) = patch.ai_enhanced {
            task.ai_enhanced = ai_enhanced;
        }
        if let Some(ai_suggested_tags) = patch.ai_suggested_tags {
            task.ai_suggested_tags = normalize_tags(ai_suggested_tags);
        }
        task.updated_at = next_timestamp(previous.updated_at);

        Ok(Mutation::Updated {
            task: task.clone(),
            previous,
        })
    }

    /// Remove a task by id. Idempotent: deleting an unknown id is not an
    /// error at this layer.
    pub fn delete(&mut self, id: &str) -> Mutation {
        match self.tasks.iter().position(|t| t.id == id) {
            Some(index) => {
                let previous = self.tasks.remove(index);
                Mutation::Deleted { previous, index }
            }
            None => Mutation::Unchanged,
        }
    }

    /// Move a task to another column.
    ///
    /// Moving to the current column is skipped entirely: no `updated_at`
    /// churn and no store call.
    pub fn move_to(&mut self, id: &str, status: Status) -> Result<Mutation, BoardError> {
        let current = self
            .get(id)
            .ok_or_else(|| BoardError::NotFound { id: id.to_string() })?;
        if current.status == status {
            return Ok(Mutation::Unchanged);
        }
        self.update(
            id,
            TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Soft-delete: mark archived and stamp `archived_at`. Status is
    /// retained so unarchiving restores the task to its old column.
    pub fn archive(&mut self, id: &str) -> Result<Mutation, BoardError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BoardError::NotFound { id: id.to_string() })?;
        if task.archived {
            return Ok(Mutation::Unchanged);
        }
        let previous = task.clone();
        task.archived = true;
        task.archived_at = Some(Utc::now());
        Ok(Mutation::Updated {
            task: task.clone(),
            previous,
        })
    }

    /// Restore an archived task to the working set.
    pub fn unarchive(&mut self, id: &str) -> Result<Mutation, BoardError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BoardError::NotFound { id: id.to_string() })?;
        if !task.archived {
            return Ok(Mutation::Unchanged);
        }
        let previous = task.clone();
        task.archived = false;
        task.archived_at = None;
        Ok(Mutation::Updated {
            task: task.clone(),
            previous,
        })
    }

    /// Apply an AI priority recommendation.
    ///
    /// Recommendations referencing ids not on the board are ignored without
    /// error and without state change.
    pub fn apply_priority(&mut self, id: &str, priority: Priority) -> Mutation {
        if self.get(id).is_none() {
            return Mutation::Unchanged;
        }
        self.update(
            id,
            TaskPatch {
                priority: Some(priority),
                ..Default::default()
            },
        )
        .unwrap_or(Mutation::Unchanged)
    }

    /// Undo a mutation, restoring the pre-mutation snapshot it carries.
    pub fn rollback(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Created { task } => {
                self.tasks.retain(|t| t.id != task.id);
            }
            Mutation::Updated { previous, .. } => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == previous.id) {
                    *slot = previous;
                }
            }
            Mutation::Deleted { previous, index } => {
                let index = index.min(self.tasks.len());
                self.tasks.insert(index, previous);
            }
            Mutation::Unchanged => {}
        }
    }

    /// Overwrite a task's slot with the record the store confirmed.
    ///
    /// Correlation is by the id the board currently holds, not id equality:
    /// the store may mint its own id or rewrite fields on the way through.
    pub fn absorb(&mut self, id: &str, stored: Task) -> Result<(), BoardError> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BoardError::NotFound { id: id.to_string() })?;
        *slot = stored;
        Ok(())
    }

    /// Replace a provisionally-created task with the store-confirmed record.
    pub fn confirm_create(&mut self, local_id: &str, stored: Task) -> Result<(), BoardError> {
        self.absorb(local_id, stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft::new(title)
    }

    fn created_task(board: &mut Board, title: &str) -> Task {
        match board.create(draft(title)).unwrap() {
            Mutation::Created { task } => task,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn create_defaults() {
        let mut board = Board::new();
        let task = match board
            .create(TaskDraft {
                title: "Fix login bug".into(),
                priority: Some(Priority::Medium),
                tags: vec!["bug".into()],
                ..Default::default()
            })
            .unwrap()
        {
            Mutation::Created { task } => task,
            other => panic!("expected Created, got {other:?}"),
        };

        assert_eq!(task.status, Status::Backlog);
        assert!(!task.ai_enhanced);
        assert!(task.ai_suggested_tags.is_empty());
        assert!(!task.id.is_empty());
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.tags, vec!["bug".to_string()]);
    }

    #[test]
    fn create_rejects_blank_title() {
        let mut board = Board::new();
        let err = board.create(draft("   ")).unwrap_err();
        assert!(matches!(err, BoardError::Validation { field: "title" }));
        assert!(board.is_empty());
    }

    #[test]
    fn update_merges_and_bumps_timestamp() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Write docs");
        let before = task.updated_at;

        board
            .update(
                &task.id,
                TaskPatch {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .unwrap();

        let after = board.get(&task.id).unwrap();
        assert_eq!(after.priority, Priority::High);
        assert_eq!(after.title, "Write docs");
        assert_eq!(after.description, task.description);
        assert_eq!(after.status, task.status);
        assert!(after.updated_at > before);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut board = Board::new();
        let err = board
            .update(
                "task_0_missing",
                TaskPatch {
                    priority: Some(Priority::Low),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Throwaway");
        assert!(board.delete(&task.id).changed());
        assert!(!board.delete(&task.id).changed());
        assert!(board.is_empty());
    }

    #[test]
    fn move_to_same_status_is_noop() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Stay put");
        let snapshot = board.get(&task.id).unwrap().clone();

        let outcome = board.move_to(&task.id, Status::Backlog).unwrap();
        assert!(!outcome.changed());
        assert_eq!(board.get(&task.id).unwrap(), &snapshot);
    }

    #[test]
    fn move_changes_column() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Ship it");
        board.move_to(&task.id, Status::InProgress).unwrap();
        assert_eq!(board.get(&task.id).unwrap().status, Status::InProgress);
    }

    #[test]
    fn archive_then_unarchive_round_trips() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Old work");
        board.move_to(&task.id, Status::Done).unwrap();

        board.archive(&task.id).unwrap();
        let archived = board.get(&task.id).unwrap();
        assert!(archived.archived);
        assert!(archived.archived_at.is_some());
        assert_eq!(board.by_status(Status::Done).len(), 0);

        board.unarchive(&task.id).unwrap();
        let restored = board.get(&task.id).unwrap();
        assert!(!restored.archived);
        assert!(restored.archived_at.is_none());
        assert_eq!(restored.status, Status::Done);
        assert_eq!(board.by_status(Status::Done).len(), 1);
    }

    #[test]
    fn apply_priority_to_unknown_id_is_silent() {
        let mut board = Board::new();
        let task = created_task(&mut board, "Real task");
        let snapshot = board.tasks().to_vec();

        let outcome = board.apply_priority("task_0_ghost", Priority::High);
        assert!(!outcome.changed());
        assert_eq!(board.tasks(), snapshot.as_slice());
        assert_eq!(board.get(&task.id).unwrap().priority, Priority::Medium);
    }

    #[test]
    fn rollback_restores_every_mutation_kind() {
        let mut board = Board::new();
        let keeper = created_task(&mut board, "Keeper");

        // Created → removed again.
        let outcome = board.create(draft("Ephemeral")).unwrap();
        board.rollback(outcome);
        assert_eq!(board.len(), 1);

        // Updated → previous snapshot restored.
        let outcome = board
            .update(
                &keeper.id,
                TaskPatch {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        board.rollback(outcome);
        assert_eq!(board.get(&keeper.id).unwrap(), &keeper);

        // Deleted → reinserted at its old position.
        let outcome = board.delete(&keeper.id);
        board.rollback(outcome);
        assert_eq!(board.get(&keeper.id).unwrap(), &keeper);
    }

    #[test]
    fn confirm_create_adopts_store_id() {
        let mut board = Board::new();
        let local = created_task(&mut board, "Persist me");

        let mut stored = local.clone();
        stored.id = "42".into();
        board.confirm_create(&local.id, stored).unwrap();

        assert!(board.get(&local.id).is_none());
        assert_eq!(board.get("42").unwrap().title, "Persist me");
    }

    #[test]
    fn mutations_on_distinct_ids_commute() {
        let mut left = Board::new();
        let a = created_task(&mut left, "A");
        let b = created_task(&mut left, "B");
        let mut right = left.clone();

        // Same operations, opposite interleaving.
        left.move_to(&a.id, Status::Todo).unwrap();
        left.update(
            &b.id,
            TaskPatch {
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .unwrap();

        right
            .update(
                &b.id,
                TaskPatch {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .unwrap();
        right.move_to(&a.id, Status::Todo).unwrap();

        assert_eq!(left.get(&a.id).unwrap().status, Status::Todo);
        assert_eq!(
            left.get(&a.id).unwrap().status,
            right.get(&a.id).unwrap().status
        );
        assert_eq!(
            left.get(&b.id).unwrap().priority,
            right.get(&b.id).unwrap().priority
        );
    }
}
