//! End-to-end tests for the synced board over the JSON file store.
//!
//! These tests verify that tasks survive a close + reopen cycle, that
//! archive state round-trips, and that a rejected store write leaves the
//! in-memory board exactly as it was.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use senet::error::StoreError;
use senet::store::json::JsonStore;
use senet::store::{StoreResult, TaskStore};
use senet::sync::SyncedBoard;
use senet::task::{Priority, Status, Task, TaskDraft, TaskPatch};

fn open_board(path: &std::path::Path) -> SyncedBoard {
    SyncedBoard::open(Arc::new(JsonStore::new(path)), "tester").unwrap()
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft::new(title)
}

#[test]
fn tasks_survive_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("board.json");

    // First session: create tasks and move one.
    let (id_a, id_b) = {
        let mut board = open_board(&path);
        let a = board.create(draft("Write release notes")).unwrap();
        let b = board
            .create(TaskDraft {
                title: "Fix login redirect".into(),
                description: Some("302 loops on expired session".into()),
                priority: Some(Priority::High),
                status: Some(Status::Todo),
                tags: vec!["bug".into(), "auth".into()],
            })
            .unwrap();
        board.move_to(&a.id, Status::InProgress).unwrap();
        (a.id, b.id)
    };

    // Second session: everything is back, including the move.
    let board = open_board(&path);
    assert_eq!(board.board().len(), 2);

    let a = board.board().get(&id_a).unwrap();
    assert_eq!(a.status, Status::InProgress);
    assert!(a.updated_at > a.created_at);

    let b = board.board().get(&id_b).unwrap();
    assert_eq!(b.priority, Priority::High);
    assert_eq!(b.tags, vec!["bug".to_string(), "auth".to_string()]);
    assert_eq!(b.description.as_deref(), Some("302 loops on expired session"));
}

#[test]
fn archive_state_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("board.json");

    let id = {
        let mut board = open_board(&path);
        let task = board.create(draft("Old experiment")).unwrap();
        board.move_to(&task.id, Status::Done).unwrap();
        board.archive(&task.id).unwrap();
        task.id
    };

    {
        let board = open_board(&path);
        let task = board.board().get(&id).unwrap();
        assert!(task.archived);
        assert!(task.archived_at.is_some());
        // Archived tasks stay out of the working columns.
        assert!(board.board().working().all(|t| t.id != id));
        assert_eq!(board.board().archived().count(), 1);
    }

    // Unarchive restores the old column.
    let mut board = open_board(&path);
    let restored = board.unarchive(&id).unwrap();
    assert_eq!(restored.status, Status::Done);
    assert!(!restored.archived);
    assert!(restored.archived_at.is_none());
}

#[test]
fn edits_and_deletes_persist() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("board.json");

    let (keep, drop) = {
        let mut board = open_board(&path);
        let keep = board.create(draft("Keep me")).unwrap();
        let drop = board.create(draft("Drop me")).unwrap();
        board
            .update(
                &keep.id,
                TaskPatch {
                    description: Some("now with details".into()),
                    priority: Some(Priority::Low),
                    ..Default::default()
                },
            )
            .unwrap();
        board.delete(&drop.id).unwrap();
        (keep.id, drop.id)
    };

    let board = open_board(&path);
    assert_eq!(board.board().len(), 1);
    assert!(board.board().get(&drop).is_none());
    let task = board.board().get(&keep).unwrap();
    assert_eq!(task.description.as_deref(), Some("now with details"));
    assert_eq!(task.priority, Priority::Low);
}

#[test]
fn boards_are_isolated_per_user() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("board.json");
    let store = Arc::new(JsonStore::new(&path));

    let mut mine = SyncedBoard::open(store.clone(), "alice").unwrap();
    mine.create(draft("Alice's task")).unwrap();

    let theirs = SyncedBoard::open(store, "bob").unwrap();
    assert!(theirs.board().is_empty());
}

/// Store whose reads return a fixed seed and whose writes are always
/// rejected, counting the write attempts it saw.
struct RejectingStore {
    seed: Vec<Task>,
    writes: AtomicUsize,
}

impl RejectingStore {
    fn new() -> Self {
        Self::seeded(Vec::new())
    }

    fn seeded(seed: Vec<Task>) -> Self {
        Self {
            seed,
            writes: AtomicUsize::new(0),
        }
    }

    fn reject<T>(&self) -> StoreResult<T> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Http { status: 503 })
    }
}

impl TaskStore for RejectingStore {
    fn list_active(&self, _user_id: &str) -> StoreResult<Vec<Task>> {
        Ok(self.seed.clone())
    }

    fn list_archived(&self, _user_id: &str) -> StoreResult<Vec<Task>> {
        Ok(Vec::new())
    }

    fn insert(&self, _user_id: &str, _task: &Task) -> StoreResult<Task> {
        self.reject()
    }

    fn update(&self, _id: &str, _task: &Task) -> StoreResult<Task> {
        self.reject()
    }

    fn delete(&self, _id: &str) -> StoreResult<()> {
        self.reject()
    }
}

#[test]
fn rejected_create_leaves_board_empty() {
    let store = Arc::new(RejectingStore::new());
    let mut board = SyncedBoard::open(store.clone(), "tester").unwrap();

    let err = board.create(draft("Never lands")).unwrap_err();
    assert!(err.to_string().contains("503"));
    assert!(board.board().is_empty());
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[test]
fn no_op_moves_skip_the_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("board.json");

    let id = {
        let mut board = open_board(&path);
        board.create(draft("Stays put")).unwrap().id
    };

    // Reopen against a store that rejects every write. Moving a task to
    // the column it already occupies must not issue a write at all.
    let seed = JsonStore::new(&path).list_active("tester").unwrap();
    let store = Arc::new(RejectingStore::seeded(seed));
    let mut board = SyncedBoard::open(store.clone(), "tester").unwrap();

    let before = board.board().get(&id).unwrap().clone();
    let after = board.move_to(&id, before.status).unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);

    // A real move is still attempted, rejected, and rolled back.
    let err = board.move_to(&id, Status::Done).unwrap_err();
    assert!(err.to_string().contains("503"));
    assert_eq!(board.board().get(&id).unwrap().status, before.status);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}
