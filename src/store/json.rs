//! Local JSON-file task store.
//!
//! Backs the CLI when no remote store is configured. Every operation loads
//! the row file, applies the change, and writes it back atomically via a
//! temp file + rename. Ids are kept as the client minted them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::task::Task;

use super::{StoreResult, TaskRow, TaskStore};

/// File-backed store holding one [`TaskRow`] list.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Vec<TaskRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|e| StoreError::Serialization {
            message: format!("failed to parse {}: {e}", self.path.display()),
        })
    }

    /// Atomic-ish write via temp + rename.
    fn save(&self, rows: &[TaskRow]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data =
            serde_json::to_string_pretty(rows).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TaskStore for JsonStore {
    fn list_active(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load()?
            .into_iter()
            .filter(|r| r.user_id == user_id && !r.task.archived)
            .map(|r| r.task)
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    fn list_archived(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load()?
            .into_iter()
            .filter(|r| r.user_id == user_id && r.task.archived)
            .map(|r| r.task)
            .collect();
        tasks.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        Ok(tasks)
    }

    fn insert(&self, user_id: &str, task: &Task) -> StoreResult<Task> {
        let mut rows = self.load()?;
        rows.push(TaskRow {
            user_id: user_id.to_string(),
            task: task.clone(),
        });
        self.save(&rows)?;
        Ok(task.clone())
    }

    fn update(&self, id: &str, task: &Task) -> StoreResult<Task> {
        let mut rows = self.load()?;
        let row = rows
            .iter_mut()
            .find(|r| r.task.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        row.task = task.clone();
        self.save(&rows)?;
        Ok(task.clone())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let mut rows = self.load()?;
        let before = rows.len();
        rows.retain(|r| r.task.id != id);
        if rows.len() != before {
            self.save(&rows)?;
        }
        Ok(())
    }
}
