//! Remote row store speaking the PostgREST dialect.
//!
//! Rows live in a `tasks` table keyed by `user_id`; queries are expressed as
//! `column=eq.value` filters. Requests authenticate with the project's
//! anonymous key plus a per-session bearer token once the user signs in.

use std::time::Duration;

use crate::error::StoreError;
use crate::task::Task;

use super::{StoreResult, TaskRow, TaskStore};

/// Environment variable holding the store base URL.
pub const STORE_URL_ENV: &str = "SENET_STORE_URL";
/// Environment variable holding the anonymous key.
pub const STORE_KEY_ENV: &str = "SENET_STORE_ANON_KEY";

/// Configuration for the remote store.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Anonymous API key.
    pub anon_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl RestConfig {
    /// Resolve from the environment. Missing credentials are fatal for the
    /// remote-backed variant, so this returns an error rather than a default.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var(STORE_URL_ENV).ok().filter(|v| !v.is_empty());
        let anon_key = std::env::var(STORE_KEY_ENV).ok().filter(|v| !v.is_empty());
        match (base_url, anon_key) {
            (Some(base_url), Some(anon_key)) => Ok(Self {
                base_url,
                anon_key,
                timeout_secs: 30,
            }),
            _ => Err(StoreError::MissingCredentials),
        }
    }
}

/// HTTP client for the hosted row store.
#[derive(Debug, Clone)]
pub struct RestStore {
    config: RestConfig,
    /// Session bearer token; falls back to the anonymous key when absent.
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Self {
        Self {
            config,
            access_token: None,
        }
    }

    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(RestConfig::from_env()?))
    }

    /// Attach a signed-in session's access token to subsequent requests.
    pub fn with_session(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/tasks", self.config.base_url.trim_end_matches('/'))
    }

    fn bearer(&self) -> String {
        format!(
            "Bearer {}",
            self.access_token.as_deref().unwrap_or(&self.config.anon_key)
        )
    }

    fn list(&self, user_id: &str, archived: bool, order: &str) -> StoreResult<Vec<Task>> {
        let resp = self
            .agent()
            .get(&self.table_url())
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &self.bearer())
            .query("select", "*")
            .query("user_id", &format!("eq.{user_id}"))
            .query("archived", &format!("eq.{archived}"))
            .query("order", order)
            .call()
            .map_err(map_err)?;
        Ok(Self::rows(resp)?.into_iter().map(|r| r.task).collect())
    }

    fn rows(resp: ureq::Response) -> StoreResult<Vec<TaskRow>> {
        resp.into_json().map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }

    /// First row of a representation, or `None` when the response carried
    /// an empty row set (no row matched the request's filter).
    fn single_row(resp: ureq::Response) -> StoreResult<Option<Task>> {
        Ok(Self::rows(resp)?.into_iter().next().map(|r| r.task))
    }
}

impl TaskStore for RestStore {
    fn list_active(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        self.list(user_id, false, "created_at.desc")
    }

    fn list_archived(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        self.list(user_id, true, "archived_at.desc")
    }

    fn insert(&self, user_id: &str, task: &Task) -> StoreResult<Task> {
        let row = TaskRow {
            user_id: user_id.to_string(),
            task: task.clone(),
        };
        let resp = self
            .agent()
            .post(&self.table_url())
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &self.bearer())
            .set("Prefer", "return=representation")
            .send_json(serde_json::json!([row]))
            .map_err(map_err)?;
        Self::single_row(resp)?.ok_or_else(|| StoreError::Serialization {
            message: "store returned no representation for the inserted row".into(),
        })
    }

    fn update(&self, id: &str, task: &Task) -> StoreResult<Task> {
        let resp = self
            .agent()
            .request("PATCH", &self.table_url())
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &self.bearer())
            .set("Prefer", "return=representation")
            .query("id", &format!("eq.{id}"))
            .send_json(serde_json::to_value(task).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?)
            .map_err(map_err)?;
        // An empty representation means no row matched the id filter.
        Self::single_row(resp)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.agent()
            .delete(&self.table_url())
            .set("apikey", &self.config.anon_key)
            .set("Authorization", &self.bearer())
            .query("id", &format!("eq.{id}"))
            .call()
            .map_err(map_err)?;
        Ok(())
    }
}

fn map_err(e: ureq::Error) -> StoreError {
    match e {
        ureq::Error::Status(status, _) => StoreError::Http { status },
        ureq::Error::Transport(t) => StoreError::Transport {
            message: t.to_string(),
        },
    }
}
