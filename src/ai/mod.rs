//! AI-assisted task enrichment.
//!
//! Each operation is a prompt template sent to the chat-completion endpoint
//! ([`client`]), normalized into a typed record ([`normalize`]), then
//! shape-coerced so downstream code never observes a missing required field.
//! The artifacts produced here are ephemeral: recomputed on demand, never
//! persisted independently of the task fields they may be merged into.

pub mod client;
pub mod insight;
pub mod normalize;

use serde::Deserialize;

use crate::error::AiError;
use crate::task::{Priority, Status, Task, TaskDraft, normalize_tags};

pub use client::{ChatMessage, CompletionClient, CompletionConfig};
pub use insight::{InsightBundle, ViewToken, fetch_insights};

// ── Result shapes ────────────────────────────────────────────────────────

/// AI-proposed improvements to a task. Every field is optional: absence
/// means the model did not offer it, not an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enhancement {
    pub suggestions: Vec<String>,
    pub improved_description: Option<String>,
    pub recommended_tags: Vec<String>,
    pub recommended_priority: Option<Priority>,
    pub estimated_time: Option<String>,
    pub subtasks: Vec<String>,
}

/// A task extracted from natural-language input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl From<ParsedTask> for TaskDraft {
    fn from(parsed: ParsedTask) -> Self {
        TaskDraft {
            title: parsed.title,
            description: parsed.description,
            priority: parsed.priority,
            status: parsed.status,
            tags: normalize_tags(parsed.tags),
        }
    }
}

/// A structured subtask proposed by task decomposition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Severity of a productivity insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Classification of a productivity insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Bottleneck,
    Pattern,
    Recommendation,
}

/// A single observation about the board.
#[derive(Debug, Clone, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

/// Aggregate board statistics attached to a productivity report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivitySummary {
    pub total_tasks: usize,
    pub completion_rate: String,
    #[serde(default)]
    pub average_time_in_progress: Option<String>,
    #[serde(default)]
    pub most_common_tags: Vec<String>,
}

/// Productivity analysis: insights plus a summary. The summary is always
/// present — synthesized locally when the model omits it.
#[derive(Debug, Clone)]
pub struct ProductivityReport {
    pub insights: Vec<Insight>,
    pub summary: ProductivitySummary,
}

/// A priority change recommendation for one task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityRecommendation {
    pub task_id: String,
    pub current_priority: Priority,
    pub recommended_priority: Priority,
    pub reason: String,
}

/// A category grouping archived tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

// Wire shapes with every field defaulted, coerced after parsing.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProductivity {
    insights: Vec<Insight>,
    summary: Option<ProductivitySummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPriorityAdvice {
    recommendations: Vec<PriorityRecommendation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategories {
    categories: Vec<ArchiveCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTags {
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSubtasks {
    subtasks: Vec<SubtaskDraft>,
}

// ── Service ──────────────────────────────────────────────────────────────

/// The AI assistant: prompt templates over a completion client.
#[derive(Debug, Clone)]
pub struct Assistant {
    client: CompletionClient,
}

impl Assistant {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Assistant configured from the environment. Calls fail with a
    /// configuration error when no API key is present.
    pub fn from_env() -> Self {
        Self::new(CompletionClient::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Analyze a task and propose improvements.
    pub fn enhance_task(&self, task: &Task) -> Result<Enhancement, AiError> {
        let tags = if task.tags.is_empty() {
            "No tags".to_string()
        } else {
            task.tags.join(", ")
        };
        let messages = [
            ChatMessage::system(
                "You are an AI assistant that helps improve task management. \
                 Analyze the given task and provide suggestions for improvement, \
                 better descriptions, appropriate tags, and priority recommendations. \
                 Respond ONLY with valid JSON, no markdown formatting. Use this exact structure:\n\
                 {\"suggestions\": [\"suggestion1\"], \"improvedDescription\": \"enhanced description\", \
                 \"recommendedTags\": [\"tag1\"], \"recommendedPriority\": \"low|medium|high\", \
                 \"estimatedTime\": \"time estimate\", \"subtasks\": [\"subtask1\"]}",
            ),
            ChatMessage::user(format!(
                "Analyze this task:\nTitle: {}\nDescription: {}\nCurrent Priority: {}\nCurrent Tags: {}",
                task.title,
                task.description.as_deref().unwrap_or("No description provided"),
                task.priority,
                tags,
            )),
        ];
        normalize::normalize(&self.client.chat(&messages)?)
    }

    /// Break a task down into smaller, actionable subtasks.
    pub fn generate_subtasks(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Vec<SubtaskDraft>, AiError> {
        let messages = [
            ChatMessage::system(
                "You are a project management AI. Break down the given task into \
                 smaller, actionable subtasks. Respond ONLY with valid JSON, no \
                 markdown formatting. Use this exact structure:\n\
                 {\"subtasks\": [{\"title\": \"subtask title\", \"description\": \"subtask description\", \
                 \"priority\": \"low|medium|high\", \"tags\": [\"tag1\"]}]}",
            ),
            ChatMessage::user(format!(
                "Break down this task into smaller subtasks:\nTitle: {title}\nDescription: {}",
                description.unwrap_or(""),
            )),
        ];
        let raw: RawSubtasks = normalize::normalize(&self.client.chat(&messages)?)?;
        Ok(raw.subtasks)
    }

    /// Parse free-text input into a structured task.
    pub fn parse_natural_language(&self, input: &str) -> Result<ParsedTask, AiError> {
        let messages = [
            ChatMessage::system(
                "You are a natural language parser for task creation. Parse the \
                 user's input and extract task information. Respond ONLY with valid \
                 JSON, no markdown formatting. Use this exact structure:\n\
                 {\"title\": \"extracted title\", \"description\": \"extracted description\", \
                 \"priority\": \"low|medium|high\", \"tags\": [\"tag1\"], \
                 \"status\": \"backlog|todo|inprogress|done\"}",
            ),
            ChatMessage::user(format!(
                "Parse this natural language input into a structured task: \"{input}\""
            )),
        ];
        normalize::normalize(&self.client.chat(&messages)?)
    }

    /// Suggest relevant tags for a task.
    pub fn suggest_tags(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Vec<String>, AiError> {
        let messages = [
            ChatMessage::system(
                "You are a task categorization AI. Suggest relevant tags for the \
                 given task. Respond ONLY with valid JSON, no markdown formatting. \
                 Use this exact structure:\n{\"tags\": [\"tag1\", \"tag2\", \"tag3\"]}",
            ),
            ChatMessage::user(format!(
                "Suggest tags for this task:\nTitle: {title}\nDescription: {}",
                description.unwrap_or(""),
            )),
        ];
        let raw: RawTags = normalize::normalize(&self.client.chat(&messages)?)?;
        Ok(normalize_tags(raw.tags))
    }

    /// Analyze the board and report productivity insights.
    pub fn analyze_productivity(&self, tasks: &[Task]) -> Result<ProductivityReport, AiError> {
        let summary: Vec<serde_json::Value> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "title": t.title,
                    "status": t.status,
                    "priority": t.priority,
                    "createdAt": t.created_at,
                    "tags": t.tags,
                })
            })
            .collect();
        let messages = [
            ChatMessage::system(
                "You are a productivity analyst. Respond with ONLY valid JSON. \
                 No markdown, no code blocks. Keep all text in single lines without \
                 line breaks. Use simple short descriptions under 100 characters. \
                 Required structure: {\"insights\":[{\"type\":\"bottleneck\",\
                 \"title\":\"Short title\",\"description\":\"Brief description\",\
                 \"severity\":\"high\"}],\"summary\":{\"totalTasks\":5,\
                 \"completionRate\":\"60%\",\"averageTimeInProgress\":\"2 days\",\
                 \"mostCommonTags\":[\"tag1\"]}}",
            ),
            ChatMessage::user(format!(
                "Analyze {} tasks. Provide 2-3 insights max. Keep descriptions under \
                 100 chars. Tasks: {}",
                tasks.len(),
                clip(&serde_json::Value::Array(summary).to_string(), 1000),
            )),
        ];
        coerce_productivity(&self.client.chat(&messages)?, tasks)
    }

    /// Recommend priority changes for the given tasks.
    ///
    /// Recommendations referencing ids not in `tasks` are dropped silently.
    pub fn smart_prioritization(
        &self,
        tasks: &[Task],
    ) -> Result<Vec<PriorityRecommendation>, AiError> {
        let compact: Vec<serde_json::Value> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "priority": t.priority,
                    "status": t.status,
                })
            })
            .collect();
        let messages = [
            ChatMessage::system(
                "You are a task prioritization AI. Respond with ONLY valid JSON. \
                 No markdown, no code blocks. Keep reasons under 80 characters. \
                 Required structure: {\"recommendations\":[{\"taskId\":\"task_123\",\
                 \"currentPriority\":\"low\",\"recommendedPriority\":\"high\",\
                 \"reason\":\"Short reason\"}]}",
            ),
            ChatMessage::user(format!(
                "Suggest priority changes for {} tasks. Max 3 recommendations. \
                 Keep reasons under 80 chars. Tasks: {}",
                tasks.len(),
                clip(&serde_json::Value::Array(compact).to_string(), 1000),
            )),
        ];
        coerce_prioritization(&self.client.chat(&messages)?, tasks)
    }

    /// Group archived tasks into logical categories.
    ///
    /// Category members referencing ids not in `archived` are dropped.
    pub fn sort_archived(&self, archived: &[Task]) -> Result<Vec<ArchiveCategory>, AiError> {
        let compact: Vec<serde_json::Value> = archived
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "description": t.description,
                    "priority": t.priority,
                    "tags": t.tags,
                    "archivedAt": t.archived_at,
                })
            })
            .collect();
        let messages = [
            ChatMessage::system(
                "You are an AI that organizes archived tasks intelligently. Group \
                 and sort tasks by themes, projects, or categories. Respond with \
                 ONLY valid JSON. Structure: {\"categories\":[{\"name\":\"Category Name\",\
                 \"description\":\"Brief description\",\"taskIds\":[\"id1\",\"id2\"]}]}",
            ),
            ChatMessage::user(format!(
                "Organize these {} archived tasks into logical categories. Max 5 \
                 categories. Tasks: {}",
                archived.len(),
                clip(&serde_json::Value::Array(compact).to_string(), 2000),
            )),
        ];
        coerce_categories(&self.client.chat(&messages)?, archived)
    }
}

// ── Shape coercion ───────────────────────────────────────────────────────

fn coerce_productivity(raw: &str, tasks: &[Task]) -> Result<ProductivityReport, AiError> {
    let parsed: RawProductivity = normalize::normalize(raw)?;
    let summary = parsed
        .summary
        .unwrap_or_else(|| local_summary(tasks));
    Ok(ProductivityReport {
        insights: parsed.insights,
        summary,
    })
}

fn coerce_prioritization(
    raw: &str,
    tasks: &[Task],
) -> Result<Vec<PriorityRecommendation>, AiError> {
    let parsed: RawPriorityAdvice = normalize::normalize(raw)?;
    Ok(parsed
        .recommendations
        .into_iter()
        .filter(|rec| tasks.iter().any(|t| t.id == rec.task_id))
        .collect())
}

fn coerce_categories(raw: &str, archived: &[Task]) -> Result<Vec<ArchiveCategory>, AiError> {
    let parsed: RawCategories = normalize::normalize(raw)?;
    Ok(parsed
        .categories
        .into_iter()
        .map(|mut cat| {
            cat.task_ids
                .retain(|id| archived.iter().any(|t| &t.id == id));
            cat
        })
        .collect())
}

/// Summary synthesized from locally known state when the model omits one.
fn local_summary(tasks: &[Task]) -> ProductivitySummary {
    let done = tasks.iter().filter(|t| t.status == Status::Done).count();
    let rate = if tasks.is_empty() {
        0
    } else {
        (done * 100 + tasks.len() / 2) / tasks.len()
    };
    ProductivitySummary {
        total_tasks: tasks.len(),
        completion_rate: format!("{rate}%"),
        average_time_in_progress: None,
        most_common_tags: Vec::new(),
    }
}

/// Char-safe prefix clip for prompt payloads.
fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::task::generate_task_id;

    fn task(title: &str, status: Status) -> Task {
        let now = Utc::now();
        Task {
            id: generate_task_id(),
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            status,
            tags: Vec::new(),
            ai_enhanced: false,
            ai_suggested_tags: Vec::new(),
            created_at: now,
            updated_at: now,
            archived: false,
            archived_at: None,
        }
    }

    #[test]
    fn enhancement_defaults_for_absent_fields() {
        let parsed: Enhancement =
            normalize::normalize(r#"{"improvedDescription": "better"}"#).unwrap();
        assert_eq!(parsed.improved_description.as_deref(), Some("better"));
        assert!(parsed.suggestions.is_empty());
        assert!(parsed.recommended_tags.is_empty());
        assert!(parsed.recommended_priority.is_none());
    }

    #[test]
    fn parsed_task_converts_to_draft() {
        let parsed: ParsedTask = normalize::normalize(
            r#"{"title": "Fix login", "priority": "high", "tags": ["bug", "bug"]}"#,
        )
        .unwrap();
        let draft: TaskDraft = parsed.into();
        assert_eq!(draft.title, "Fix login");
        assert_eq!(draft.priority, Some(Priority::High));
        assert_eq!(draft.tags, vec!["bug".to_string()]);
        assert!(draft.status.is_none());
    }

    #[test]
    fn missing_summary_is_synthesized_locally() {
        let tasks = vec![
            task("a", Status::Done),
            task("b", Status::Done),
            task("c", Status::Todo),
        ];
        let report = coerce_productivity(
            r#"{"insights":[{"type":"pattern","title":"t","description":"d","severity":"low"}]}"#,
            &tasks,
        )
        .unwrap();
        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.summary.total_tasks, 3);
        assert_eq!(report.summary.completion_rate, "67%");
        assert!(report.summary.average_time_in_progress.is_none());
    }

    #[test]
    fn missing_insights_default_to_empty() {
        let report = coerce_productivity(
            r#"{"summary":{"totalTasks":1,"completionRate":"0%"}}"#,
            &[task("only", Status::Backlog)],
        )
        .unwrap();
        assert!(report.insights.is_empty());
        assert_eq!(report.summary.total_tasks, 1);
    }

    #[test]
    fn empty_board_summary_has_zero_rate() {
        let summary = local_summary(&[]);
        assert_eq!(summary.total_tasks, 0);
        assert_eq!(summary.completion_rate, "0%");
    }

    #[test]
    fn recommendations_for_unknown_ids_are_dropped() {
        let known = task("known", Status::Todo);
        let raw = format!(
            r#"{{"recommendations":[
                {{"taskId":"{}","currentPriority":"medium","recommendedPriority":"high","reason":"blocking"}},
                {{"taskId":"task_0_ghost","currentPriority":"low","recommendedPriority":"high","reason":"stale"}}
            ]}}"#,
            known.id
        );
        let recs = coerce_prioritization(&raw, std::slice::from_ref(&known)).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].task_id, known.id);
        assert_eq!(recs[0].recommended_priority, Priority::High);
    }

    #[test]
    fn category_members_are_filtered_to_archived_ids() {
        let mut archived = task("old", Status::Done);
        archived.archived = true;
        let raw = format!(
            r#"{{"categories":[{{"name":"Cleanup","taskIds":["{}","task_0_ghost"]}}]}}"#,
            archived.id
        );
        let cats = coerce_categories(&raw, std::slice::from_ref(&archived)).unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].task_ids, vec![archived.id.clone()]);
    }

    #[test]
    fn fenced_prioritization_payload_parses() {
        let known = task("known", Status::Todo);
        let raw = format!(
            "```json\n{{\"recommendations\":[{{\"taskId\":\"{}\",\"currentPriority\":\"low\",\"recommendedPriority\":\"medium\",\"reason\":\"aging\"}}]}}\n```",
            known.id
        );
        let recs = coerce_prioritization(&raw, std::slice::from_ref(&known)).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn clip_is_char_safe() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("ab", 10), "ab");
    }
}
