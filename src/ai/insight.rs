//! Paced insight fetching with cancellation.
//!
//! The productivity report and the priority recommendations come from two
//! separate completion calls. They are intentionally sequenced with a fixed
//! inter-call delay to respect the remote rate limit — cooperative pacing,
//! not a lock. A [`ViewToken`] guards the whole fetch: once the consumer
//! dismisses its view, results are discarded instead of applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::AiError;
use crate::task::Task;

use super::{Assistant, PriorityRecommendation, ProductivityReport};

/// Delay between the two dependent completion calls.
pub const INTER_CALL_DELAY: Duration = Duration::from_secs(1);

/// Validity token for an in-flight fetch.
///
/// Cheap to clone; dismissing any clone invalidates the request, and results
/// arriving afterwards are dropped without touching state.
#[derive(Debug, Clone, Default)]
pub struct ViewToken(Arc<AtomicBool>);

impl ViewToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the consuming view as gone.
    pub fn dismiss(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        !self.0.load(Ordering::Acquire)
    }
}

/// Both insight artifacts for one view of the board.
#[derive(Debug, Clone)]
pub struct InsightBundle {
    pub report: ProductivityReport,
    pub recommendations: Vec<PriorityRecommendation>,
}

/// Fetch productivity insights then priority recommendations, one after the
/// other with the standard inter-call delay.
///
/// Returns `Ok(None)` when the token was dismissed at any checkpoint — the
/// consumer is gone and partial results must not reach it.
pub fn fetch_insights(
    assistant: &Assistant,
    tasks: &[Task],
    token: &ViewToken,
) -> Result<Option<InsightBundle>, AiError> {
    fetch_insights_paced(assistant, tasks, token, INTER_CALL_DELAY)
}

/// [`fetch_insights`] with an explicit pacing delay.
pub fn fetch_insights_paced(
    assistant: &Assistant,
    tasks: &[Task],
    token: &ViewToken,
    delay: Duration,
) -> Result<Option<InsightBundle>, AiError> {
    if !token.is_live() {
        return Ok(None);
    }

    let report = assistant.analyze_productivity(tasks)?;
    if !token.is_live() {
        tracing::debug!("insight view dismissed, dropping productivity report");
        return Ok(None);
    }

    std::thread::sleep(delay);
    if !token.is_live() {
        return Ok(None);
    }

    let recommendations = assistant.smart_prioritization(tasks)?;
    if !token.is_live() {
        tracing::debug!("insight view dismissed, dropping recommendations");
        return Ok(None);
    }

    Ok(Some(InsightBundle {
        report,
        recommendations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CompletionClient, CompletionConfig};

    fn unconfigured_assistant() -> Assistant {
        Assistant::new(CompletionClient::new(CompletionConfig::default()))
    }

    #[test]
    fn dismissed_token_short_circuits_before_any_call() {
        let token = ViewToken::new();
        token.dismiss();
        // The assistant has no API key: any attempted call would error.
        // Ok(None) proves the fetch never reached the network.
        let result = fetch_insights_paced(
            &unconfigured_assistant(),
            &[],
            &token,
            Duration::ZERO,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn live_token_lets_errors_surface() {
        let token = ViewToken::new();
        let result =
            fetch_insights_paced(&unconfigured_assistant(), &[], &token, Duration::ZERO);
        assert!(matches!(result, Err(AiError::MissingApiKey)));
    }

    #[test]
    fn token_clones_share_the_dismissal() {
        let token = ViewToken::new();
        let clone = token.clone();
        assert!(clone.is_live());
        token.dismiss();
        assert!(!clone.is_live());
    }
}
