//! Chat-completion HTTP client.
//!
//! Thin wrapper over a remote chat-completion endpoint: send a role-tagged
//! message sequence with model parameters, get generated text back or a
//! typed failure. No retry policy lives here — callers decide.

use serde::Serialize;

use crate::error::AiError;

/// Environment variable holding the completion API credential.
pub const API_KEY_ENV: &str = "SENET_AI_API_KEY";
/// Optional override for the completion endpoint URL.
pub const API_URL_ENV: &str = "SENET_AI_URL";
/// Optional override for the model name.
pub const MODEL_ENV: &str = "SENET_AI_MODEL";

/// Configuration for the completion client.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Endpoint URL for chat completions.
    pub api_url: String,
    /// Bearer credential. `None` degrades every call to a configuration error.
    pub api_key: Option<String>,
    /// Model name to request.
    pub model: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.mistral.ai/v1/chat/completions".into(),
            api_key: None,
            model: "mistral-large-latest".into(),
            max_tokens: 1500,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_url = url;
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.model = model;
        }
        config
    }
}

/// A chat message for the completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role: "system" or "user".
    pub role: &'static str,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Client for the chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    config: CompletionConfig,
}

impl CompletionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CompletionConfig) -> Self {
        Self { config }
    }

    /// Create a client configured from the environment.
    pub fn from_env() -> Self {
        Self::new(CompletionConfig::from_env())
    }

    /// Whether a credential is present.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// The model name being requested.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a message sequence and return the generated text.
    ///
    /// Fails with [`AiError::MissingApiKey`] before any network call when no
    /// credential is configured.
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(AiError::MissingApiKey);
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending completion request"
        );

        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let resp = agent
            .post(&self.config.api_url)
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => AiError::RequestFailed { status },
                ureq::Error::Transport(t) => AiError::Transport {
                    message: t.to_string(),
                },
            })?;

        let json: serde_json::Value = resp.into_json().map_err(|e| AiError::Transport {
            message: e.to_string(),
        })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or(AiError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = CompletionConfig::default();
        assert_eq!(config.model, "mistral-large-latest");
        assert_eq!(config.max_tokens, 1500);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn chat_without_key_fails_before_any_network_call() {
        let client = CompletionClient::new(CompletionConfig::default());
        assert!(!client.is_configured());
        let result = client.chat(&[ChatMessage::user("hello")]);
        assert!(matches!(result, Err(AiError::MissingApiKey)));
    }

    #[test]
    fn chat_against_unreachable_endpoint_is_a_transport_error() {
        let client = CompletionClient::new(CompletionConfig {
            api_url: "http://127.0.0.1:1/v1/chat/completions".into(), // unreachable port
            api_key: Some("test-key".into()),
            timeout_secs: 1,
            ..Default::default()
        });
        let result = client.chat(&[ChatMessage::user("hello")]);
        assert!(matches!(result, Err(AiError::Transport { .. })));
    }
}
