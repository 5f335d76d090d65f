//! Rich diagnostic error types for the senet board engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the senet engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, source chains) through to the
/// user.
#[derive(Debug, Error, Diagnostic)]
pub enum SenetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Board(#[from] BoardError),
}

// ---------------------------------------------------------------------------
// AI errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AiError {
    #[error("AI API key is not configured")]
    #[diagnostic(
        code(senet::ai::missing_api_key),
        help(
            "Set the SENET_AI_API_KEY environment variable. \
             AI-assisted features are unavailable without it; \
             the rest of the board works normally."
        )
    )]
    MissingApiKey,

    #[error("completion request failed with status {status}")]
    #[diagnostic(
        code(senet::ai::request_failed),
        help(
            "The completion endpoint rejected the request. \
             Status 401 means the API key is invalid, 429 means you are \
             being rate limited — wait a moment and try again."
        )
    )]
    RequestFailed { status: u16 },

    #[error("transport error talking to the completion endpoint: {message}")]
    #[diagnostic(
        code(senet::ai::transport),
        help("Check your network connection and the endpoint URL.")
    )]
    Transport { message: String },

    #[error("the model returned no completion text")]
    #[diagnostic(
        code(senet::ai::empty_completion),
        help("The response contained no choices. Retry the request.")
    )]
    EmptyCompletion,

    #[error("model response is not valid JSON, even after repair")]
    #[diagnostic(
        code(senet::ai::malformed_response),
        help(
            "The model produced text that could not be coerced into the \
             expected shape. The raw response is attached for inspection; \
             re-running the request usually produces parseable output."
        )
    )]
    MalformedResponse { raw: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store credentials are not configured")]
    #[diagnostic(
        code(senet::store::missing_credentials),
        help(
            "Set SENET_STORE_URL and SENET_STORE_ANON_KEY to use the remote \
             store, or omit them to work against the local JSON file."
        )
    )]
    MissingCredentials,

    #[error("store request failed with status {status}")]
    #[diagnostic(
        code(senet::store::http),
        help(
            "The row store rejected the request. Status 401/403 usually \
             means the session expired — sign in again."
        )
    )]
    Http { status: u16 },

    #[error("transport error talking to the store: {message}")]
    #[diagnostic(
        code(senet::store::transport),
        help("Check your network connection and the store URL.")
    )]
    Transport { message: String },

    #[error("authentication failed: {message}")]
    #[diagnostic(
        code(senet::store::auth_failed),
        help("Verify the email and password, or sign up first.")
    )]
    AuthFailed { message: String },

    #[error("no row found for task id {id}")]
    #[diagnostic(
        code(senet::store::not_found),
        help("The task row does not exist in the store. It may have been deleted elsewhere.")
    )]
    NotFound { id: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(senet::store::io),
        help(
            "A filesystem operation failed. Check that the board file's \
             directory exists and has correct permissions."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(senet::store::serde),
        help(
            "Failed to serialize or deserialize task rows. The stored data \
             format may have changed between versions."
        )
    )]
    Serialization { message: String },
}

impl From<std::io::Error> for StoreError {
    fn from(source: std::io::Error) -> Self {
        StoreError::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Board errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BoardError {
    #[error("task not found: {id}")]
    #[diagnostic(
        code(senet::board::not_found),
        help("The referenced task id does not exist on the board. It may have been deleted.")
    )]
    NotFound { id: String },

    #[error("invalid task: {field} is required")]
    #[diagnostic(
        code(senet::board::validation),
        help("Provide a non-empty value for the missing field.")
    )]
    Validation { field: &'static str },
}

/// Convenience alias for functions returning senet results.
pub type SenetResult<T> = std::result::Result<T, SenetError>;
