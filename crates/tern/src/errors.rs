use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by provider calls and the completion pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    /// Missing or unusable configuration, such as an absent API key or a
    /// request for a provider that was never set up
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider throttled this request; retried internally
    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Rate limiting persisted through every allowed attempt
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// The conversation no longer fits in the model's context window
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// The provider rejected the request with a non-retryable status
    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a usable HTTP response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller handed us something no provider call can be built from
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider returned a body we could not interpret
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// A required function call stayed invalid through the corrective retry
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    /// The caller cancelled the completion
    #[error("Completion cancelled")]
    Cancelled,
}

/// Errors attached to individual tool calls inside messages. These travel
/// with the conversation rather than failing the completion, so they must
/// serialize cleanly.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolError {
    #[error("The parameters to the tool call were invalid: {0}")]
    InvalidParameters(String),

    #[error("The tool was not found: {0}")]
    NotFound(String),

    #[error("The tool failed during execution: {0}")]
    ExecutionFailed(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
