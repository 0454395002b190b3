//! LLM error types.
//!
//! Transport failures and malformed model output are distinct variants so
//! logs can tell them apart, even though the generation path retries both.

use thiserror::Error;

use crate::parse::ParseFailure;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response arrived.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Endpoint answered with a non-success status.
    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Response had no first-choice message content.
    #[error("LLM response had no content")]
    EmptyContent,

    /// Model output could not be recovered as JSON.
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    /// Model output was JSON but not the expected shape.
    #[error("LLM output schema validation failed: {0}")]
    SchemaValidation(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// The overall retry deadline passed.
    #[error("LLM deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),

    /// LLM provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Whether the error came from the model's output rather than the transport.
    #[must_use]
    pub fn is_output_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::SchemaValidation(_) | Self::EmptyContent)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
