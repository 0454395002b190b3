//! Errors raised while building the service.
//!
//! The substitution operations themselves never fail; they degrade.

use pantry_core::PantryError;
use pantry_llm::LlmError;
use thiserror::Error;

/// Construction-time failures of [`crate::SubstitutionService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Catalog store could not be opened or configured.
    #[error("catalog error: {0}")]
    Catalog(#[from] PantryError),

    /// LLM client or prompt templates could not be set up.
    #[error("LLM setup error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration names an unsupported option.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ServiceError>;
