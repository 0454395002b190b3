//! Error types for the Pantry core library.

use thiserror::Error;

/// Top-level error type for catalog, configuration and persistence operations.
#[derive(Error, Debug)]
pub enum PantryError {
    /// An ingredient with the given canonical name was not found.
    #[error("Ingredient not found: {0}")]
    IngredientNotFound(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The catalog store could not answer a query.
    #[error("Catalog store unavailable: {0}")]
    Store(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PantryError {
    fn from(err: serde_json::Error) -> Self {
        PantryError::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, PantryError>;
