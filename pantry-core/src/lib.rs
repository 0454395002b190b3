//! # Pantry Core Library
//!
//! Reference data and matching for the ingredient substitution service.
//!
//! - **Catalog**: read-only store seam ([`CatalogStore`]) with SQLite and
//!   in-memory implementations
//! - **Vocabulary**: lazily loaded, single-flight cached snapshot of known
//!   ingredients with optional TTL
//! - **Matcher**: Dice-coefficient fuzzy matching against the vocabulary
//! - **Metrics**: per-model latency summary, gauge and error counters
//! - **Config**: `pantry.toml` sections for every component
//!
//! Nothing in this crate talks to a language model; see `pantry-llm`.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod persistence;
pub mod types;
pub mod vocabulary;

pub use catalog::{CatalogStore, InMemoryCatalog};
pub use config::PantryConfig;
pub use error::PantryError;
pub use matcher::FuzzyMatcher;
pub use metrics::SubstitutionMetrics;
pub use persistence::SqliteCatalog;
pub use types::*;
pub use vocabulary::{Vocabulary, VocabularyCache};
