//! # pantry-service: Ingredient Substitution Service
//!
//! Composition root tying the catalog, vocabulary cache and fuzzy matcher of
//! `pantry-core` to the LLM layer of `pantry-llm`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            SubstitutionService               │
//! │  resolve · generate_substitutes              │
//! │  rewrite_step · explain                      │
//! │        │                     │               │
//! │        ▼                     ▼               │
//! │  ┌─────────────┐     ┌─────────────────┐     │
//! │  │ pantry-core │     │   pantry-llm    │     │
//! │  │ catalog     │     │ ChatTransport   │     │
//! │  │ vocabulary  │     │ parse · retry   │     │
//! │  │ matcher     │     │ prompts         │     │
//! │  └─────────────┘     └─────────────────┘     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `resolver`: catalog-first lookup with generation fallback, construction
//! - `rewrite`: recipe step rewriting around a substitute
//! - `explain`: short free-text justification
//! - `few_shot`: accepted historical substitutions as prompt examples
//! - `logging`: `tracing` subscriber setup
//!
//! Every public operation returns a value; failures degrade and show up in
//! logs and [`pantry_core::SubstitutionMetrics`] only.

pub mod error;
pub mod explain;
pub mod few_shot;
pub mod logging;
pub mod resolver;
pub mod rewrite;

pub use error::ServiceError;
pub use explain::EXPLANATION_UNAVAILABLE;
pub use few_shot::build_few_shot_examples;
pub use logging::init_logging;
pub use resolver::{ServiceSettings, SubstitutionService, strip_annotations};
