//! # pantry-llm: LLM layer for Pantry
//!
//! Everything that talks to a generative model goes through this crate:
//!   - **client**: one chat-completion attempt against an OpenAI-compatible endpoint
//!   - **parse**: recovery of JSON from free-text model output
//!   - **retry**: fixed backoff bounded by an optional overall deadline
//!   - **prompt**: the three task templates, overridable from TOML files
//!
//! # Architecture
//!
//! ```text
//! prompt ──render──▶ LlmRequest ──ChatTransport──▶ raw text ──parse──▶ typed payload
//!                          ▲                                     │
//!                          └──────────── RetryPolicy ◀───────────┘
//! ```
//!
//! Transport failures and output failures stay distinct [`LlmError`] variants;
//! callers decide what each one degrades to.

pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod types;

pub use client::{ChatTransport, LlmClient, LlmProvider};
pub use error::LlmError;
pub use parse::{ParseFailure, ParseStage, Recovered};
pub use prompt::{PromptEngine, PromptId};
pub use retry::{Attempted, RetryPolicy};
pub use types::{GeneratedSubstitute, LlmRequest, LlmResponse, StepRewritePayload, SubstitutePayload};
