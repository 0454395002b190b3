//! Core types for LLM requests and responses.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single-message chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// Model identifier sent to the endpoint.
    pub model: String,
    /// User message content.
    pub prompt: String,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Create a request with the default 30s timeout.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature,
            timeout_ms: 30_000,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// First choice's message content.
    pub text: String,
    /// How many tokens were generated, when reported.
    pub tokens_generated: u32,
    /// Wall-clock time of the HTTP exchange.
    #[serde(skip)]
    pub latency: Duration,
    /// Which model answered.
    pub model: String,
}

/// Substitute list requested from the generation prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubstitutePayload {
    /// Raw items, validated by [`crate::parse::substitute_candidates`].
    #[serde(default)]
    pub substitutes: Vec<serde_json::Value>,
}

/// A validated generated substitute: non-empty name, ratio > 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSubstitute {
    /// Name exactly as the model wrote it.
    pub name: String,
    /// Amount replacing one unit of the original.
    pub ratio: f64,
}

/// Step rewrite requested from the rewrite prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRewritePayload {
    /// Step title.
    #[serde(default)]
    pub title: String,
    /// Rewritten instruction.
    #[serde(default)]
    pub description: String,
}
