//! Recovery of structured data from free-text model output.
//!
//! Models asked for strict JSON still wrap it in prose or code fences now and
//! then. Recovery runs in fixed stages:
//!
//! 1. the whole trimmed text as JSON ([`ParseStage::Direct`]);
//! 2. the first greedy `{ ... }` span as JSON ([`ParseStage::Extracted`]);
//! 3. a [`ParseFailure`], which callers keep separate from transport errors.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::LlmError;
use crate::types::{GeneratedSubstitute, SubstitutePayload};

/// Greedy, newline-spanning object block.
static OBJECT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{.*\}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// First decimal number in a ratio string.
static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?|\.\d+").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

const SNIPPET_CHARS: usize = 160;

/// Which stage recovered the JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The whole output was valid JSON.
    Direct,
    /// JSON was cut out of surrounding text.
    Extracted,
}

/// A JSON value recovered from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T = Value> {
    /// The recovered value.
    pub value: T,
    /// Stage that produced it.
    pub stage: ParseStage,
}

/// Why model output could not be recovered as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// Output was empty or whitespace.
    #[error("model output is empty")]
    Empty,
    /// Output was not JSON and contained no `{ ... }` block.
    #[error("no JSON object in model output: '{snippet}'")]
    NoJsonFound {
        /// Start of the offending output.
        snippet: String,
    },
    /// A `{ ... }` block was found but is not valid JSON.
    #[error("extracted block is not valid JSON ({reason}): '{snippet}'")]
    InvalidJson {
        /// Parser message.
        reason: String,
        /// Start of the offending block.
        snippet: String,
    },
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

/// Recover a JSON value from raw model output.
///
/// # Errors
///
/// Returns a [`ParseFailure`] when neither stage yields valid JSON.
pub fn recover_json(raw: &str) -> Result<Recovered, ParseFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(Recovered {
            value,
            stage: ParseStage::Direct,
        });
    }

    let Some(block) = OBJECT_BLOCK.find(trimmed) else {
        return Err(ParseFailure::NoJsonFound {
            snippet: snippet(trimmed),
        });
    };

    serde_json::from_str::<Value>(block.as_str())
        .map(|value| Recovered {
            value,
            stage: ParseStage::Extracted,
        })
        .map_err(|e| ParseFailure::InvalidJson {
            reason: e.to_string(),
            snippet: snippet(block.as_str()),
        })
}

/// Recover and deserialize model output into `T`.
///
/// # Errors
///
/// [`LlmError::Parse`] when no JSON can be recovered, or
/// [`LlmError::SchemaValidation`] when the JSON does not fit `T`.
pub fn recover<T: DeserializeOwned>(raw: &str) -> Result<Recovered<T>, LlmError> {
    let Recovered { value, stage } = recover_json(raw)?;
    let value = serde_json::from_value(value).map_err(|e| LlmError::SchemaValidation(e.to_string()))?;
    Ok(Recovered { value, stage })
}

/// Recover the generation payload. A missing `substitutes` array is a schema
/// failure, not an empty result.
///
/// # Errors
///
/// See [`recover`].
pub fn recover_substitutes(raw: &str) -> Result<Recovered<SubstitutePayload>, LlmError> {
    let Recovered { value, stage } = recover_json(raw)?;
    if !value.get("substitutes").is_some_and(Value::is_array) {
        return Err(LlmError::SchemaValidation(
            "expected an object with a \"substitutes\" array".into(),
        ));
    }
    let value = serde_json::from_value(value).map_err(|e| LlmError::SchemaValidation(e.to_string()))?;
    Ok(Recovered { value, stage })
}

/// Parse the first numeric token of a ratio string. Zero, non-finite and
/// missing numbers yield `None`.
#[must_use]
pub fn extract_ratio(raw: &str) -> Option<f64> {
    let token = NUMERIC_TOKEN.find(raw)?;
    token
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r > 0.0)
}

fn ratio_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => extract_ratio(s),
        Value::Number(n) => n.as_f64().filter(|r| r.is_finite() && *r > 0.0),
        _ => None,
    }
}

/// Validate raw generated items, dropping any without a non-empty name or a
/// usable ratio. Order is preserved.
#[must_use]
pub fn substitute_candidates(payload: &SubstitutePayload) -> Vec<GeneratedSubstitute> {
    payload
        .substitutes
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let ratio = ratio_from_value(item.get("ratio")?)?;
            Some(GeneratedSubstitute {
                name: name.to_string(),
                ratio,
            })
        })
        .collect()
}
