//! LLM Client: chat-completion transport over an OpenAI-compatible endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Longest error body kept in [`LlmError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Anything that can answer a single-prompt chat completion.
///
/// One call is one attempt; retry policy belongs to the caller.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` and return the first choice's message content.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Whether a backend is configured at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenAI-compatible chat-completions endpoint (full URL) with bearer auth.
    OpenAiCompatible { endpoint: String, api_key: String },
    /// No LLM available: all calls fail and callers fall back.
    None,
}

/// HTTP client for the configured provider.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider = match &self.provider {
            LlmProvider::OpenAiCompatible { endpoint, .. } => endpoint.as_str(),
            LlmProvider::None => "none",
        };
        f.debug_struct("LlmClient").field("provider", &provider).finish()
    }
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            http: Client::new(),
        }
    }

    /// Create an OpenAI-compatible client.
    #[must_use]
    pub fn openai(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(LlmProvider::OpenAiCompatible {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a client with no LLM backend (all calls fail → fallback).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None)
    }

    async fn complete_openai(
        &self,
        endpoint: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
        });

        let start = Instant::now();
        let resp = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(Duration::from_millis(request.timeout_ms))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(request.timeout_ms)
                } else {
                    LlmError::from(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            warn!(model = %request.model, status = status.as_u16(), "LLM endpoint returned error");
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("unreadable response body: {e}")))?;
        let latency = start.elapsed();

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }

        let tokens = json["usage"]["completion_tokens"]
            .as_u64()
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or(0);
        let model = json["model"].as_str().unwrap_or(&request.model).to_string();

        debug!(
            model = %model,
            tokens,
            latency_ms = latency.as_millis(),
            "LLM call completed"
        );

        Ok(LlmResponse {
            text,
            tokens_generated: tokens,
            latency,
            model,
        })
    }
}

#[async_trait]
impl ChatTransport for LlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::OpenAiCompatible { endpoint, api_key } => {
                self.complete_openai(endpoint, api_key, request).await
            }
        }
    }

    fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_is_unavailable() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let err = client
            .complete(&LlmRequest::new("m", "hello", 0.0))
            .await
            .expect_err("no backend");
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = LlmClient::openai("http://127.0.0.1:9/v1/chat/completions", "key");
        assert!(client.is_available());
        let err = client
            .complete(&LlmRequest::new("m", "hello", 0.0).with_timeout(2000))
            .await
            .expect_err("connection refused");
        assert!(!err.is_output_error());
    }

    #[test]
    fn debug_hides_api_key() {
        let client = LlmClient::openai("https://example.invalid/v1/chat/completions", "secret-key");
        let printed = format!("{client:?}");
        assert!(printed.contains("example.invalid"));
        assert!(!printed.contains("secret-key"));
    }
}
