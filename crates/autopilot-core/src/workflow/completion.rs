//! Completion client — sends one system/user prompt pair to the `/api/ai`
//! endpoint and returns plain text.
//!
//! The orchestrator only sees the [`CompletionClient`] trait, so tests and
//! alternative transports can stand in for the HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Temperature the endpoint applies when the request leaves it unset.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Body of `POST /api/ai`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new(system: Option<String>, prompt: impl Into<String>) -> Self {
        Self {
            system,
            prompt: prompt.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Non-success status; `message` is the body's `error` field when present.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse completion response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    output: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

/// Calls a remote `/api/ai` endpoint over HTTP.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionClient {
    /// `endpoint` is the full URL, e.g. `http://127.0.0.1:3210/api/ai`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if request.prompt.is_empty() {
            return Err(CompletionError::EmptyPrompt);
        }

        tracing::debug!(
            "[CompletionClient] POST {} ({} prompt chars)",
            self.endpoint,
            request.prompt.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        serde_json::from_str::<CompletionResponse>(&body)
            .map(|r| r.output)
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))
    }
}

/// Build the error for a non-success response body.
fn api_error(status: u16, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Request failed: {}", status));
    CompletionError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_unset_fields() {
        let request = CompletionRequest::new(None, "hello");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "prompt": "hello" })
        );

        let request = CompletionRequest::new(Some("be terse".into()), "hello").with_temperature(0.5);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "system": "be terse", "prompt": "hello", "temperature": 0.5 })
        );
    }

    #[test]
    fn test_api_error_prefers_body_message() {
        let err = api_error(429, r#"{"error":"Too many requests"}"#);
        assert_eq!(err.to_string(), "Too many requests");
        assert!(matches!(err, CompletionError::Api { status: 429, .. }));
    }

    #[test]
    fn test_api_error_falls_back_to_status() {
        assert_eq!(api_error(502, "<html>bad gateway</html>").to_string(), "Request failed: 502");
        assert_eq!(api_error(500, r#"{"detail":"x"}"#).to_string(), "Request failed: 500");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected_before_sending() {
        // Unroutable endpoint: reaching the network would fail differently.
        let client = HttpCompletionClient::new("http://127.0.0.1:9/api/ai");
        let err = client
            .complete(&CompletionRequest::new(None, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::EmptyPrompt));
    }
}
