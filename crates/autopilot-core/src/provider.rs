//! Chat provider — the hosted LLM behind `POST /api/ai`.
//!
//! The endpoint talks to an OpenAI-compatible chat-completions API:
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer {api_key}
//! { "model", "temperature", "messages": [system?, user] }
//! ```

use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Returned when the first choice carries no content.
pub const NO_CONTENT_PLACEHOLDER: &str = "(No content returned)";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider is not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse provider response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion and return the trimmed text of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiChatProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        serde_json::json!({
            "model": self.config.model,
            "temperature": request.temperature,
            "messages": messages,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;

        let url = self.endpoint();
        tracing::info!("[ChatProvider] Calling {} (model: {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        extract_content(&text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// First choice's content, trimmed, or the placeholder when absent or blank.
fn extract_content(body: &str) -> Result<String, ProviderError> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    Ok(completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| NO_CONTENT_PLACEHOLDER.to_string()))
}

/// OpenAI error bodies look like `{"error":{"message":"..."}}`.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
