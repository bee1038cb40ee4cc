//! Upstash (Redis over REST) counter store.
//!
//! One pipeline call per request:
//!
//! ```text
//! POST {url}/pipeline
//! [["INCR", key], ["EXPIRE", key, "<secs>", "NX"], ["PTTL", key]]
//! ```

use std::time::Duration;

use async_trait::async_trait;

use super::store::{CounterStore, WindowCount};
use super::RateLimitError;

pub struct UpstashStore {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl UpstashStore {
    pub fn new(url: &str, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: format!("{}/pipeline", url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Pipeline body for one fixed-window hit.
pub fn pipeline_commands(key: &str, window: Duration) -> serde_json::Value {
    serde_json::json!([
        ["INCR", key],
        ["EXPIRE", key, window.as_secs().to_string(), "NX"],
        ["PTTL", key]
    ])
}

/// Read counter and TTL out of a pipeline response.
///
/// Accepts the results either as a top-level array or under `result`; each
/// entry may be a bare number or `{ "result": number }`. Anything else reads
/// as 0.
pub fn parse_pipeline_response(payload: &serde_json::Value) -> WindowCount {
    let empty = Vec::new();
    let results = payload
        .as_array()
        .or_else(|| payload.get("result").and_then(|r| r.as_array()))
        .unwrap_or(&empty);

    WindowCount {
        count: results.first().map(extract_number).unwrap_or(0),
        ttl_ms: results.get(2).map(extract_number).unwrap_or(0),
    }
}

fn extract_number(value: &serde_json::Value) -> i64 {
    fn as_number(v: &serde_json::Value) -> Option<i64> {
        v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
    }

    as_number(value)
        .or_else(|| value.get("result").and_then(as_number))
        .unwrap_or(0)
}

#[async_trait]
impl CounterStore for UpstashStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&pipeline_commands(key, window))
            .send()
            .await
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateLimitError::StoreUnavailable(format!(
                "Upstash pipeline request failed with status {}",
                status.as_u16()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;

        Ok(parse_pipeline_response(&payload))
    }

    fn name(&self) -> &'static str {
        "upstash"
    }
}
