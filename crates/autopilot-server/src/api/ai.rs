//! `POST /api/ai` — rate-limited single completion.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use autopilot_core::provider::ChatRequest;
use autopilot_core::ratelimit::{client_identifier, RateLimitResult};
use autopilot_core::workflow::DEFAULT_TEMPERATURE;

use crate::error::ServerError;
use crate::state::AppState;

pub const INVALID_PROMPT_MESSAGE: &str = "Missing or invalid `prompt` in request body.";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(complete))
}

/// POST /api/ai — `{ system?, prompt, temperature? }` → `{ output }`.
///
/// The limiter is consulted before the body is looked at, so malformed
/// requests still count against the caller.
async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServerError> {
    let identifier = client_identifier(
        header_str(&headers, X_FORWARDED_FOR),
        header_str(&headers, X_REAL_IP),
    );

    let limit = state.rate_limiter.limit(&identifier).await?;
    let limit_headers = rate_limit_headers(&limit);

    if !limit.success {
        tracing::info!("[AI] Rate limited '{}' for {}s", identifier, limit.retry_after);
        return Ok((limit_headers, ServerError::TooManyRequests).into_response());
    }

    let request = parse_request(&body)?;

    let output = state.provider.complete(&request).await.map_err(|e| {
        tracing::error!("[AI] Completion failed: {}", e);
        ServerError::from(e)
    })?;

    Ok((limit_headers, Json(serde_json::json!({ "output": output }))).into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validate the JSON body. Only `prompt` is required; a non-string
/// `system` or non-numeric `temperature` is ignored.
fn parse_request(body: &[u8]) -> Result<ChatRequest, ServerError> {
    let invalid = || ServerError::BadRequest(INVALID_PROMPT_MESSAGE.to_string());

    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    let prompt = value
        .get("prompt")
        .and_then(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .ok_or_else(invalid)?;

    Ok(ChatRequest {
        system: value
            .get("system")
            .and_then(|s| s.as_str())
            .map(str::to_string),
        prompt: prompt.to_string(),
        temperature: value
            .get("temperature")
            .and_then(|t| t.as_f64())
            .unwrap_or(DEFAULT_TEMPERATURE),
    })
}

fn rate_limit_headers(limit: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(limit.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(limit.reset_seconds()));
    if !limit.success && limit.retry_after > 0 {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(limit.retry_after));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_defaults() {
        let request = parse_request(br#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(request.prompt, "hi");
        assert_eq!(request.system, None);
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);

        let request =
            parse_request(br#"{"prompt":"hi","system":"sys","temperature":0.9}"#).unwrap();
        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.temperature, 0.9);
    }

    #[test]
    fn test_parse_request_rejects_bad_prompt() {
        let bodies: [&[u8]; 6] = [
            b"{}",
            br#"{"prompt":""}"#,
            br#"{"prompt":42}"#,
            br#"["prompt"]"#,
            b"not json",
            b"",
        ];
        for body in bodies {
            let err = parse_request(body).unwrap_err();
            assert_eq!(err.client_message(), INVALID_PROMPT_MESSAGE);
        }
    }

    #[test]
    fn test_rate_limit_headers() {
        let limited = RateLimitResult {
            success: false,
            limit: 20,
            remaining: 0,
            reset: 1_700_000_012_345,
            retry_after: 13,
        };
        let headers = rate_limit_headers(&limited);
        assert_eq!(headers["x-ratelimit-limit"], "20");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "1700000012");
        assert_eq!(headers[header::RETRY_AFTER], "13");

        let allowed = RateLimitResult::allowed(20, 60_000, 0);
        assert!(rate_limit_headers(&allowed).get(header::RETRY_AFTER).is_none());
    }
}
