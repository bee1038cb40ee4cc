//! Core error types for the autopilot.
//!
//! `ServerError` is what HTTP adapters hand back to clients. When the `axum`
//! feature is enabled, it also implements `IntoResponse` so it can be used
//! directly as an axum handler error type.
//!
//! The narrower error enums (`CompletionError`, `ProviderError`,
//! `RateLimitError`, `WorkflowError`) live next to the code that raises them.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Message placed in the `error` field of the JSON body.
    ///
    /// Unlike `Display`, this carries no category prefix: the browser shows
    /// it verbatim in the step's run log.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::BadRequest(msg)
            | ServerError::NotFound(msg)
            | ServerError::ServiceUnavailable(msg)
            | ServerError::Upstream(msg)
            | ServerError::Internal(msg) => msg.clone(),
            ServerError::TooManyRequests => "Too many requests".to_string(),
        }
    }
}

impl From<crate::provider::ProviderError> for ServerError {
    fn from(err: crate::provider::ProviderError) -> Self {
        ServerError::Upstream(err.to_string())
    }
}

impl From<crate::ratelimit::RateLimitError> for ServerError {
    fn from(err: crate::ratelimit::RateLimitError) -> Self {
        ServerError::ServiceUnavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // Provider failures surface as a plain 500, the same as any
            // other unexpected failure of the completion endpoint.
            ServerError::Upstream(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "error": self.client_message() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_has_no_prefix() {
        let err = ServerError::BadRequest("Missing prompt".to_string());
        assert_eq!(err.to_string(), "Bad request: Missing prompt");
        assert_eq!(err.client_message(), "Missing prompt");
        assert_eq!(ServerError::TooManyRequests.client_message(), "Too many requests");
    }
}
