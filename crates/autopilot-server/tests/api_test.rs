//! Integration test: start the server on a random port and exercise the API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autopilot_core::provider::{ChatProvider, ChatRequest, ProviderError};
use autopilot_core::ratelimit::{
    CounterStore, RateLimitConfig, RateLimitError, RateLimiter, WindowCount,
};
use autopilot_core::state::{AppState, AppStateInner};
use autopilot_core::workflow::{
    inquiry_to_quote, AggregateRunOutcome, HttpCompletionClient, StepOrchestrator,
};
use autopilot_server::ServerConfig;

/// Echoes the request back; the prompt `fail` produces a provider error and
/// the guardrails step gets a canned decision.
struct EchoProvider;

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        if request.prompt == "fail" {
            return Err(ProviderError::Api {
                status: 401,
                message: "Invalid API key".to_string(),
            });
        }
        let system = request.system.as_deref().unwrap_or("-");
        if system.contains("enforce guardrails") {
            return Ok(r#"{"pathEcho":"need_photos","cta":"send_photos"}"#.to_string());
        }
        Ok(format!("{}|{}|{}", system, request.prompt, request.temperature))
    }
}

struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment(&self, _key: &str, _window: Duration) -> Result<WindowCount, RateLimitError> {
        Err(RateLimitError::StoreUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

async fn spawn(limiter: RateLimiter) -> String {
    let state: AppState = Arc::new(AppStateInner::new(Arc::new(EchoProvider), limiter));
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let addr = autopilot_server::start_server_with_state(config, state)
        .await
        .unwrap();
    format!("http://{}", addr)
}

fn limit(requests: u32) -> RateLimitConfig {
    RateLimitConfig {
        requests,
        ..RateLimitConfig::default()
    }
}

#[tokio::test]
async fn test_health_and_workflows() {
    let base_url = spawn(RateLimiter::disabled(limit(20))).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/api/health", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "autopilot-server");

    let resp = client.get(format!("{}/api/workflows", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let workflows = body["workflows"].as_array().unwrap();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0]["id"], "inquiry-to-quote");
    assert_eq!(workflows[0]["steps"][0], "extract-features");
    assert_eq!(
        workflows[0]["branches"],
        serde_json::json!(["need_photos", "needs_human", "quote_now"])
    );

    let resp = client
        .get(format!("{}/api/workflows/inquiry-to-quote", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["entryStepId"], "extract-features");
    assert_eq!(body["decision"]["stepId"], "guardrails-present");
    assert_eq!(body["steps"]["compose-quote"]["requiredPath"], "quote_now");

    let resp = client
        .get(format!("{}/api/workflows/nope", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Workflow 'nope' not found");
}

#[tokio::test]
async fn test_ai_returns_output_and_rate_limit_headers() {
    let base_url = spawn(RateLimiter::in_memory(limit(5))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/ai", base_url))
        .header("X-Forwarded-For", "10.0.0.1, 10.0.0.2")
        .json(&serde_json::json!({ "system": "sys", "prompt": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "5");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "4");
    assert!(resp.headers().get("x-ratelimit-reset").is_some());
    assert!(resp.headers().get("retry-after").is_none());

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["output"], "sys|hello|0.2");
}

#[tokio::test]
async fn test_ai_rejects_missing_prompt() {
    let base_url = spawn(RateLimiter::disabled(limit(20))).await;
    let client = reqwest::Client::new();

    for body in [r#"{"system":"x"}"#, r#"{"prompt":7}"#, "{not json"] {
        let resp = client
            .post(format!("{}/api/ai", base_url))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body {}", body);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "Missing or invalid `prompt` in request body.");
    }
}

#[tokio::test]
async fn test_ai_rate_limits_per_client() {
    let base_url = spawn(RateLimiter::in_memory(limit(2))).await;
    let client = reqwest::Client::new();
    let send = |ip: &'static str| {
        client
            .post(format!("{}/api/ai", base_url))
            .header("X-Real-IP", ip)
            .json(&serde_json::json!({ "prompt": "hi" }))
            .send()
    };

    assert_eq!(send("1.1.1.1").await.unwrap().status(), 200);
    assert_eq!(send("1.1.1.1").await.unwrap().status(), 200);

    let resp = send("1.1.1.1").await.unwrap();
    assert_eq!(resp.status(), 429);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = resp.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Too many requests");

    assert_eq!(send("2.2.2.2").await.unwrap().status(), 200);
}

#[tokio::test]
async fn test_ai_provider_error_is_500() {
    let base_url = spawn(RateLimiter::disabled(limit(20))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/ai", base_url))
        .json(&serde_json::json!({ "prompt": "fail" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Provider returned 401: Invalid API key");
}

#[tokio::test]
async fn test_store_errors_fail_open_or_closed() {
    let open = spawn(RateLimiter::new(limit(1), Some(Arc::new(FailingStore)))).await;
    let closed = spawn(RateLimiter::new(
        RateLimitConfig {
            fail_open: false,
            ..limit(1)
        },
        Some(Arc::new(FailingStore)),
    ))
    .await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({ "prompt": "hi" });

    for _ in 0..3 {
        let resp = client
            .post(format!("{}/api/ai", open))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .post(format!("{}/api/ai", closed))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn test_orchestrator_runs_against_server() {
    let base_url = spawn(RateLimiter::in_memory(limit(20))).await;
    let client = Arc::new(HttpCompletionClient::new(format!("{}/api/ai", base_url)));

    let mut orch = StepOrchestrator::new(inquiry_to_quote(), client)
        .with_customer_message("Soft wash my cedar siding");
    let outcome = orch.run_all_eligible().await;

    assert_eq!(
        outcome,
        AggregateRunOutcome::Completed {
            branch: "need_photos".to_string(),
            step_id: "compose-photo-request".to_string(),
        }
    );
    let extract = orch.output("extract-features").unwrap();
    assert!(extract.contains("Soft wash my cedar siding"));
    assert!(extract.ends_with("|0.2"));
}
