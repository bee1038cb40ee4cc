//! Autopilot Server - HTTP backend for the inquiry-to-quote demo
//!
//! A thin axum adapter over `autopilot-core`, providing:
//! - `POST /api/ai`, the rate-limited completion endpoint the workflow calls
//! - `GET /api/workflows`, the workflow definitions for the timeline UI
//! - `GET /api/health`
//! - Optional static site serving for everything else
//!
//! This crate can be used standalone or embedded (the CLI `server` command
//! and the integration tests both start it in-process).

pub mod api;

pub use autopilot_core::{error, state};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use autopilot_core::provider::{OpenAiChatProvider, ProviderConfig};
use autopilot_core::ratelimit::{RateLimitConfig, RateLimiter};
use autopilot_core::workflow::WorkflowDefinition;

use self::state::{AppState, AppStateInner};

/// Configuration for the autopilot backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional path to a pre-built static site.
    /// When set, the server serves these files for all non-API routes.
    pub static_dir: Option<String>,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    /// Count requests in-process instead of in Upstash.
    pub memory_rate_limit: bool,
    /// Deployment environment; `production` silences the disabled-limiter warning.
    pub environment: String,
    /// Extra workflow YAML files to expose next to the built-ins.
    pub workflow_files: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            static_dir: None,
            provider: ProviderConfig::default(),
            rate_limit: RateLimitConfig::default(),
            memory_rate_limit: false,
            environment: "development".to_string(),
            workflow_files: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Create a shared `AppState` from the server configuration.
///
/// Builds the OpenAI-compatible provider, the rate limiter, and loads any
/// extra workflow files.
pub fn create_app_state(config: &ServerConfig) -> Result<AppState, String> {
    let provider = Arc::new(OpenAiChatProvider::new(config.provider.clone()));
    if config.provider.api_key.is_none() {
        tracing::warn!("[Server] OPENAI_API_KEY is not set; /api/ai will answer 500");
    }

    let rate_limiter = if config.memory_rate_limit {
        RateLimiter::in_memory(config.rate_limit.clone())
    } else {
        RateLimiter::from_config(config.rate_limit.clone(), config.is_production())
    };

    let workflows = config
        .workflow_files
        .iter()
        .map(|path| WorkflowDefinition::from_file(path).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    let state: AppState =
        Arc::new(AppStateInner::new(provider, rate_limiter).with_workflows(workflows));
    Ok(state)
}

/// Initialize the global tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autopilot_core=info,autopilot_server=info,tower_http=info".into()
            }),
        )
        .try_init();
}

/// Start the backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    init_tracing();

    tracing::info!(
        "Starting autopilot server on {}:{} ({})",
        config.host,
        config.port,
        config.environment
    );

    let state = create_app_state(&config)?;

    start_server_with_state(config, state).await
}

/// Build the application router for `state`.
pub fn app(config: &ServerConfig, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve the static site if configured
    if let Some(ref static_dir) = config.static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.is_dir() {
            tracing::info!("Serving static site from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir).not_found_service(
                tower_http::services::ServeFile::new(static_path.join("index.html")),
            );
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Site won't be served.",
                static_dir
            );
        }
    }

    app
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Tests use this to inject a fake provider or a custom limiter.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app(&config, state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Autopilot server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "autopilot-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn test_app(static_dir: Option<String>) -> Router {
        let config = ServerConfig {
            static_dir,
            ..ServerConfig::default()
        };
        let state = create_app_state(&config).unwrap();
        app(&config, state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get(test_app(None), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_ai_only_accepts_post() {
        let (status, _) = get(test_app(None), "/api/ai").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_static_site_with_index_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("demo.html"), "<h1>demo</h1>").unwrap();
        let static_dir = Some(dir.path().to_string_lossy().to_string());

        let (status, body) = get(test_app(static_dir.clone()), "/demo.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>demo</h1>");

        let (_, body) = get(test_app(static_dir.clone()), "/resources/unknown").await;
        assert_eq!(body, "<h1>home</h1>");

        // API routes still win over the static fallback.
        let (status, _) = get(test_app(static_dir), "/api/workflows").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_create_app_state_rejects_bad_workflow_file() {
        let config = ServerConfig {
            workflow_files: vec!["/definitely/not/here.yaml".to_string()],
            ..ServerConfig::default()
        };
        let err = create_app_state(&config).err().unwrap();
        assert!(err.contains("/definitely/not/here.yaml"));
    }
}
