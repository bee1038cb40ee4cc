//! `autopilot server` — Start the HTTP backend server.

use clap::builder::BoolishValueParser;
use clap::ArgAction;

use autopilot_core::provider::{ProviderConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use autopilot_core::ratelimit::{
    positive_integer, RateLimitConfig, DEFAULT_PREFIX, DEFAULT_REQUEST_LIMIT,
    DEFAULT_WINDOW_MINUTES,
};
use autopilot_server::ServerConfig;

#[derive(Debug, clap::Args)]
pub struct ServerArgs {
    /// Host to bind to
    #[arg(long, env = "AUTOPILOT_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Port to listen on
    #[arg(long, env = "AUTOPILOT_PORT", default_value_t = 3210)]
    pub port: u16,
    /// Path to a pre-built static site to serve for non-API routes
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,
    /// API key for the OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    /// Chat model
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Requests allowed per client per window (positive integer)
    #[arg(long, env = "RATE_LIMIT_REQUESTS")]
    pub rate_limit_requests: Option<String>,
    /// Window length in minutes (positive integer)
    #[arg(long, env = "RATE_LIMIT_WINDOW_MINUTES")]
    pub rate_limit_window_minutes: Option<String>,
    /// Counter key prefix
    #[arg(long, env = "RATE_LIMIT_PREFIX", default_value = DEFAULT_PREFIX)]
    pub rate_limit_prefix: String,
    /// Upstash REST URL for the shared counter store
    #[arg(long, env = "UPSTASH_REDIS_REST_URL")]
    pub upstash_url: Option<String>,
    /// Upstash REST token
    #[arg(long, env = "UPSTASH_REDIS_REST_TOKEN", hide_env_values = true)]
    pub upstash_token: Option<String>,
    /// Allow requests when the counter store errors (true/false, yes/no, on/off, 1/0)
    #[arg(
        long,
        env = "RATE_LIMIT_FAIL_OPEN",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub fail_open: bool,
    /// Count requests in-process instead of in Upstash
    #[arg(long)]
    pub memory_rate_limit: bool,

    /// Deployment environment
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,
    /// Extra workflow YAML files to expose under /api/workflows
    #[arg(long = "workflow")]
    pub workflow_files: Vec<String>,
}

impl ServerArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            static_dir: self.static_dir,
            provider: ProviderConfig {
                base_url: self.openai_base_url,
                api_key: self.openai_api_key.filter(|k| !k.is_empty()),
                model: self.model,
            },
            rate_limit: RateLimitConfig {
                requests: positive_integer(self.rate_limit_requests.as_deref(), DEFAULT_REQUEST_LIMIT),
                window_minutes: positive_integer(
                    self.rate_limit_window_minutes.as_deref(),
                    DEFAULT_WINDOW_MINUTES,
                ),
                prefix: self.rate_limit_prefix,
                upstash_url: self.upstash_url.filter(|v| !v.trim().is_empty()),
                upstash_token: self.upstash_token.filter(|v| !v.trim().is_empty()),
                fail_open: self.fail_open,
            },
            memory_rate_limit: self.memory_rate_limit,
            environment: self.environment,
            workflow_files: self.workflow_files,
        }
    }
}

pub async fn run(config: ServerConfig) -> Result<(), String> {
    let host = config.host.clone();
    let port = config.port;

    println!("Starting autopilot server on {}:{}...", host, port);

    let addr = autopilot_server::start_server(config).await?;
    println!("Autopilot server listening on http://{}", addr);
    println!("Completion endpoint: http://{}/api/ai", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
