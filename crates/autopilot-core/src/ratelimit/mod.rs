//! Fixed-window rate limiter for the completion endpoint.
//!
//! Each client identifier gets a counter keyed `{prefix}:{identifier}` that
//! expires one window after its first hit. With no store configured the
//! limiter lets everything through; with a failing store it does the same
//! unless `fail_open` is turned off.

pub mod store;
pub mod upstash;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub use store::{CounterStore, MemoryStore, WindowCount};
pub use upstash::UpstashStore;

const RATE_LIMITER_TARGET: &str = "autopilot_core::ratelimit";

pub const DEFAULT_REQUEST_LIMIT: u32 = 20;
pub const DEFAULT_WINDOW_MINUTES: u32 = 1;
pub const DEFAULT_PREFIX: &str = "rate-limit:ai";

/// Identifier used when no client address header is present.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_minutes: u32,
    pub prefix: String,
    pub upstash_url: Option<String>,
    pub upstash_token: Option<String>,
    /// Allow requests when the store errors.
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: DEFAULT_REQUEST_LIMIT,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            prefix: DEFAULT_PREFIX.to_string(),
            upstash_url: None,
            upstash_token: None,
            fail_open: true,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable or non-positive integers fall
    /// back to the defaults; empty credentials count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            requests: positive_integer(lookup("RATE_LIMIT_REQUESTS").as_deref(), DEFAULT_REQUEST_LIMIT),
            window_minutes: positive_integer(
                lookup("RATE_LIMIT_WINDOW_MINUTES").as_deref(),
                DEFAULT_WINDOW_MINUTES,
            ),
            prefix: lookup("RATE_LIMIT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            upstash_url: non_empty("UPSTASH_REDIS_REST_URL"),
            upstash_token: non_empty("UPSTASH_REDIS_REST_TOKEN"),
            fail_open: flag(lookup("RATE_LIMIT_FAIL_OPEN").as_deref(), true),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_minutes) * 60)
    }

    pub fn window_ms(&self) -> i64 {
        i64::from(self.window_minutes) * 60_000
    }

    pub fn key(&self, identifier: &str) -> String {
        format!("{}:{}", self.prefix, identifier)
    }
}

/// Boolean switch: `false`, `no`, `off`, `0` (and `f`, `n`) turn it off; any
/// other non-empty value turns it on.
pub fn flag(value: Option<&str>, fallback: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v.is_empty() => fallback,
        Some(v) => !matches!(v.as_str(), "false" | "f" | "no" | "n" | "off" | "0"),
        None => fallback,
    }
}

/// Leading decimal digits parsed as a positive integer, else `fallback`.
pub fn positive_integer(value: Option<&str>, fallback: u32) -> u32 {
    let Some(value) = value else {
        return fallback;
    };
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => fallback,
    }
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window end, epoch milliseconds.
    pub reset: i64,
    /// Seconds to wait; 0 when allowed.
    pub retry_after: u64,
}

impl RateLimitResult {
    /// Result for a request that was not counted.
    pub fn allowed(limit: u32, window_ms: i64, now_ms: i64) -> Self {
        Self {
            success: true,
            limit,
            remaining: limit,
            reset: now_ms + window_ms,
            retry_after: 0,
        }
    }

    /// Apply the fixed-window rules to a counter reading.
    pub fn from_count(limit: u32, window_ms: i64, reading: WindowCount, now_ms: i64) -> Self {
        let limit_i = i64::from(limit);
        let success = reading.count <= limit_i;
        let remaining = (limit_i - reading.count).clamp(0, limit_i) as u32;
        let ttl = if reading.ttl_ms > 0 {
            reading.ttl_ms
        } else {
            window_ms
        };
        let retry_after = if success {
            0
        } else {
            ((ttl + 999) / 1000) as u64
        };

        Self {
            success,
            limit,
            remaining,
            reset: now_ms + ttl,
            retry_after,
        }
    }

    /// `reset` in whole epoch seconds, as sent in `X-RateLimit-Reset`.
    pub fn reset_seconds(&self) -> i64 {
        self.reset.div_euclid(1000)
    }
}

/// Rate limiter, constructed once per process and shared via state.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Option<Arc<dyn CounterStore>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Option<Arc<dyn CounterStore>>) -> Self {
        tracing::info!(
            target: RATE_LIMITER_TARGET,
            limit = config.requests,
            window_minutes = config.window_minutes,
            store = store.as_ref().map(|s| s.name()).unwrap_or("none"),
            fail_open = config.fail_open,
            "[RateLimiter] Initialized"
        );
        Self { config, store }
    }

    /// Pick the store from the configuration: Upstash when both credentials
    /// are present, otherwise none (every request allowed).
    pub fn from_config(config: RateLimitConfig, production: bool) -> Self {
        let store: Option<Arc<dyn CounterStore>> =
            match (config.upstash_url.as_deref(), config.upstash_token.as_deref()) {
                (Some(url), Some(token)) => Some(Arc::new(UpstashStore::new(url, token))),
                _ => {
                    if !production {
                        tracing::warn!(
                            target: RATE_LIMITER_TARGET,
                            "[RateLimiter] Rate limiting is disabled because Upstash credentials are not configured."
                        );
                    }
                    None
                }
            };
        Self::new(config, store)
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Some(Arc::new(MemoryStore::new())))
    }

    /// A limiter that never counts anything.
    pub fn disabled(config: RateLimitConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Count one request for `identifier`.
    pub async fn limit(&self, identifier: &str) -> Result<RateLimitResult, RateLimitError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let limit = self.config.requests;
        let window_ms = self.config.window_ms();

        let Some(store) = self.store.as_ref() else {
            return Ok(RateLimitResult::allowed(limit, window_ms, now_ms));
        };

        let key = self.config.key(identifier);
        match store.increment(&key, self.config.window()).await {
            Ok(reading) => {
                let result = RateLimitResult::from_count(limit, window_ms, reading, now_ms);
                if !result.success {
                    tracing::debug!(
                        target: RATE_LIMITER_TARGET,
                        identifier = %identifier,
                        count = reading.count,
                        retry_after = result.retry_after,
                        "[RateLimiter] Limit exceeded"
                    );
                }
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    target: RATE_LIMITER_TARGET,
                    store = store.name(),
                    error = %e,
                    "[RateLimiter] Failed to enforce rate limit"
                );
                if self.config.fail_open {
                    Ok(RateLimitResult::allowed(limit, window_ms, now_ms))
                } else {
                    Err(e)
                }
            }
        }
    }
}

/// Client identifier from proxy headers: first `X-Forwarded-For` entry,
/// else `X-Real-IP`, else [`ANONYMOUS_CLIENT`].
pub fn client_identifier(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}
