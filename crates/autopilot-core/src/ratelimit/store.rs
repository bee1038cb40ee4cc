//! Counter stores for the fixed-window limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::RateLimitError;

/// Counter value after an increment, plus the key's remaining lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: i64,
    /// Remaining time-to-live in milliseconds; `<= 0` when unknown.
    pub ttl_ms: i64,
}

/// Backend holding one counter per key.
///
/// `increment` must atomically bump the counter and start the window
/// expiry only when the key has none yet.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError>;

    fn name(&self) -> &'static str;
}

/// In-process fixed windows. Counters are lost on restart and not shared
/// between processes.
#[derive(Default)]
pub struct MemoryStore {
    windows: Mutex<HashMap<String, MemoryWindow>>,
}

struct MemoryWindow {
    count: i64,
    expires_at: Instant,
}

/// Expired windows are swept once the map grows past this.
const SWEEP_THRESHOLD: usize = 1024;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| w.expires_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(MemoryWindow {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;

        Ok(WindowCount {
            count: entry.count,
            ttl_ms: entry.expires_at.saturating_duration_since(now).as_millis() as i64,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_within_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        for expected in 1..=3 {
            let reading = store.increment("k", window).await.unwrap();
            assert_eq!(reading.count, expected);
            assert!(reading.ttl_ms > 0 && reading.ttl_ms <= 60_000);
        }
        assert_eq!(store.increment("other", window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_window_expiry_restarts_count() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(20);

        store.increment("k", window).await.unwrap();
        store.increment("k", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.increment("k", window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_expiry_is_not_extended_by_later_hits() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(200);

        let first = store.increment("k", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = store.increment("k", window).await.unwrap();
        assert!(second.ttl_ms < first.ttl_ms);
    }
}
