//! Per-sender rate limiting
//!
//! Callers depend on the [`RateLimiter`] trait so the in-process map can be
//! replaced by a shared counter service when running more than one replica.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

use crate::config::RateLimitConfig;

pub trait RateLimiter: Send + Sync {
    /// Record one request for `key`; `false` once the key is over its budget
    fn check(&self, key: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter keyed by sender
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    windows: Arc<DashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Drop windows that have already expired
    pub fn cleanup_expired(&self) {
        let window = self.window;
        self.windows
            .retain(|_, w| w.started.elapsed() < window);
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge expired windows so idle senders don't accumulate
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.window.max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                limiter.cleanup_expired();
            }
        })
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Limiter that never rejects
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn check(&self, _key: &str) -> bool {
        true
    }
}
