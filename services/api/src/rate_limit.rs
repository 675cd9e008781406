use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use civisure_common::RateLimitConfig;

/// Sliding-window request log per client key.
#[derive(Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests as usize,
            hits: Arc::new(DashMap::new()),
        }
    }

    /// Record a request for `key`; `false` once the window is full.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut log = self.hits.entry(key.to_string()).or_default();

        while let Some(&oldest) = log.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.max_requests {
            return false;
        }

        log.push_back(now);
        true
    }

    /// Forget clients with no request inside the current window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.hits.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}
