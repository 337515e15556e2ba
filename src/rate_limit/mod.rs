//! In-process sliding-window rate limiter.
//!
//! State lives in memory only: it resets on restart and is not shared
//! between instances.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::errors::AppError;

/// Bucket count above which expired buckets are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

/// Minimum time between two sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Request budget for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Prefix of the limiter key, one per endpoint class.
    pub class: &'static str,
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn per_minute(class: &'static str, max_requests: usize) -> Self {
        Self {
            class,
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Full reconciliation scans the whole indexer.
pub const SYNC_ALL: RateLimitPolicy = RateLimitPolicy::per_minute("sync-all", 5);
pub const SYNC_ONE: RateLimitPolicy = RateLimitPolicy::per_minute("sync-one", 30);
pub const ACTIVITY: RateLimitPolicy = RateLimitPolicy::per_minute("activity", 30);
pub const EAS_PROXY: RateLimitPolicy = RateLimitPolicy::per_minute("eas-proxy", 60);
pub const READ: RateLimitPolicy = RateLimitPolicy::per_minute("read", 120);

#[derive(Default)]
struct Buckets {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Buckets {
    fn sweep_due(&self, now: Instant) -> bool {
        self.hits.len() >= SWEEP_THRESHOLD
            && self
                .last_sweep
                .map_or(true, |last| now.saturating_duration_since(last) >= SWEEP_INTERVAL)
    }
}

/// Sliding-window log of request timestamps per identifier.
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for `identifier` and report whether it is within budget.
    pub fn check(&self, identifier: &str, max_requests: usize, window: Duration) -> bool {
        self.check_at(identifier, max_requests, window, Instant::now())
    }

    /// [`check`](Self::check) as of `now`.
    pub fn check_at(
        &self,
        identifier: &str,
        max_requests: usize,
        window: Duration,
        now: Instant,
    ) -> bool {
        let mut buckets = self.buckets.lock();

        if !buckets.hits.contains_key(identifier) && buckets.sweep_due(now) {
            buckets.hits.retain(|_, hits| {
                hits.back()
                    .is_some_and(|last| now.saturating_duration_since(*last) < window)
            });
            buckets.last_sweep = Some(now);
        }

        let hits = buckets.hits.entry(identifier.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= window)
        {
            hits.pop_front();
        }

        if hits.len() >= max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Apply `policy` to `client`, failing with a rate-limit error when over budget.
    pub fn enforce(&self, policy: RateLimitPolicy, client: &str) -> Result<(), AppError> {
        let key = format!("{}:{}", policy.class, client);
        if self.check(&key, policy.max_requests, policy.window) {
            return Ok(());
        }
        tracing::warn!(class = policy.class, client, "Rate limit exceeded");
        Err(AppError::RateLimited {
            message: format!(
                "Too many requests: at most {} per {} seconds",
                policy.max_requests,
                policy.window.as_secs()
            ),
            retry_after_secs: policy.window.as_secs(),
        })
    }

    /// Number of tracked identifiers.
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.buckets.lock().hits.len()
    }
}
