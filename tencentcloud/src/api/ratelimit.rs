//! Per-action request rate limiting
//!
//! The API throttles each action separately, so requests are admitted through
//! a one-second sliding window keyed by action name.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionStats {
    pub total_requests: u64,
    pub throttled_requests: u64,
    pub last_request: Option<Instant>,
}

#[derive(Default)]
struct ActionWindow {
    admitted: VecDeque<Instant>,
    stats: ActionStats,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, ActionWindow>>>,
    default_limit: u32,
    overrides: Arc<HashMap<String, u32>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_SECOND)
    }
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            default_limit: requests_per_second.max(1),
            overrides: Arc::new(HashMap::new()),
        }
    }

    /// Use a different limit for one action
    pub fn with_action_limit(mut self, action: impl Into<String>, requests_per_second: u32) -> Self {
        Arc::make_mut(&mut self.overrides).insert(action.into(), requests_per_second.max(1));
        self
    }

    pub fn limit_for(&self, action: &str) -> u32 {
        self.overrides
            .get(action)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Wait until `action` may be sent
    pub async fn check(&self, action: &str) {
        let limit = self.limit_for(action) as usize;
        let mut throttled = false;

        loop {
            let wake = {
                let mut windows = self.windows.lock().await;
                let window = windows.entry(action.to_string()).or_default();
                let now = Instant::now();

                while window
                    .admitted
                    .front()
                    .is_some_and(|admitted| now.duration_since(*admitted) >= WINDOW)
                {
                    window.admitted.pop_front();
                }

                if window.admitted.len() < limit {
                    window.admitted.push_back(now);
                    window.stats.total_requests += 1;
                    window.stats.last_request = Some(now);
                    return;
                }

                if !throttled {
                    throttled = true;
                    window.stats.throttled_requests += 1;
                }
                window
                    .admitted
                    .front()
                    .map_or(now, |oldest| *oldest + WINDOW)
            };

            tracing::debug!(action, "rate limit reached, waiting until {:?}", wake);
            tokio::time::sleep_until(wake).await;
        }
    }

    pub async fn stats(&self, action: &str) -> ActionStats {
        let windows = self.windows.lock().await;
        windows
            .get(action)
            .map(|window| window.stats.clone())
            .unwrap_or_default()
    }
}
