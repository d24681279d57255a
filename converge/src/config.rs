//! Retry and polling configuration
//!
//! Every bound the executor and poller honour is carried in these values and
//! passed per call; nothing is read from process-wide state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::RetryableCodes;

/// Delay between retry attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        #[serde(rename = "interval_ms", with = "duration_ms")]
        interval: Duration,
    },
    Exponential {
        #[serde(rename = "initial_ms", with = "duration_ms")]
        initial: Duration,
        #[serde(rename = "max_ms", with = "duration_ms")]
        max: Duration,
        multiplier: u32,
    },
}

impl Backoff {
    pub fn fixed(interval: Duration) -> Self {
        Backoff::Fixed { interval }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { interval } => *interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1).min(32);
                let factor = (*multiplier).max(1).saturating_pow(exp);
                initial.saturating_mul(factor).min(*max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

/// Bounds for the retry executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total time after which no further attempt is started
    #[serde(rename = "deadline_ms", with = "duration_ms")]
    pub deadline: Duration,
    #[serde(default)]
    pub backoff: Backoff,
    /// Codes retried at this call site; empty means the classifier defaults
    #[serde(default)]
    pub retryable_codes: RetryableCodes,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(180))
    }
}

impl RetryConfig {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            backoff: Backoff::default(),
            retryable_codes: RetryableCodes::new(),
        }
    }

    /// Wait a fixed interval between attempts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.backoff = Backoff::fixed(interval);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_codes = codes.into_iter().collect();
        self
    }
}

/// Bounds for the state-refresh poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Wait before the first refresh
    #[serde(rename = "delay_ms", with = "duration_ms")]
    pub delay: Duration,
    /// Consecutive "not found" refreshes tolerated before failing
    pub not_found_checks: u32,
    /// Consecutive target observations required for success
    pub continuous_target_occurrence: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            interval: Duration::from_secs(3),
            delay: Duration::ZERO,
            not_found_checks: 20,
            continuous_target_occurrence: 1,
        }
    }
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
