//! Retry helpers bound to Tencent Cloud error codes and timeouts
//!
//! Read paths get a shorter deadline than write paths, since mutating calls
//! commonly wait on a per-resource mutex on the server side.

use std::future::Future;
use std::time::Duration;

use converge::{retry_classified, Classifier, Context, RetryConfig, RetryableCodes};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

pub mod codes {
    pub const INTERNAL_ERROR: &str = "InternalError";
    pub const FAILED_OPERATION: &str = "FailedOperation";
    pub const TRADE_UNKNOWN_ERROR: &str = "TradeUnknownError";
    pub const REQUEST_LIMIT_EXCEEDED: &str = "RequestLimitExceeded";
    pub const RESOURCE_IN_USE: &str = "ResourceInUse";
    pub const RESOURCE_INSUFFICIENT: &str = "ResourceInsufficient";
    pub const RESOURCE_UNAVAILABLE: &str = "ResourceUnavailable";
    pub const RESOURCE_BUSY: &str = "ResourceBusy";
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
    pub const AUTH_FAILURE: &str = "AuthFailure";
    pub const MUTEX_OPERATION_TASK_RUNNING: &str = "UnsupportedOperation.MutexOperationTaskRunning";
    pub const INVALID_STATE: &str = "UnsupportedOperation.InvalidState";

    pub const CLIENT_NETWORK_ERROR: &str = "ClientError.NetworkError";
    pub const CLIENT_HTTP_STATUS_ERROR: &str = "ClientError.HttpStatusCodeError";
    pub const CLIENT_PARSE_ERROR: &str = "ClientError.ParseJsonError";

    /// Codes retried when a call site names none of its own
    pub const DEFAULT_RETRYABLE: &[&str] = &[
        CLIENT_NETWORK_ERROR,
        CLIENT_HTTP_STATUS_ERROR,
        FAILED_OPERATION,
        INTERNAL_ERROR,
        TRADE_UNKNOWN_ERROR,
        REQUEST_LIMIT_EXCEEDED,
        RESOURCE_IN_USE,
        RESOURCE_INSUFFICIENT,
        RESOURCE_UNAVAILABLE,
        RESOURCE_BUSY,
    ];
}

pub fn default_retryable_codes() -> RetryableCodes {
    codes::DEFAULT_RETRYABLE.iter().copied().collect()
}

pub fn default_classifier() -> Classifier {
    Classifier::new(default_retryable_codes())
}

/// Deadlines for read and write call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(rename = "read_secs", with = "secs")]
    pub read: Duration,
    #[serde(rename = "write_secs", with = "secs")]
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(3 * 60),
            write: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryScope {
    Read,
    Write,
}

impl Timeouts {
    pub fn for_scope(&self, scope: RetryScope) -> Duration {
        match scope {
            RetryScope::Read => self.read,
            RetryScope::Write => self.write,
        }
    }

    /// Retry configuration for a call site
    ///
    /// `also_retry` extends the default transient codes rather than replacing
    /// them, so naming one extra code never makes the call less tolerant.
    pub fn retry_config(&self, scope: RetryScope, also_retry: &[&str]) -> RetryConfig {
        let mut config = RetryConfig::new(self.for_scope(scope));
        if !also_retry.is_empty() {
            config.retryable_codes = default_retryable_codes()
                .extend_from(&also_retry.iter().copied().collect::<RetryableCodes>());
        }
        config
    }
}

/// Retry a read call under the read deadline
pub async fn retry_read<T, F, Fut>(
    ctx: &Context,
    timeouts: &Timeouts,
    also_retry: &[&str],
    operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    run(ctx, timeouts.retry_config(RetryScope::Read, also_retry), operation).await
}

/// Retry a mutating call under the write deadline
pub async fn retry_write<T, F, Fut>(
    ctx: &Context,
    timeouts: &Timeouts,
    also_retry: &[&str],
    operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    run(ctx, timeouts.retry_config(RetryScope::Write, also_retry), operation).await
}

async fn run<T, F, Fut>(ctx: &Context, config: RetryConfig, operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    retry_classified(ctx, &config, &default_classifier(), operation).await
}

/// Treat "resource not found" as success, for idempotent deletes
pub fn ignore_not_found(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::{ErrorCode, ErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn read_deadline_is_shorter_than_write() {
        let timeouts = Timeouts::default();
        assert!(timeouts.read < timeouts.write);
        assert_eq!(timeouts.for_scope(RetryScope::Read), Duration::from_secs(180));
        assert_eq!(timeouts.for_scope(RetryScope::Write), Duration::from_secs(300));
    }

    #[test]
    fn default_classifier_knows_transient_codes() {
        let classifier = default_classifier();
        let none = RetryableCodes::new();

        let busy = ApiError::service(codes::RESOURCE_BUSY, "busy", "r1");
        assert_eq!(classifier.classify(&busy, &none), ErrorKind::Retryable);

        let in_use = ApiError::service("ResourceInUse.Address", "in use", "r2");
        assert_eq!(classifier.classify(&in_use, &none), ErrorKind::Retryable);

        let mutex = ApiError::service(codes::MUTEX_OPERATION_TASK_RUNNING, "running", "r3");
        assert_eq!(classifier.classify(&mutex, &none), ErrorKind::Fatal);

        let bad = ApiError::service("InvalidParameterValue", "bad", "r4");
        assert_eq!(classifier.classify(&bad, &none), ErrorKind::Fatal);

        let encode = ApiError::Encode("bad".into());
        assert_eq!(encode.code(), None);
        assert_eq!(classifier.classify(&encode, &none), ErrorKind::Fatal);
    }

    #[test]
    fn extra_codes_extend_defaults() {
        let config = Timeouts::default()
            .retry_config(RetryScope::Write, &[codes::MUTEX_OPERATION_TASK_RUNNING]);
        let allowed = &config.retryable_codes;

        assert!(allowed.matches(codes::MUTEX_OPERATION_TASK_RUNNING));
        assert!(allowed.matches(codes::INTERNAL_ERROR));
        assert_eq!(config.deadline, Duration::from_secs(300));

        let plain = Timeouts::default().retry_config(RetryScope::Read, &[]);
        assert!(plain.retryable_codes.is_empty());
    }

    #[test]
    fn timeouts_deserialize_in_seconds() {
        let timeouts: Timeouts =
            serde_json::from_str(r#"{"read_secs": 60, "write_secs": 600}"#).unwrap();
        assert_eq!(timeouts.read, Duration::from_secs(60));
        assert_eq!(timeouts.write, Duration::from_secs(600));
    }

    #[test]
    fn not_found_is_ignored() {
        let gone = Err(ApiError::service("ResourceNotFound.Address", "gone", "r5"));
        assert!(ignore_not_found(gone).is_ok());

        let other = Err(ApiError::service(codes::INTERNAL_ERROR, "boom", "r6"));
        assert!(ignore_not_found(other).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn write_retries_mutex_contention_when_asked() {
        let ctx = Context::new();
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry_write(
            &ctx,
            &Timeouts::default(),
            &[codes::MUTEX_OPERATION_TASK_RUNNING],
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ApiError::service(
                            codes::MUTEX_OPERATION_TASK_RUNNING,
                            "task running",
                            "req",
                        ))
                    } else {
                        Ok("eip-1")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "eip-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // default backoff: 500ms then 1s
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn read_gives_up_at_read_deadline() {
        let ctx = Context::new();
        let timeouts = Timeouts {
            read: Duration::from_secs(20),
            write: Duration::from_secs(60),
        };
        let start = Instant::now();

        let err = retry_read(&ctx, &timeouts, &[], || async {
            Err::<(), _>(ApiError::service(codes::REQUEST_LIMIT_EXCEEDED, "slow down", "req"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.code(), Some(codes::REQUEST_LIMIT_EXCEEDED));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_read_timeout_still_retries() {
        let ctx = Context::new();
        let calls = Arc::new(AtomicU32::new(0));
        let timeouts = Timeouts {
            read: Duration::from_secs(u64::MAX),
            write: Duration::from_secs(u64::MAX),
        };

        let result = retry_read(&ctx, &timeouts, &[], || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::service(codes::INTERNAL_ERROR, "boom", "req"))
                } else {
                    Ok("eip-1")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "eip-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
