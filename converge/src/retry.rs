//! Bounded retry executor
//!
//! Runs an operation until it succeeds, fails with a fatal error, or the
//! deadline passes. On timeout the caller gets the last retryable error back
//! rather than a separate timeout error, so the root cause stays visible.

use std::fmt::Display;
use std::future::Future;

use tokio::time::Instant;

use crate::classify::{Classifier, ErrorCode};
use crate::config::RetryConfig;
use crate::context::{instant_after, Context};
use crate::error::{ErrorKind, RetryError};

/// Terminal state of one executor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded,
    FailedFatal,
    TimedOut,
    Cancelled,
}

impl RetryOutcome {
    fn as_str(self) -> &'static str {
        match self {
            RetryOutcome::Succeeded => "succeeded",
            RetryOutcome::FailedFatal => "failed_fatal",
            RetryOutcome::TimedOut => "timed_out",
            RetryOutcome::Cancelled => "cancelled",
        }
    }
}

/// Retry `operation` under `config`
///
/// The operation tags each failure as retryable or fatal itself. At least one
/// attempt is always made.
pub async fn retry<T, E, F, Fut>(ctx: &Context, config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    E: Display,
{
    let started = Instant::now();
    let deadline = ctx.bound(instant_after(started, config.deadline));
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => {
                finish(ctx, RetryOutcome::Succeeded, attempt, started);
                return Ok(value);
            }
            Err(error) => error,
        };

        if error.kind() == ErrorKind::Fatal {
            tracing::debug!(
                log_id = %ctx.log_id(),
                attempt,
                error = %error,
                "non-retryable error"
            );
            finish(ctx, RetryOutcome::FailedFatal, attempt, started);
            return Err(error.into_inner());
        }

        let now = Instant::now();
        if now >= deadline {
            finish(ctx, RetryOutcome::TimedOut, attempt, started);
            return Err(error.into_inner());
        }

        let delay = config.backoff.delay(attempt);
        let wake = instant_after(now, delay).min(deadline);
        tracing::debug!(
            log_id = %ctx.log_id(),
            attempt,
            error = %error,
            "retryable error, retrying in {:?}",
            wake - now
        );

        if !ctx.sleep_until(wake).await {
            finish(ctx, RetryOutcome::Cancelled, attempt, started);
            return Err(error.into_inner());
        }

        if Instant::now() >= deadline {
            finish(ctx, RetryOutcome::TimedOut, attempt, started);
            return Err(error.into_inner());
        }
    }
}

/// Retry `operation`, classifying its coded errors with `classifier`
///
/// `config.retryable_codes` is the call site's allow-list; when empty the
/// classifier's defaults decide.
pub async fn retry_classified<T, E, F, Fut>(
    ctx: &Context,
    config: &RetryConfig,
    classifier: &Classifier,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorCode + Display,
{
    retry(ctx, config, || {
        let attempt = operation();
        async move {
            attempt
                .await
                .map_err(|error| classifier.wrap(error, &config.retryable_codes))
        }
    })
    .await
}

fn finish(ctx: &Context, outcome: RetryOutcome, attempts: u32, started: Instant) {
    match outcome {
        RetryOutcome::Succeeded if attempts == 1 => {}
        RetryOutcome::Succeeded => tracing::debug!(
            log_id = %ctx.log_id(),
            attempts,
            elapsed = ?started.elapsed(),
            "operation succeeded after retries"
        ),
        _ => tracing::warn!(
            log_id = %ctx.log_id(),
            attempts,
            elapsed = ?started.elapsed(),
            outcome = outcome.as_str(),
            "giving up on operation"
        ),
    }
}
