//! Context implementation for request-scoped data and cancellation
//!
//! This module provides the Context type which carries the log id, an optional
//! deadline and a cancellation signal through a single logical operation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Stand-in for deadlines too far out to represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + duration`, saturating at roughly thirty years out
pub(crate) fn instant_after(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Context carries request-scoped values like cancellation signals, deadlines, and the log id
///
/// Clones share the cancellation signal, so cancelling any clone stops every
/// retry loop and poller working on behalf of the same request.
#[derive(Clone)]
pub struct Context {
    log_id: Arc<str>,
    deadline: Option<Instant>,
    done: Arc<watch::Sender<bool>>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);

        Self {
            log_id: uuid::Uuid::new_v4().to_string().into(),
            deadline: None,
            done: Arc::new(done_tx),
        }
    }

    pub fn with_log_id(mut self, log_id: impl Into<String>) -> Self {
        self.log_id = log_id.into().into();
        self
    }

    /// Bound all work done on behalf of this context; an earlier existing
    /// deadline is kept
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = instant_after(Instant::now(), timeout);
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The earlier of `deadline` and this context's own deadline
    pub fn bound(&self, deadline: Instant) -> Instant {
        match self.deadline {
            Some(own) if own < deadline => own,
            _ => deadline,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.done.borrow()
    }

    pub fn cancel(&self) {
        self.done.send_replace(true);
    }

    /// Resolves once this context is cancelled
    pub async fn cancelled(&self) {
        let mut done = self.done.subscribe();
        loop {
            if *done.borrow_and_update() {
                return;
            }
            if done.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep until `wake`, returning false if cancelled first
    pub(crate) async fn sleep_until(&self, wake: Instant) -> bool {
        tokio::select! {
            _ = time::sleep_until(wake) => true,
            _ = self.cancelled() => false,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log_id", &self.log_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_generates_log_id() {
        let a = Context::new();
        let b = Context::new();
        assert_eq!(a.log_id().len(), 36);
        assert_ne!(a.log_id(), b.log_id());

        let ctx = Context::new().with_log_id("req-42");
        assert_eq!(ctx.log_id(), "req-42");
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();
        let clone = ctx.clone();

        assert!(!ctx.is_cancelled());

        clone.cancel();

        assert!(ctx.is_cancelled());
        ctx.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());

        let far = Instant::now() + Duration::from_secs(60);
        assert_eq!(ctx.bound(far), far);

        let ctx = ctx.with_timeout(Duration::from_secs(1));
        let deadline = ctx.deadline().unwrap();
        assert!(deadline < far);
        assert_eq!(ctx.bound(far), deadline);

        let ctx = ctx.with_timeout(Duration::from_secs(30));
        assert_eq!(ctx.deadline(), Some(deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let ctx = Context::new();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let completed = ctx.sleep_until(start + Duration::from_secs(10)).await;
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeouts_saturate() {
        let now = Instant::now();
        let saturated = instant_after(now, Duration::MAX);
        assert!(saturated > now + Duration::from_secs(86400 * 365));

        let ctx = Context::new().with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_some());
    }
}
