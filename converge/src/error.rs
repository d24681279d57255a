//! Error types for converge

use std::time::Duration;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient; the executor may try again before its deadline
    Retryable,
    /// Permanent; surfaced to the caller without another attempt
    Fatal,
}

/// An operation error tagged with its retry classification
///
/// Operations handed to [`crate::retry::retry`] return this so the call site
/// decides, per error, whether the executor keeps going.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RetryError<E> {
    kind: ErrorKind,
    #[source]
    error: E,
}

impl<E> RetryError<E> {
    pub fn new(kind: ErrorKind, error: E) -> Self {
        Self { kind, error }
    }

    pub fn retryable(error: E) -> Self {
        Self::new(ErrorKind::Retryable, error)
    }

    pub fn fatal(error: E) -> Self {
        Self::new(ErrorKind::Fatal, error)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Retryable
    }

    pub fn get_ref(&self) -> &E {
        &self.error
    }

    pub fn into_inner(self) -> E {
        self.error
    }
}

/// Error returned by the state-refresh poller
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("refreshing state failed: {0}")]
    Refresh(#[source] E),

    #[error("unexpected state '{state}', wanted target {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    #[error("resource reached failure state '{state}'")]
    FailedState { state: String },

    #[error("timeout after {timeout:?} waiting for state to become {target:?} (last state: {last_state:?})")]
    Timeout {
        last_state: Option<String>,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("state refresh cancelled (last state: {last_state:?})")]
    Cancelled { last_state: Option<String> },

    #[error("invalid poll target: {0}")]
    InvalidTarget(String),
}

impl<E> PollError<E> {
    /// Last state seen before giving up, when one was observed
    pub fn last_state(&self) -> Option<&str> {
        match self {
            PollError::UnexpectedState { state, .. } | PollError::FailedState { state } => {
                Some(state)
            }
            PollError::Timeout { last_state, .. } | PollError::Cancelled { last_state } => {
                last_state.as_deref()
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("lock held")]
    struct LockHeld;

    #[test]
    fn retry_error_displays_wrapped_error() {
        let err = RetryError::retryable(LockHeld);
        assert_eq!(err.to_string(), "lock held");
        assert!(err.is_retryable());
        assert_eq!(RetryError::fatal(LockHeld).kind(), ErrorKind::Fatal);
    }

    #[test]
    fn retry_error_exposes_source() {
        use std::error::Error;

        let err = RetryError::fatal(LockHeld);
        assert!(err.source().is_some());
    }

    #[test]
    fn poll_error_reports_last_state() {
        let err: PollError<LockHeld> = PollError::Timeout {
            last_state: Some("PENDING".to_string()),
            target: vec!["SUCCESS".to_string()],
            timeout: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert_eq!(err.last_state(), Some("PENDING"));
        assert!(err.to_string().contains("PENDING"));

        let err: PollError<LockHeld> = PollError::NotFound { checks: 3 };
        assert_eq!(err.last_state(), None);
    }
}
