//! Retry classification of provider errors
//!
//! Cloud APIs report failures with machine-readable codes such as
//! `ResourceInUse` or `UnsupportedOperation.MutexOperationTaskRunning`. The
//! [`Classifier`] maps a coded error to an [`ErrorKind`] without looking at
//! anything else, so the same error always classifies the same way.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RetryError};

/// Errors that may carry a machine-readable provider code
pub trait ErrorCode {
    fn code(&self) -> Option<&str>;
}

impl<E: ErrorCode> ErrorCode for RetryError<E> {
    fn code(&self) -> Option<&str> {
        self.get_ref().code()
    }
}

/// A set of error codes considered transient
///
/// A code matches when it is listed, or when its leading segment (the part
/// before the first `.`) is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryableCodes(BTreeSet<String>);

impl RetryableCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        self.0.insert(code.into())
    }

    /// Union of both sets
    pub fn extend_from(mut self, other: &RetryableCodes) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn matches(&self, code: &str) -> bool {
        if self.0.contains(code) {
            return true;
        }
        match code.split_once('.') {
            Some((short, _)) => self.0.contains(short),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RetryableCodes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Decides whether a failed attempt is worth repeating
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    defaults: RetryableCodes,
}

impl Classifier {
    /// Create a classifier falling back to `defaults` when a call site gives
    /// no allow-list of its own
    pub fn new(defaults: RetryableCodes) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RetryableCodes {
        &self.defaults
    }

    /// Classify `error` against the call site's `allow_list`
    ///
    /// A non-empty allow-list is authoritative. An empty one defers to the
    /// default set. Errors without a code, and codes in neither set, are fatal.
    pub fn classify<E>(&self, error: &E, allow_list: &RetryableCodes) -> ErrorKind
    where
        E: ErrorCode + ?Sized,
    {
        let Some(code) = error.code() else {
            return ErrorKind::Fatal;
        };

        let codes = if allow_list.is_empty() {
            &self.defaults
        } else {
            allow_list
        };

        if codes.matches(code) {
            ErrorKind::Retryable
        } else {
            ErrorKind::Fatal
        }
    }

    pub fn is_retryable<E>(&self, error: &E, allow_list: &RetryableCodes) -> bool
    where
        E: ErrorCode + ?Sized,
    {
        self.classify(error, allow_list) == ErrorKind::Retryable
    }

    /// Tag `error` with its classification
    pub fn wrap<E: ErrorCode>(&self, error: E, allow_list: &RetryableCodes) -> RetryError<E> {
        let kind = self.classify(&error, allow_list);
        RetryError::new(kind, error)
    }
}
