//! converge - bounded retries and state convergence for cloud provider plugins
//!
//! Remote calls against a cloud API fail transiently (lock contention,
//! throttling, internal errors) and many state changes finish out of band.
//! This crate provides the two loops a provider needs for both:
//!
//! - [`retry::retry`] runs an operation until it succeeds, fails fatally, or
//!   its deadline passes;
//! - [`poll::PollTarget`] refreshes a resource until its state converges on a
//!   target set.

// Core modules
pub mod classify;
pub mod config;
pub mod context;
pub mod error;

// Loops
pub mod poll;
pub mod retry;

// Re-exports for convenience
pub use classify::{Classifier, ErrorCode, RetryableCodes};
pub use config::{Backoff, PollConfig, RetryConfig};
pub use context::Context;
pub use error::{ErrorKind, PollError, RetryError};
pub use poll::{Observed, PollTarget, UnknownStatePolicy};
pub use retry::{retry, retry_classified, RetryOutcome};
