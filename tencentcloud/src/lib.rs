//! Tencent Cloud API plumbing for Terraform resources
//!
//! Pairs a thin action client with the retry and state-wait helpers from
//! [`converge`], preconfigured with Tencent Cloud error codes, deadlines
//! and poll intervals.

pub mod api;
pub mod config;
pub mod logging;
pub mod retry;
pub mod waiter;

pub use api::{ApiError, Authorizer, Client, RateLimiter, StaticToken, Tc3Signer};
pub use config::{ConfigError, ProviderConfig, ProviderSettings};
pub use retry::{ignore_not_found, retry_read, retry_write, RetryScope, Timeouts};
pub use waiter::{state_change, DEFAULT_POLL_INTERVAL};
