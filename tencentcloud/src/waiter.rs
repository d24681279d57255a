//! State-change waiters for asynchronous Tencent Cloud operations

use std::time::Duration;

use converge::{PollConfig, PollTarget};

/// Minimum wait between two refreshes of the same resource
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Build a poll target for a state change started by a previous call
///
/// `delay` is waited before the first refresh, giving the API time to
/// register the change.
pub fn state_change<P, T, S1, S2>(
    pending: P,
    target: T,
    timeout: Duration,
    delay: Duration,
) -> PollTarget
where
    P: IntoIterator<Item = S1>,
    T: IntoIterator<Item = S2>,
    S1: Into<String>,
    S2: Into<String>,
{
    PollTarget::new(target, pending)
        .with_config(PollConfig::new(timeout, DEFAULT_POLL_INTERVAL).with_delay(delay))
}
