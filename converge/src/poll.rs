//! State-refresh poller
//!
//! After an asynchronous state-changing call, a resource is fetched repeatedly
//! until its state lands in a target set. States listed as pending keep the
//! poller waiting; anything else stops it.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;

use tokio::time::Instant;

use crate::config::PollConfig;
use crate::context::{instant_after, Context};
use crate::error::PollError;

/// A refreshed resource together with its current state
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<T> {
    pub value: T,
    pub state: String,
}

impl<T> Observed<T> {
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value,
            state: state.into(),
        }
    }
}

/// What to do with a state that is neither target, pending, nor failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownStatePolicy {
    /// Stop with [`PollError::UnexpectedState`]
    #[default]
    Fail,
    /// Treat it as pending
    Wait,
}

/// Convergence target for one asynchronous operation
#[derive(Debug, Clone)]
pub struct PollTarget {
    target: BTreeSet<String>,
    pending: BTreeSet<String>,
    failed: BTreeSet<String>,
    unknown: UnknownStatePolicy,
    config: PollConfig,
}

impl PollTarget {
    pub fn new<T, P, S1, S2>(target: T, pending: P) -> Self
    where
        T: IntoIterator<Item = S1>,
        P: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            target: target.into_iter().map(Into::into).collect(),
            pending: pending.into_iter().map(Into::into).collect(),
            failed: BTreeSet::new(),
            unknown: UnknownStatePolicy::default(),
            config: PollConfig::default(),
        }
    }

    /// States meaning the operation failed remotely
    pub fn with_failed_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failed = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unknown_state_policy(mut self, policy: UnknownStatePolicy) -> Self {
        self.unknown = policy;
        self
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    fn target_list(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    fn validate<E>(&self) -> Result<(), PollError<E>> {
        if self.target.is_empty() {
            return Err(PollError::InvalidTarget("target state set is empty".into()));
        }
        if let Some(state) = self.target.intersection(&self.pending).next() {
            return Err(PollError::InvalidTarget(format!(
                "state '{}' is both target and pending",
                state
            )));
        }
        if let Some(state) = self.target.intersection(&self.failed).next() {
            return Err(PollError::InvalidTarget(format!(
                "state '{}' is both target and failure",
                state
            )));
        }
        if let Some(state) = self.pending.intersection(&self.failed).next() {
            return Err(PollError::InvalidTarget(format!(
                "state '{}' is both pending and failure",
                state
            )));
        }
        Ok(())
    }

    /// Poll `refresh` until the resource converges
    ///
    /// `refresh` returns `Ok(None)` when the resource cannot be found. Its
    /// errors end polling immediately; wrap it in [`crate::retry::retry`] if
    /// fetch errors should be retried.
    pub async fn wait<T, E, F, Fut>(
        &self,
        ctx: &Context,
        mut refresh: F,
    ) -> Result<Observed<T>, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Observed<T>>, E>>,
        E: Display,
    {
        self.validate()?;

        let started = Instant::now();
        let deadline = ctx.bound(instant_after(started, self.config.timeout));
        let mut last_state: Option<String> = None;
        let mut not_found: u32 = 0;
        let mut target_hits: u32 = 0;
        let mut polls: u32 = 0;

        if !self.config.delay.is_zero() {
            let wake = instant_after(started, self.config.delay).min(deadline);
            if !ctx.sleep_until(wake).await {
                return Err(PollError::Cancelled { last_state });
            }
        }

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout(ctx, last_state, started));
            }

            polls += 1;
            match refresh().await {
                Err(error) => {
                    tracing::debug!(log_id = %ctx.log_id(), polls, error = %error, "state refresh failed");
                    return Err(PollError::Refresh(error));
                }
                Ok(None) => {
                    target_hits = 0;
                    not_found += 1;
                    tracing::debug!(log_id = %ctx.log_id(), polls, not_found, "resource not found");
                    if not_found > self.config.not_found_checks {
                        return Err(PollError::NotFound { checks: not_found });
                    }
                }
                Ok(Some(observed)) => {
                    not_found = 0;
                    tracing::debug!(log_id = %ctx.log_id(), polls, state = %observed.state, "refreshed state");
                    last_state = Some(observed.state.clone());

                    if self.target.contains(&observed.state) {
                        target_hits += 1;
                        if target_hits >= self.config.continuous_target_occurrence {
                            return Ok(observed);
                        }
                    } else {
                        target_hits = 0;
                        if self.failed.contains(&observed.state) {
                            return Err(PollError::FailedState {
                                state: observed.state,
                            });
                        }
                        if !self.pending.contains(&observed.state)
                            && self.unknown == UnknownStatePolicy::Fail
                        {
                            return Err(PollError::UnexpectedState {
                                state: observed.state,
                                target: self.target_list(),
                            });
                        }
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout(ctx, last_state, started));
            }
            let wake = instant_after(now, self.config.interval).min(deadline);
            if !ctx.sleep_until(wake).await {
                return Err(PollError::Cancelled { last_state });
            }
        }
    }

    /// Poll a fetcher that only reports a state string
    pub async fn wait_state<E, F, Fut>(&self, ctx: &Context, mut fetch: F) -> Result<String, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        self.wait(ctx, || {
            let state = fetch();
            async move { state.await.map(|state| Some(Observed::new((), state))) }
        })
        .await
        .map(|observed| observed.state)
    }

    fn timeout<E>(&self, ctx: &Context, last_state: Option<String>, started: Instant) -> PollError<E> {
        tracing::warn!(
            log_id = %ctx.log_id(),
            elapsed = ?started.elapsed(),
            last_state = ?last_state,
            "timed out waiting for state"
        );
        PollError::Timeout {
            last_state,
            target: self.target_list(),
            timeout: self.config.timeout,
        }
    }
}
