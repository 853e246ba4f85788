//! State-change poller
//!
//! Polls a refresh function until the reported status reaches a target,
//! hits a failure status, or the timeout elapses:
//!
//! ```text
//! Pending* -> Target | Failure | TimedOut
//! ```
//!
//! A not-found error from the refresh function is reported as the
//! [`DELETED`] status, so delete waits target it like any other status.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use hwcloud_sdk::SdkError;
use log::{debug, trace};
use thiserror::Error;
use tokio::time::Instant;

/// Status reported for a resource the API no longer knows
pub const DELETED: &str = "DELETED";

const MIN_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error(
        "timeout while waiting for state to become '{expected}' (last state: '{last_status}', timeout: {timeout:?})"
    )]
    Timeout {
        last_status: String,
        expected: String,
        timeout: Duration,
    },

    #[error("reached failure state '{status}'")]
    FailureState { status: String },

    #[error("unexpected state '{status}', wanted target '{expected}'")]
    UnexpectedState { status: String, expected: String },

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// Object observed by a refresh, with its status
pub type Refreshed<T> = (Option<T>, String);

pub type RefreshFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Refreshed<T>, RefreshError>> + Send + 'a>>;

pub type RefreshFn<'a, T> = Box<dyn Fn() -> RefreshFuture<'a, T> + Send + Sync + 'a>;

pub struct StateChangeConf<'a, T> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub failure: Vec<String>,
    pub refresh: RefreshFn<'a, T>,
    /// Overall deadline, including `delay`
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Floor for the interval between refreshes
    pub min_timeout: Duration,
    /// Fixed interval between refreshes; zero selects exponential backoff
    pub poll_interval: Duration,
}

impl<'a, T> StateChangeConf<'a, T> {
    pub fn new<F>(pending: &[&str], target: &[&str], refresh: F) -> Self
    where
        F: Fn() -> RefreshFuture<'a, T> + Send + Sync + 'a,
    {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            failure: Vec::new(),
            refresh: Box::new(refresh),
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }

    pub fn failure(mut self, failure: &[&str]) -> Self {
        self.failure = failure.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace delay and intervals with a fixed short interval
    pub fn poll_override(mut self, interval: Option<Duration>) -> Self {
        if let Some(interval) = interval {
            self.delay = Duration::ZERO;
            self.min_timeout = Duration::ZERO;
            self.poll_interval = interval;
        }
        self
    }

    /// Poll until a target status; returns the last observed object
    pub async fn wait_for_state(&self) -> Result<Option<T>, WaitError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut last_status = String::new();

        debug!(
            "Waiting for state to become: {:?} (pending: {:?})",
            self.target, self.pending
        );

        if !self.delay.is_zero() {
            debug!("Waiting {:?} before starting to poll", self.delay);
            if !sleep_until_or_deadline(start + self.delay, deadline).await {
                return Err(self.timed_out(last_status));
            }
        }

        let mut attempt: u32 = 0;
        loop {
            let refresh = (self.refresh)();
            let result = match tokio::time::timeout_at(deadline, refresh).await {
                Ok(result) => result,
                Err(_) => return Err(self.timed_out(last_status)),
            };

            let (value, status) = match result {
                Ok(refreshed) => refreshed,
                Err(RefreshError::Sdk(e)) if e.is_not_found() => (None, DELETED.to_string()),
                Err(e) => return Err(e.into()),
            };
            trace!("Refresh returned status {:?}", status);

            if self.target.contains(&status) {
                return Ok(value);
            }
            if self.failure.contains(&status) {
                return Err(WaitError::FailureState { status });
            }
            if !self.pending.contains(&status) {
                let mut expected = self.target.clone();
                expected.extend(self.pending.iter().cloned());
                return Err(WaitError::UnexpectedState {
                    status,
                    expected: expected.join(", "),
                });
            }
            last_status = status;

            attempt += 1;
            let wait = self.interval(attempt);
            if !sleep_until_or_deadline(Instant::now() + wait, deadline).await {
                return Err(self.timed_out(last_status));
            }
        }
    }

    /// Interval after `attempt` refreshes
    fn interval(&self, attempt: u32) -> Duration {
        let wait = if self.poll_interval.is_zero() {
            let factor = 1u32 << attempt.saturating_sub(1).min(10);
            MIN_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
        } else {
            self.poll_interval
        };
        wait.max(self.min_timeout)
    }

    fn timed_out(&self, last_status: String) -> WaitError {
        WaitError::Timeout {
            last_status,
            expected: self.target.join(", "),
            timeout: self.timeout,
        }
    }
}

/// Sleep until `at`; false when the deadline comes first
async fn sleep_until_or_deadline(at: Instant, deadline: Instant) -> bool {
    if at >= deadline {
        tokio::time::sleep_until(deadline).await;
        return false;
    }
    tokio::time::sleep_until(at).await;
    true
}
