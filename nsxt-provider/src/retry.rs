//! Bounded exponential backoff for consistency waits.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{Error as BackoffError, ExponentialBackoff};
use tracing::debug;

use crate::error::{ProviderError, Result};

/// How long to wait for the manager to converge after a create or destroy.
///
/// Only visibility is waited for. Errors returned by the check end the wait
/// immediately, so transport failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra checks after the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A single check, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            multiplier: 2,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// The delay schedule, ending after `max_attempts` delays.
    pub fn backoff(&self) -> AttemptLimited {
        AttemptLimited {
            inner: ExponentialBackoff {
                current_interval: self.initial_delay,
                initial_interval: self.initial_delay,
                randomization_factor: 0.0,
                multiplier: f64::from(self.multiplier.max(1)),
                max_interval: self.max_delay,
                max_elapsed_time: None,
                ..ExponentialBackoff::default()
            },
            remaining: self.max_attempts,
            max_attempts: self.max_attempts,
        }
    }

    /// Run `check` until it yields a value or the attempts run out.
    ///
    /// Returns `Ok(None)` when the policy is exhausted.
    pub async fn poll<T, F, Fut>(&self, what: &str, mut check: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let op = || {
            let attempt = check();
            async move {
                match attempt.await {
                    Ok(Some(value)) => Ok(value),
                    Ok(None) => Err(BackoffError::transient(Wait::Pending)),
                    Err(e) => Err(BackoffError::permanent(Wait::Failed(e))),
                }
            }
        };
        let log_pending = |_: Wait, delay: Duration| {
            debug!(
                what = what,
                delay_ms = delay.as_millis() as u64,
                "Not converged yet, retrying"
            );
        };

        match backoff::future::retry_notify(self.backoff(), op, log_pending).await {
            Ok(value) => Ok(Some(value)),
            Err(Wait::Pending) => Ok(None),
            Err(Wait::Failed(e)) => Err(e),
        }
    }
}

/// Outcome of one check that did not produce a value.
enum Wait {
    Pending,
    Failed(ProviderError),
}

/// An [`ExponentialBackoff`] that gives up after a fixed number of delays.
#[derive(Debug)]
pub struct AttemptLimited {
    inner: ExponentialBackoff,
    remaining: u32,
    max_attempts: u32,
}

impl Backoff for AttemptLimited {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.remaining = self.max_attempts;
    }
}
