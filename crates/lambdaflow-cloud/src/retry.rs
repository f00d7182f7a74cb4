//! Bounded retry loops
//!
//! Remote platforms settle within seconds (IAM propagation, image processing,
//! a function still being updated), so every call site gets a small fixed
//! attempt budget instead of open-ended exponential backoff. The cancellation
//! token is checked at each attempt boundary and raced against every sleep.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry policy for one remote call site
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    /// Backoff multiplier (1.0 = fixed interval)
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Fixed interval between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Same attempt budget without any delay
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after the given zero-based attempt failed
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The predicate classified the error as non-retryable
    Fatal(E),

    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: Option<E> },

    /// The cancellation token fired between attempts
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or the policy's attempt budget runs out.
///
/// `op` receives the zero-based attempt number.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    mut op: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut last = None;

    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
            Err(e) => {
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    "Retryable failure: {}",
                    e
                );
                last = Some(e);
            }
        }

        if attempt + 1 < policy.max_attempts
            && pause(policy.delay_for_attempt(attempt), cancel).await.is_err()
        {
            return Err(RetryError::Cancelled);
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
        last,
    })
}

/// Sleep for `delay` unless the token fires first
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(CloudError::Cancelled("cancelled while waiting".to_string()))
        } else {
            Ok(())
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            Err(CloudError::Cancelled("cancelled while waiting".to_string()))
        }
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
