//! Bounded, jittered exponential backoff for outbound API calls.

use crate::error::{EvalError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff bounds for one kind of outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Lower bound of every backoff delay.
    pub min_delay: Duration,
    /// Upper bound of every backoff delay.
    pub max_delay: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(15),
            max_attempts: 15,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps. Mostly useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Upper bound of the delay after the given (1-based) failed attempt:
    /// `2^(attempt-1)` seconds clamped into `[min_delay, max_delay]`.
    pub fn ceiling_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let exp = Duration::from_secs(1u64 << exponent);
        exp.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }

    /// Random delay in `[min_delay, ceiling_for_attempt(attempt)]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let low = self.min_delay.as_millis() as u64;
        let high = self.ceiling_for_attempt(attempt).as_millis() as u64;
        if high <= low {
            return Duration::from_millis(low);
        }
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

/// Run `op` with the default classifier ([`EvalError::is_retryable`]).
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(policy, operation, EvalError::is_retryable, op).await
}

/// Run `op` until it succeeds, fails with an error `classify` rejects,
/// or `policy.max_attempts` attempts have failed.
///
/// Non-retryable errors are returned as-is on first occurrence. Exhaustion
/// wraps the last error in [`EvalError::RetriesExhausted`].
pub async fn retry_with_backoff<T, F, Fut, C>(
    policy: &RetryPolicy,
    operation: &str,
    classify: C,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&EvalError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !classify(&err) {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(EvalError::RetriesExhausted {
                operation: operation.to_string(),
                attempts: attempt,
                source: Box::new(err),
            });
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "call failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
