//! Bounded retry with an explicit exhaustion policy
//!
//! Each model call in the classifier runs through [`retry_with_policy`]. The
//! caller decides per call site what happens once attempts run out: surface
//! the last error ([`Exhaustion::Fail`]) or substitute a value
//! ([`Exhaustion::Fallback`]).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Policy with no delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// What to do when the last attempt has failed
#[derive(Debug, Clone, PartialEq)]
pub enum Exhaustion<T> {
    Fail,
    Fallback(T),
}

/// Run `operation` up to `policy.max_attempts` times.
///
/// `operation` receives the 1-based attempt number. Between failed attempts
/// the task sleeps for `policy.backoff`. After the final failure
/// `on_exhausted` inspects the last error and picks the outcome.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
    on_exhausted: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnOnce(&E, u32) -> Exhaustion<T>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Attempt failed, will retry"
                );
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
                attempt += 1;
            }
            Err(err) => {
                return match on_exhausted(&err, attempt) {
                    Exhaustion::Fail => {
                        tracing::error!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Retries exhausted"
                        );
                        Err(err)
                    }
                    Exhaustion::Fallback(value) => {
                        tracing::warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Retries exhausted, using fallback"
                        );
                        Ok(value)
                    }
                };
            }
        }
    }
}
