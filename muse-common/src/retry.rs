//! Retry policy for calls to flaky upstream APIs.
//!
//! A policy runs an async operation up to `max_attempts` times, sleeping
//! between attempts according to its [`Backoff`]. Callers decide which
//! failures are terminal; a terminal failure stops the loop at once.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^attempt`, capped at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
}

/// Retry configuration for a single logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Returned when every attempt failed or a terminal failure occurred.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of attempts that were made.
    pub attempts: u32,
    /// The error from the last attempt.
    pub last: E,
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed after {} attempt(s): {}", self.attempts, self.last)
    }
}

impl<E: std::fmt::Debug + Display> std::error::Error for RetryError<E> {}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed { delay_ms: 1000 },
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy.
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed {
                delay_ms: delay.as_millis() as u64,
            },
        }
    }

    /// Build a policy from the `retry` config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        let backoff = if config.exponential {
            Backoff::Exponential {
                base_ms: config.backoff_ms,
                max_ms: config.max_backoff_ms,
            }
        } else {
            Backoff::Fixed {
                delay_ms: config.backoff_ms,
            }
        };
        Self {
            max_attempts: config.max_attempts,
            backoff,
        }
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms = match self.backoff {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential { base_ms, max_ms } => base_ms
                .saturating_mul(2_u64.saturating_pow(attempt))
                .min(max_ms),
        };
        Duration::from_millis(delay_ms)
    }

    /// Run `op` until it succeeds, a failure is terminal, or attempts run out.
    ///
    /// `op` receives the 0-based attempt index. No delay follows the final attempt.
    pub async fn run<T, E, F, Fut, C>(&self, mut op: F, is_terminal: C) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "Operation recovered after retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let attempts = attempt + 1;
                    if is_terminal(&e) {
                        tracing::warn!(attempt = attempts, error = %e, "Terminal failure, not retrying");
                        return Err(RetryError { attempts, last: e });
                    }
                    if attempts >= max_attempts {
                        return Err(RetryError { attempts, last: e });
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
