//! Exponential backoff with jitter, shared by every oracle call.
//!
//! [`retry_with_backoff`] is parameterized by the operation, a transient-error
//! predicate and a [`RetryPolicy`]. Only errors the predicate accepts are
//! retried; anything else is returned on the attempt that produced it.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the nominal delay added or removed at random, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Un-jittered wait after the given failed attempt (1-based).
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Smallest and largest total wait when every attempt fails.
    pub fn backoff_envelope(&self) -> (Duration, Duration) {
        let total = (1..self.max_attempts)
            .map(|a| self.nominal_delay(a))
            .fold(Duration::ZERO, Duration::saturating_add);
        (
            scale(total, 1.0 - self.jitter).unwrap_or(Duration::MAX),
            scale(total, 1.0 + self.jitter).unwrap_or(Duration::MAX),
        )
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter <= 0.0 {
            return nominal;
        }
        let factor = rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        scale(nominal, factor).unwrap_or(self.max_delay)
    }
}

fn scale(duration: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).ok()
}

/// Bookkeeping for one logical call. Lives inside a single
/// [`retry_with_backoff`] invocation.
#[derive(Debug)]
pub struct RetryState<E> {
    pub attempt: u32,
    pub last_error: Option<E>,
    pub next_delay: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("non-retryable failure on attempt {attempts}: {error}")]
    Fatal { attempts: u32, error: E },
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

/// Runs `operation` until it succeeds, fails with a non-transient error, runs
/// out of attempts or `cancel` fires. The operation receives the 1-based
/// attempt number.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_transient: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut state: RetryState<E> = RetryState {
        attempt: 0,
        last_error: None,
        next_delay: None,
    };

    loop {
        state.attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts: state.attempt });
            }
            outcome = operation(state.attempt) => outcome,
        };

        let error = match outcome {
            Ok(value) => {
                if state.attempt > 1 {
                    debug!(attempt = state.attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_transient(&error) {
            return Err(RetryError::Fatal {
                attempts: state.attempt,
                error,
            });
        }

        if state.attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: state.attempt,
                last: error,
            });
        }

        let delay = policy.jittered_delay(state.attempt);
        warn!(
            attempt = state.attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transient failure, backing off"
        );
        state.last_error = Some(error);
        state.next_delay = Some(delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts: state.attempt });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
