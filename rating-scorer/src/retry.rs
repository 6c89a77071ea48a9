//! Bounded retries with exponential backoff for collaborator calls.

use std::thread;
use std::time::Duration;

use log::warn;
use rating_core::CollaboratorError;
use serde::{Deserialize, Serialize};

/// How often and how patiently to retry a failing collaborator.
///
/// Only transient failures (see [`CollaboratorError::is_transient`]) are
/// retried. The last error is returned once attempts run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first call. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that tries once and never sleeps.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (zero-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Invoke `call` until it succeeds, fails permanently, or attempts run
    /// out. `service` labels the warnings logged between attempts.
    ///
    /// # Errors
    ///
    /// Returns the last [`CollaboratorError`] seen.
    pub fn run<T, F>(&self, service: &str, mut call: F) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Result<T, CollaboratorError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{service} attempt {} of {attempts} failed: {err}; retrying in {delay:?}",
                        attempt + 1
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;

    fn unavailable() -> CollaboratorError {
        CollaboratorError::Unavailable {
            service: "sentiment",
            reason: "busy".into(),
        }
    }

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(3, 800)]
    #[case(10, 1_000)]
    fn backoff_doubles_until_capped(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = instant(3).run("sentiment", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(unavailable())
            } else {
                Ok(4.0)
            }
        });
        assert_eq!(result, Ok(4.0));
        assert_eq!(calls.get(), 3);
    }

    #[rstest]
    fn attempts_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<f64, _> = instant(4).run("sentiment", || {
            calls.set(calls.get() + 1);
            Err(unavailable())
        });
        assert_eq!(result, Err(unavailable()));
        assert_eq!(calls.get(), 4);
    }

    #[rstest]
    fn permanent_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<f64, _> = instant(5).run("sentiment", || {
            calls.set(calls.get() + 1);
            Err(CollaboratorError::InvalidResponse {
                service: "sentiment",
                reason: "not json".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
