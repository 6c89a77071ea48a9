//! Wall-clock bound on long scans and batch loops.

use std::time::{Duration, Instant};

use crate::{ScoringError, Stage};

/// Point in time after which a run stops cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self { expires_at: None }
    }

    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    /// A deadline that has already passed.
    #[must_use]
    pub fn expired() -> Self {
        Self {
            expires_at: Some(Instant::now()),
        }
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Fail `stage` with [`ScoringError::DeadlineExceeded`] once expired.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::DeadlineExceeded`] when the deadline passed.
    pub fn check(&self, stage: Stage) -> Result<(), ScoringError> {
        if self.is_expired() {
            Err(ScoringError::DeadlineExceeded { stage })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn unbounded_deadline_never_fires() {
        assert!(Deadline::none().check(Stage::ComplexScore).is_ok());
    }

    #[rstest]
    fn generous_deadline_has_not_fired() {
        assert!(!Deadline::after(Duration::from_secs(3_600)).is_expired());
    }

    #[rstest]
    fn expired_deadline_names_the_stage() {
        let err = Deadline::expired()
            .check(Stage::LocationScore)
            .expect_err("deadline has passed");
        assert!(matches!(
            err,
            ScoringError::DeadlineExceeded {
                stage: Stage::LocationScore
            }
        ));
    }
}
