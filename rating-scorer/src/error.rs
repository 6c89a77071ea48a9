//! Error types raised while computing ratings.

use std::fmt;

use rating_core::{EntityRef, StoreError};
use thiserror::Error;

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Per-location scoring.
    LocationScore,
    /// Per-area counts of locations by type.
    CountPercentile,
    /// Segment sub-terms.
    SegmentParts,
    /// Segment score.
    SegmentScore,
    /// Complex score components.
    ComplexParts,
    /// Complex score.
    ComplexScore,
}

impl Stage {
    /// Return the stage as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocationScore => "location score",
            Self::CountPercentile => "count percentile",
            Self::SegmentParts => "segment parts",
            Self::SegmentScore => "segment score",
            Self::ComplexParts => "complex parts",
            Self::ComplexScore => "complex score",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sample could not support a percentile ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("percentile ladder needs distinct finite samples; {usable} of {total} were usable")]
pub struct InsufficientData {
    /// Number of samples offered.
    pub total: usize,
    /// Number of finite samples among them.
    pub usable: usize,
}

/// Errors raised while scoring entities.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// A percentile ladder could not be built for a metric.
    #[error("cannot rank {metric}")]
    InsufficientData {
        /// Metric whose sample was degenerate.
        metric: String,
        /// Ladder construction failure.
        #[source]
        source: InsufficientData,
    },
    /// A lower-level score required by a composition is absent.
    #[error("{metric} is missing for {entity}")]
    MissingDependency {
        /// Name of the absent metric.
        metric: String,
        /// Entity being composed.
        entity: EntityRef,
    },
    /// None of the location-derived sub-terms has data for an entity.
    #[error("no {profile} data for {entity}")]
    NoData {
        /// Segment or profile name.
        profile: String,
        /// Entity being aggregated.
        entity: EntityRef,
    },
    /// The run deadline expired.
    #[error("deadline exceeded during {stage}")]
    DeadlineExceeded {
        /// Stage that was interrupted.
        stage: Stage,
    },
    /// The metric store or location catalogue failed.
    #[error("metric store failure")]
    Store(#[from] StoreError),
}

impl ScoringError {
    /// Wrap a ladder failure for `metric`.
    pub fn insufficient(metric: impl Into<String>, source: InsufficientData) -> Self {
        Self::InsufficientData {
            metric: metric.into(),
            source,
        }
    }

    /// Whether the error ends the whole run rather than one entity.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_core::CityId;
    use rstest::rstest;

    #[rstest]
    fn messages_name_entity_and_metric() {
        let err = ScoringError::MissingDependency {
            metric: "complex_price".into(),
            entity: EntityRef::City(CityId(4)),
        };
        assert_eq!(err.to_string(), "complex_price is missing for city 4");
    }

    #[rstest]
    fn only_deadline_is_fatal() {
        assert!(
            ScoringError::DeadlineExceeded {
                stage: Stage::SegmentScore
            }
            .is_fatal()
        );
        let skipped = ScoringError::insufficient(
            "tourist_flow",
            InsufficientData {
                total: 1,
                usable: 1,
            },
        );
        assert!(!skipped.is_fatal());
    }
}
