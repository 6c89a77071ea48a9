//! Interfaces to the slow or unreliable services the engine consumes.
//!
//! Sentiment analysis, weather comfort and geocoding live outside the
//! engine. Failures surface as [`CollaboratorError`] and callers recover
//! locally with a neutral default rather than aborting a computation.

use geo::Coord;
use thiserror::Error;

use crate::{CityId, EntityRef, RegionId};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The service could not be reached or refused the request.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        /// Name of the collaborator.
        service: &'static str,
        /// Human-readable cause.
        reason: String,
    },
    /// The service did not answer in time.
    #[error("{service} timed out")]
    Timeout {
        /// Name of the collaborator.
        service: &'static str,
    },
    /// The service answered with something unusable.
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse {
        /// Name of the collaborator.
        service: &'static str,
        /// Human-readable cause.
        reason: String,
    },
}

impl CollaboratorError {
    /// Whether retrying the call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Scores the sentiment of free text on a `0..=5` scale.
///
/// # Examples
/// ```
/// use rating_core::{CollaboratorError, SentimentAnalyser};
///
/// struct Upbeat;
///
/// impl SentimentAnalyser for Upbeat {
///     fn analyse(&self, _text: &str) -> Result<f64, CollaboratorError> {
///         Ok(4.0)
///     }
/// }
///
/// assert_eq!(Upbeat.analyse("lovely beach"), Ok(4.0));
/// ```
pub trait SentimentAnalyser {
    /// Return the sentiment of `text`.
    fn analyse(&self, text: &str) -> Result<f64, CollaboratorError>;
}

/// Supplies the precomputed seasonal weather comfort of a region or city.
pub trait WeatherSource {
    /// Return the comfort score of `entity` on a `1..=5` scale.
    fn comfort_score(&self, entity: EntityRef) -> Result<f64, CollaboratorError>;
}

/// Administrative placement resolved from coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// City containing the coordinates, when resolved.
    pub city: Option<CityId>,
    /// Region containing the coordinates, when resolved.
    pub region: Option<RegionId>,
}

/// Resolves coordinates to a region and city.
pub trait Geocoder {
    /// Resolve `location`; `Ok(None)` means the point is outside known areas.
    fn resolve(&self, location: Coord<f64>) -> Result<Option<Placement>, CollaboratorError>;
}
