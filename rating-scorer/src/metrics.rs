//! Names of the metrics read and written by the engine.

use rating_core::Segment;

/// Per-location composite score.
pub const LOCATION_SCORE: &str = "location_score";
/// Raw tourist arrivals, usually yearly or monthly.
pub const TOURIST_FLOW: &str = "tourist_flow";
/// Raw overnight stays, usually yearly or monthly.
pub const OVERNIGHT_STAYS: &str = "overnight_stays";
/// Precomputed seasonal weather comfort.
pub const WEATHER_COMFORT: &str = "weather_comfort";

/// Top-level composite rating.
pub const COMPLEX: &str = "complex";
/// Mean of segment scores.
pub const COMPLEX_T: &str = "complex_t";
/// General infrastructure location score.
pub const COMPLEX_O: &str = "complex_o";
/// General infrastructure primary counts.
pub const COMPLEX_N: &str = "complex_n";
/// General infrastructure secondary counts.
pub const COMPLEX_L: &str = "complex_l";
/// Tourist flow percentile.
pub const COMPLEX_TRU: &str = "complex_tru";
/// Overnight stays percentile.
pub const COMPLEX_NIGHT: &str = "complex_night";
/// Inverted distance-to-capital percentile.
pub const COMPLEX_DISTANCE: &str = "complex_distance";
/// Inverted accommodation price percentile.
pub const COMPLEX_PRICE: &str = "complex_price";

/// Sub-term of a segment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    /// Mean score of primary locations.
    Locations,
    /// Mean count percentile of primary types.
    PrimaryCounts,
    /// Mean count percentile of secondary types.
    SecondaryCounts,
    /// Weather comfort.
    Weather,
}

impl Part {
    /// Suffix used in persisted metric names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Locations => "o",
            Self::PrimaryCounts => "n",
            Self::SecondaryCounts => "l",
            Self::Weather => "w",
        }
    }
}

/// Count percentile metric for a location type, e.g. `count_museum`.
#[must_use]
pub fn count_metric(type_tag: &str) -> String {
    format!("count_{type_tag}")
}

/// Segment score metric, e.g. `segment_beach`.
#[must_use]
pub fn segment_metric(segment: Segment) -> String {
    format!("segment_{segment}")
}

/// Segment sub-term metric, e.g. `segment_beach_o`.
#[must_use]
pub fn segment_part_metric(segment: Segment, part: Part) -> String {
    format!("segment_{segment}_{}", part.suffix())
}
