//! Tourism segments scored per region and city.
//!
//! # Examples
//! ```
//! use rating_core::Segment;
//!
//! assert_eq!(Segment::Beach.as_str(), "beach");
//! assert_eq!("sports".parse::<Segment>(), Ok(Segment::Sports));
//! ```

use serde::{Deserialize, Serialize};

/// A tourism category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// Beach holidays.
    Beach,
    /// Health and spa tourism.
    Health,
    /// Business travel.
    Business,
    /// Pilgrimage and religious sites.
    Pilgrimage,
    /// Educational and cultural visits.
    Educational,
    /// Family holidays.
    Family,
    /// Sports and active leisure.
    Sports,
    /// Eco-tourism and hiking.
    Eco,
}

impl Segment {
    /// Every segment, in scoring order.
    pub const ALL: [Self; 8] = [
        Self::Beach,
        Self::Health,
        Self::Business,
        Self::Pilgrimage,
        Self::Educational,
        Self::Family,
        Self::Sports,
        Self::Eco,
    ];

    /// Return the segment as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beach => "beach",
            Self::Health => "health",
            Self::Business => "business",
            Self::Pilgrimage => "pilgrimage",
            Self::Educational => "educational",
            Self::Family => "family",
            Self::Sports => "sports",
            Self::Eco => "eco",
        }
    }

    /// Whether weather comfort contributes to the segment score.
    ///
    /// Sports venues are largely indoor or season-independent.
    #[must_use]
    pub const fn uses_weather(self) -> bool {
        !matches!(self, Self::Sports)
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|segment| segment.as_str() == lowered)
            .ok_or_else(|| format!("unknown segment '{s}'"))
    }
}
