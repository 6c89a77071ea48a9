//! Tourist locations and the provider details attached to them.
//!
//! A [`Location`] carries its type tags and, when known, the city or region
//! it belongs to. Scoring reads ratings, review counts and prices from
//! [`LocationDetails`].

use std::collections::{BTreeMap, BTreeSet};

use geo::Coord;

use crate::{CityId, LocationId, RegionId};

/// Type tags attached to a location, e.g. `beach` or `hotel`.
pub type TypeTags = BTreeSet<String>;

/// Provider-specific fields that the scoring logic does not interpret.
pub type Extras = BTreeMap<String, serde_json::Value>;

/// Provider-sourced characteristics of a location.
///
/// Fields the engine scores on are typed; everything else a source site
/// reports lives in [`LocationDetails::extras`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationDetails {
    /// Identifier at the source site.
    pub external_id: Option<String>,
    /// Average external rating on a `0..=5` scale.
    pub rating: Option<f64>,
    /// Number of external reviews.
    pub review_count: Option<u64>,
    /// Nightly price for accommodation listings.
    pub price: Option<f64>,
    /// Open extension map.
    pub extras: Extras,
}

/// A point of interest gathered from a web source.
///
/// Coordinates use `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use rating_core::{CityId, Location, LocationId};
///
/// let hotel = Location::new(LocationId(1), "Harbour Inn", Coord { x: 30.3, y: 59.9 })
///     .with_city(CityId(2))
///     .with_type("hotel");
///
/// assert!(hotel.has_type("hotel"));
/// assert_eq!(hotel.rating(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Unique identifier.
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Geospatial position.
    pub location: Coord<f64>,
    /// City the location belongs to, when known.
    pub city: Option<CityId>,
    /// Region the location belongs to, when known.
    pub region: Option<RegionId>,
    /// Type tags.
    pub types: TypeTags,
    /// Provider-sourced characteristics.
    pub details: LocationDetails,
}

impl Location {
    /// Construct an untyped location without details.
    pub fn new(id: LocationId, name: impl Into<String>, location: Coord<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            city: None,
            region: None,
            types: TypeTags::new(),
            details: LocationDetails::default(),
        }
    }

    /// Attach the location to a city.
    #[must_use]
    pub const fn with_city(mut self, city: CityId) -> Self {
        self.city = Some(city);
        self
    }

    /// Attach the location to a region.
    #[must_use]
    pub const fn with_region(mut self, region: RegionId) -> Self {
        self.region = Some(region);
        self
    }

    /// Add a type tag.
    #[must_use]
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.types.insert(tag.into());
        self
    }

    /// Replace the provider details.
    #[must_use]
    pub fn with_details(mut self, details: LocationDetails) -> Self {
        self.details = details;
        self
    }

    /// Whether the location carries `tag`.
    #[must_use]
    pub fn has_type(&self, tag: &str) -> bool {
        self.types.contains(tag)
    }

    /// External rating, `0.0` when absent.
    #[must_use]
    pub fn rating(&self) -> f64 {
        self.details.rating.unwrap_or(0.0)
    }

    /// External review count, `0` when absent.
    #[must_use]
    pub fn review_count(&self) -> u64 {
        self.details.review_count.unwrap_or(0)
    }
}
