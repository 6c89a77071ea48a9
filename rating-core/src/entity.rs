//! Identifiers for the geographic entities that carry metric values.
//!
//! Every metric row belongs to exactly one granularity: a region, a city, or
//! a single location. [`EntityRef`] encodes that as a tagged union so the
//! invariant holds by construction. [`Area`] narrows it to the two
//! granularities that receive segment and complex scores.

use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of an administrative region.
    RegionId
);
entity_id!(
    /// Identifier of a city.
    CityId
);
entity_id!(
    /// Identifier of a point of interest.
    LocationId
);
entity_id!(
    /// Identifier of a named metric.
    MetricId
);
entity_id!(
    /// Identifier of a persisted metric value row.
    MetricValueId
);

/// Geographic granularity of a metric row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Region-level rows.
    Region,
    /// City-level rows.
    City,
    /// Location-level rows.
    Location,
}

impl Granularity {
    /// Return the granularity as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::City => "city",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the entity a metric value describes.
///
/// # Examples
/// ```
/// use rating_core::{CityId, EntityRef, Granularity};
///
/// let entity = EntityRef::City(CityId(7));
/// assert_eq!(entity.granularity(), Granularity::City);
/// assert_eq!(entity.to_string(), "city 7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    /// A region.
    Region(RegionId),
    /// A city.
    City(CityId),
    /// A point of interest.
    Location(LocationId),
}

impl EntityRef {
    /// Granularity of the referenced entity.
    #[must_use]
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Region(_) => Granularity::Region,
            Self::City(_) => Granularity::City,
            Self::Location(_) => Granularity::Location,
        }
    }

    /// Split the reference into its nullable storage columns.
    ///
    /// Exactly one of the returned identifiers is `Some`.
    #[must_use]
    pub const fn columns(self) -> (Option<RegionId>, Option<CityId>, Option<LocationId>) {
        match self {
            Self::Region(id) => (Some(id), None, None),
            Self::City(id) => (None, Some(id), None),
            Self::Location(id) => (None, None, Some(id)),
        }
    }

    /// Rebuild a reference from storage columns.
    ///
    /// Returns `None` unless exactly one column is populated.
    #[must_use]
    pub const fn from_columns(
        region: Option<RegionId>,
        city: Option<CityId>,
        location: Option<LocationId>,
    ) -> Option<Self> {
        match (region, city, location) {
            (Some(id), None, None) => Some(Self::Region(id)),
            (None, Some(id), None) => Some(Self::City(id)),
            (None, None, Some(id)) => Some(Self::Location(id)),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region(id) => write!(f, "region {id}"),
            Self::City(id) => write!(f, "city {id}"),
            Self::Location(id) => write!(f, "location {id}"),
        }
    }
}

/// A region or a city: the entities that receive segment and complex scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Area {
    /// A region.
    Region(RegionId),
    /// A city.
    City(CityId),
}

impl Area {
    /// Granularity of the area.
    #[must_use]
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Region(_) => Granularity::Region,
            Self::City(_) => Granularity::City,
        }
    }

    /// Region filter to use when listing locations inside the area.
    #[must_use]
    pub const fn region(self) -> Option<RegionId> {
        match self {
            Self::Region(id) => Some(id),
            Self::City(_) => None,
        }
    }

    /// City filter to use when listing locations inside the area.
    #[must_use]
    pub const fn city(self) -> Option<CityId> {
        match self {
            Self::Region(_) => None,
            Self::City(id) => Some(id),
        }
    }
}

impl From<Area> for EntityRef {
    fn from(area: Area) -> Self {
        match area {
            Area::Region(id) => Self::Region(id),
            Area::City(id) => Self::City(id),
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        EntityRef::from(*self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EntityRef::Region(RegionId(1)))]
    #[case(EntityRef::City(CityId(2)))]
    #[case(EntityRef::Location(LocationId(3)))]
    fn columns_round_trip(#[case] entity: EntityRef) {
        let (region, city, location) = entity.columns();
        assert_eq!(EntityRef::from_columns(region, city, location), Some(entity));
    }

    #[rstest]
    fn rejects_rows_with_two_granularities() {
        let rebuilt = EntityRef::from_columns(Some(RegionId(1)), Some(CityId(2)), None);
        assert!(rebuilt.is_none());
    }

    #[rstest]
    fn rejects_rows_without_entity() {
        assert!(EntityRef::from_columns(None, None, None).is_none());
    }

    #[rstest]
    fn area_converts_to_entity() {
        let area = Area::City(CityId(4));
        assert_eq!(EntityRef::from(area), EntityRef::City(CityId(4)));
        assert_eq!(area.city(), Some(CityId(4)));
        assert_eq!(area.region(), None);
    }
}
