//! Scoping filters for metric value scans.
//!
//! A filter column distinguishes "not specified" ([`Filter::Any`]) from an
//! explicit SQL `NULL` ([`Filter::Null`]). Region-level rows, for example,
//! are selected with `city = Null, location = Null` while `region = Any`.

use crate::{CityId, EntityRef, Granularity, LocationId, MetricKey, Period, RegionId};

/// Tri-state filter on a nullable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<T> {
    /// The column is unconstrained.
    Any,
    /// The column must be `NULL`.
    Null,
    /// The column must equal the value.
    Eq(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T: Copy + PartialEq> Filter<T> {
    /// Exact match on an optional column: `None` becomes [`Filter::Null`].
    #[must_use]
    pub fn exact(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Eq)
    }

    /// Transform the constrained value, keeping `Any` and `Null` intact.
    pub fn map<U, E>(self, convert: impl FnOnce(T) -> Result<U, E>) -> Result<Filter<U>, E> {
        Ok(match self {
            Self::Any => Filter::Any,
            Self::Null => Filter::Null,
            Self::Eq(value) => Filter::Eq(convert(value)?),
        })
    }

    /// Whether a column value satisfies the filter.
    #[must_use]
    pub fn matches(&self, candidate: Option<T>) -> bool {
        match self {
            Self::Any => true,
            Self::Null => candidate.is_none(),
            Self::Eq(expected) => candidate == Some(*expected),
        }
    }
}

/// Filter over the scoping columns of a metric value row.
///
/// # Examples
/// ```
/// use rating_core::{CityId, EntityRef, Filter, Granularity, Period, RegionId, ScopeFilter};
///
/// let regions_only = ScopeFilter::granularity(Granularity::Region);
/// assert!(regions_only.matches(EntityRef::Region(RegionId(1)), Period::NONE));
/// assert!(!regions_only.matches(EntityRef::City(CityId(1)), Period::NONE));
///
/// let city = ScopeFilter::entity(EntityRef::City(CityId(4))).with_year(Filter::Eq(2024));
/// assert!(city.matches(EntityRef::City(CityId(4)), Period::yearly(2024)));
/// assert!(!city.matches(EntityRef::City(CityId(4)), Period::NONE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeFilter {
    /// Region column.
    pub region: Filter<RegionId>,
    /// City column.
    pub city: Filter<CityId>,
    /// Location column.
    pub location: Filter<LocationId>,
    /// Month column.
    pub month: Filter<u8>,
    /// Year column.
    pub year: Filter<i32>,
}

impl ScopeFilter {
    /// Filter matching every row.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Rows describing exactly `entity`, any period.
    #[must_use]
    pub fn entity(entity: EntityRef) -> Self {
        let (region, city, location) = entity.columns();
        Self {
            region: Filter::exact(region),
            city: Filter::exact(city),
            location: Filter::exact(location),
            month: Filter::Any,
            year: Filter::Any,
        }
    }

    /// Every row of one granularity, any period.
    #[must_use]
    pub const fn granularity(granularity: Granularity) -> Self {
        let (region, city, location) = match granularity {
            Granularity::Region => (Filter::Any, Filter::Null, Filter::Null),
            Granularity::City => (Filter::Null, Filter::Any, Filter::Null),
            Granularity::Location => (Filter::Null, Filter::Null, Filter::Any),
        };
        Self {
            region,
            city,
            location,
            month: Filter::Any,
            year: Filter::Any,
        }
    }

    /// The single row identified by `key`.
    #[must_use]
    pub fn key(key: &MetricKey) -> Self {
        Self::entity(key.entity)
            .with_month(Filter::exact(key.period.month))
            .with_year(Filter::exact(key.period.year))
    }

    /// Replace the month filter.
    #[must_use]
    pub const fn with_month(mut self, month: Filter<u8>) -> Self {
        self.month = month;
        self
    }

    /// Replace the year filter.
    #[must_use]
    pub const fn with_year(mut self, year: Filter<i32>) -> Self {
        self.year = year;
        self
    }

    /// Whether a row with the given entity and period satisfies the filter.
    #[must_use]
    pub fn matches(&self, entity: EntityRef, period: Period) -> bool {
        let (region, city, location) = entity.columns();
        self.region.matches(region)
            && self.city.matches(city)
            && self.location.matches(location)
            && self.month.matches(period.month)
            && self.year.matches(period.year)
    }
}
