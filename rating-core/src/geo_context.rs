//! Immutable geospatial reference data shared by scoring components.
//!
//! The context is loaded once per run and passed explicitly. It knows the
//! national capital, each region's capital and every city's position, which
//! is enough to enumerate scoring areas, measure distance to a capital, and
//! resolve loose coordinates to the nearest city.

use std::collections::BTreeMap;

use geo::Coord;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::{Area, CityId, CollaboratorError, Geocoder, Placement, RegionId};

/// Reference data for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeo {
    /// Display name.
    pub name: String,
    /// Position of the region's capital city, when known.
    pub capital: Option<Coord<f64>>,
}

/// Reference data for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityGeo {
    /// Display name.
    pub name: String,
    /// Region the city belongs to.
    pub region: Option<RegionId>,
    /// City centre.
    pub location: Coord<f64>,
}

#[derive(Debug, Clone)]
struct IndexedCity {
    id: CityId,
    location: Coord<f64>,
}

impl RTreeObject for IndexedCity {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.x, self.location.y])
    }
}

impl PointDistance for IndexedCity {
    #[expect(clippy::float_arithmetic, reason = "squared distance in degree space")]
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let [x, y] = *point;
        let dx = self.location.x - x;
        let dy = self.location.y - y;
        dx * dx + dy * dy
    }
}

/// Regions, cities and capitals known to a scoring run.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use geo::Coord;
/// use rating_core::{Area, CityGeo, CityId, GeoContext, RegionGeo, RegionId};
///
/// let regions = BTreeMap::from([(
///     RegionId(1),
///     RegionGeo { name: "Coast".into(), capital: Some(Coord { x: 3.0, y: 4.0 }) },
/// )]);
/// let cities = BTreeMap::from([(
///     CityId(10),
///     CityGeo { name: "Port".into(), region: Some(RegionId(1)), location: Coord { x: 3.0, y: 7.0 } },
/// )]);
/// let context = GeoContext::new(Coord { x: 0.0, y: 0.0 }, regions, cities);
///
/// assert_eq!(context.distance_to_capital(Area::Region(RegionId(1))), Some(5.0));
/// assert_eq!(context.distance_to_capital(Area::City(CityId(10))), Some(3.0));
/// ```
#[derive(Debug)]
pub struct GeoContext {
    national_capital: Coord<f64>,
    regions: BTreeMap<RegionId, RegionGeo>,
    cities: BTreeMap<CityId, CityGeo>,
    index: RTree<IndexedCity>,
}

impl GeoContext {
    /// Build a context and index city positions for nearest-city lookups.
    #[must_use]
    pub fn new(
        national_capital: Coord<f64>,
        regions: BTreeMap<RegionId, RegionGeo>,
        cities: BTreeMap<CityId, CityGeo>,
    ) -> Self {
        let entries = cities
            .iter()
            .map(|(id, city)| IndexedCity {
                id: *id,
                location: city.location,
            })
            .collect();
        Self {
            national_capital,
            regions,
            cities,
            index: RTree::bulk_load(entries),
        }
    }

    /// Position of the national capital.
    #[must_use]
    pub const fn national_capital(&self) -> Coord<f64> {
        self.national_capital
    }

    /// Identifiers of all known regions, ascending.
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    /// Identifiers of all known cities, ascending.
    pub fn cities(&self) -> impl Iterator<Item = CityId> + '_ {
        self.cities.keys().copied()
    }

    /// Every scoring area: regions first, then cities.
    #[must_use]
    pub fn areas(&self) -> Vec<Area> {
        self.regions()
            .map(Area::Region)
            .chain(self.cities().map(Area::City))
            .collect()
    }

    /// Reference data for a region.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&RegionGeo> {
        self.regions.get(&id)
    }

    /// Reference data for a city.
    #[must_use]
    pub fn city(&self, id: CityId) -> Option<&CityGeo> {
        self.cities.get(&id)
    }

    /// Euclidean distance, in degrees, from an area to its capital.
    ///
    /// A city is measured against its region's capital and a region's
    /// capital against the national capital. Returns `None` when either
    /// end of the measurement is unknown.
    #[must_use]
    pub fn distance_to_capital(&self, area: Area) -> Option<f64> {
        match area {
            Area::Region(id) => {
                let capital = self.region(id)?.capital?;
                Some(degree_distance(capital, self.national_capital))
            }
            Area::City(id) => {
                let city = self.city(id)?;
                let capital = self.region(city.region?)?.capital?;
                Some(degree_distance(city.location, capital))
            }
        }
    }

    /// Nearest known city to `location`, or `None` when no city is known.
    #[must_use]
    pub fn nearest_city(&self, location: Coord<f64>) -> Option<CityId> {
        self.index
            .nearest_neighbor(&[location.x, location.y])
            .map(|city| city.id)
    }
}

impl Geocoder for GeoContext {
    fn resolve(&self, location: Coord<f64>) -> Result<Option<Placement>, CollaboratorError> {
        Ok(self.nearest_city(location).map(|city| Placement {
            city: Some(city),
            region: self.city(city).and_then(|geo| geo.region),
        }))
    }
}

/// Euclidean distance between two coordinates in degree space.
#[must_use]
pub fn degree_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let delta = a - b;
    delta.x.hypot(delta.y)
}
