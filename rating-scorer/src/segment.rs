//! Segment scores per region and city.
//!
//! A segment score blends four sub-terms:
//! - `o`: mean `location_score` of the area's primary-type locations;
//! - `n`: mean `count_<type>` of the area over primary types;
//! - `l`: mean `count_<type>` of the area over secondary types;
//! - `w`: weather comfort, ignored by segments that do not use weather.
//!
//! [`SegmentAggregator::collect_parts`] persists the sub-terms as
//! `segment_<name>_<o|n|l|w>`; [`SegmentAggregator::aggregate_segment`]
//! reads them back, combines and stores `segment_<name>`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rating_core::{
    Area, EntityRef, LocationCatalog, LocationId, MetricKey, MetricStore, Segment, WeatherSource,
};
use serde::{Deserialize, Serialize};

use crate::catalogue::{SegmentCatalogue, TypeProfile};
use crate::ladder::{floored, mean, publish};
use crate::metrics::{LOCATION_SCORE, Part, count_metric, segment_metric, segment_part_metric};
use crate::ScoringError;

/// Weights of the segment sub-terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentWeights {
    /// Weight of `o` when weather applies.
    pub locations: f64,
    /// Weight of `w`.
    pub weather: f64,
    /// Weight of the blended counts when weather applies.
    pub counts: f64,
    /// Weight of `o` when weather does not apply.
    pub locations_without_weather: f64,
    /// Weight of the blended counts when weather does not apply.
    pub counts_without_weather: f64,
    /// Share of `n` within the blended counts.
    pub primary_counts: f64,
    /// Share of `l` within the blended counts.
    pub secondary_counts: f64,
}

impl Default for SegmentWeights {
    fn default() -> Self {
        Self {
            locations: 0.5,
            weather: 0.3,
            counts: 0.2,
            locations_without_weather: 0.65,
            counts_without_weather: 0.35,
            primary_counts: 0.7,
            secondary_counts: 0.3,
        }
    }
}

/// Sub-terms of one segment score; `None` means no data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentParts {
    /// Mean score of primary locations.
    pub o: Option<f64>,
    /// Mean count percentile of primary types.
    pub n: Option<f64>,
    /// Mean count percentile of secondary types.
    pub l: Option<f64>,
    /// Weather comfort.
    pub w: Option<f64>,
}

impl SegmentParts {
    /// Whether any location-derived sub-term has data.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.o.is_some() || self.n.is_some() || self.l.is_some()
    }

    /// Combine the floored sub-terms; `None` when [`Self::has_data`] is
    /// false. The result is not yet published.
    ///
    /// # Examples
    /// ```
    /// use rating_scorer::{SegmentParts, SegmentWeights};
    ///
    /// let parts = SegmentParts { o: Some(4.0), n: Some(2.5), l: Some(2.0), w: Some(3.0) };
    /// let score = parts.combine(true, &SegmentWeights::default()).unwrap();
    /// assert!((score - 3.37).abs() < 1e-9);
    /// ```
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "weighted sum of sub-terms")]
    pub fn combine(&self, uses_weather: bool, weights: &SegmentWeights) -> Option<f64> {
        if !self.has_data() {
            return None;
        }
        let counts = weights.primary_counts * floored(self.n)
            + weights.secondary_counts * floored(self.l);
        let o = floored(self.o);
        Some(if uses_weather {
            weights.locations * o + weights.weather * floored(self.w) + weights.counts * counts
        } else {
            weights.locations_without_weather * o + weights.counts_without_weather * counts
        })
    }
}

/// Location-derived sub-terms of a type profile within an area.
pub(crate) fn profile_parts<S>(
    store: &S,
    profile: &TypeProfile,
    area: Area,
) -> Result<SegmentParts, ScoringError>
where
    S: MetricStore + LocationCatalog + ?Sized,
{
    let entity = EntityRef::from(area);

    let score_metric = store.metric_id(LOCATION_SCORE)?;
    let mut seen: BTreeSet<LocationId> = BTreeSet::new();
    let mut scores = Vec::new();
    for type_tag in &profile.primary {
        for location in store.locations_by_type(type_tag, area.region(), area.city())? {
            if !seen.insert(location.id) {
                continue;
            }
            let key = MetricKey::new(score_metric, EntityRef::Location(location.id));
            if let Some(row) = store.find_value(&key)? {
                scores.push(row.value);
            }
        }
    }

    let count_mean = |types: &[String]| -> Result<Option<f64>, ScoringError> {
        let mut values = Vec::new();
        for type_tag in types {
            let metric = store.metric_id(&count_metric(type_tag))?;
            if let Some(row) = store.find_value(&MetricKey::new(metric, entity))? {
                values.push(row.value);
            }
        }
        Ok(mean(values))
    };

    Ok(SegmentParts {
        o: mean(scores),
        n: count_mean(profile.primary.as_slice())?,
        l: count_mean(profile.secondary.as_slice())?,
        w: None,
    })
}

/// Computes and stores segment scores.
#[derive(Debug)]
pub struct SegmentAggregator<'a, S: ?Sized, W: ?Sized> {
    store: &'a S,
    weather: &'a W,
    catalogue: &'a SegmentCatalogue,
    weights: SegmentWeights,
}

impl<'a, S, W> SegmentAggregator<'a, S, W>
where
    S: MetricStore + LocationCatalog + ?Sized,
    W: WeatherSource + ?Sized,
{
    /// Create an aggregator with default weights.
    pub fn new(store: &'a S, weather: &'a W, catalogue: &'a SegmentCatalogue) -> Self {
        Self {
            store,
            weather,
            catalogue,
            weights: SegmentWeights::default(),
        }
    }

    /// Replace the sub-term weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: SegmentWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Compute the sub-terms of `segment` for `area` and persist them.
    ///
    /// Absent sub-terms have their stored rows removed, so the stored parts
    /// always describe this run. A weather failure leaves `w` absent and is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Store`] when reading or writing fails.
    pub fn collect_parts(
        &self,
        segment: Segment,
        area: Area,
        now: DateTime<Utc>,
    ) -> Result<SegmentParts, ScoringError> {
        let entity = EntityRef::from(area);
        let mut parts = profile_parts(self.store, self.catalogue.profile(segment), area)?;
        if segment.uses_weather() {
            parts.w = match self.weather.comfort_score(entity) {
                Ok(score) => Some(score),
                Err(err) => {
                    warn!("weather for {entity} ({segment}) unavailable: {err}");
                    None
                }
            };
        }

        for (part, term) in [
            (Part::Locations, parts.o),
            (Part::PrimaryCounts, parts.n),
            (Part::SecondaryCounts, parts.l),
            (Part::Weather, parts.w),
        ] {
            let metric = self.store.metric_id(&segment_part_metric(segment, part))?;
            let key = MetricKey::new(metric, entity);
            match term {
                Some(value) => {
                    self.store.put_value(&key, value, now)?;
                }
                None => {
                    self.store.clear_value(&key)?;
                }
            }
        }
        debug!("{segment} parts for {entity}: {parts:?}");
        Ok(parts)
    }

    /// Read the persisted sub-terms of `segment` for `area`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Store`] when reading fails.
    pub fn stored_parts(&self, segment: Segment, area: Area) -> Result<SegmentParts, ScoringError> {
        let entity = EntityRef::from(area);
        let read = |part: Part| -> Result<Option<f64>, ScoringError> {
            let metric = self.store.metric_id(&segment_part_metric(segment, part))?;
            Ok(self
                .store
                .find_value(&MetricKey::new(metric, entity))?
                .map(|row| row.value))
        };
        Ok(SegmentParts {
            o: read(Part::Locations)?,
            n: read(Part::PrimaryCounts)?,
            l: read(Part::SecondaryCounts)?,
            w: if segment.uses_weather() {
                read(Part::Weather)?
            } else {
                None
            },
        })
    }

    /// Combine the persisted sub-terms into `segment_<name>` for `area`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::NoData`] when none of `o`, `n` and `l` is
    /// stored; any earlier `segment_<name>` row of the area is removed first.
    /// Returns [`ScoringError::Store`] when reading or writing fails.
    pub fn aggregate_segment(
        &self,
        segment: Segment,
        area: Area,
        now: DateTime<Utc>,
    ) -> Result<f64, ScoringError> {
        let entity = EntityRef::from(area);
        let parts = self.stored_parts(segment, area)?;
        let metric = self.store.metric_id(&segment_metric(segment))?;
        let key = MetricKey::new(metric, entity);
        let Some(raw) = parts.combine(segment.uses_weather(), &self.weights) else {
            self.store.clear_value(&key)?;
            return Err(ScoringError::NoData {
                profile: segment.to_string(),
                entity,
            });
        };
        let value = publish(raw);
        self.store.put_value(&key, value, now)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo::Coord;
    use rating_core::test_support::{FixedWeather, MemoryStore};
    use rating_core::{CityId, Location, RegionId};
    use rstest::{fixture, rstest};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    const CITY: Area = Area::City(CityId(1));

    fn put(store: &MemoryStore, name: &str, entity: EntityRef, value: f64) {
        let metric = store.metric_id(name).expect("register metric");
        store
            .put_value(&MetricKey::new(metric, entity), value, now())
            .expect("store value");
    }

    fn located(id: u64, tag: &str) -> Location {
        Location::new(LocationId(id), "Spot", Coord { x: 0.0, y: 0.0 })
            .with_city(CityId(1))
            .with_type(tag)
    }

    fn at_month(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, 10, 0, 0, 0).unwrap()
    }

    /// Beach and sports data for city 1.
    #[fixture]
    fn store() -> MemoryStore {
        seeded()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::with_locations([
            located(1, "beach"),
            located(2, "beach"),
            located(3, "stadium"),
        ])
        .with_city(CityId(1), RegionId(1));
        put(&store, LOCATION_SCORE, EntityRef::Location(LocationId(1)), 3.5);
        put(&store, LOCATION_SCORE, EntityRef::Location(LocationId(2)), 4.5);
        put(&store, LOCATION_SCORE, EntityRef::Location(LocationId(3)), 4.0);
        put(&store, "count_beach", CITY.into(), 2.5);
        put(&store, "count_hotel", CITY.into(), 2.0);
        put(&store, "count_stadium", CITY.into(), 4.0);
        store
    }

    #[rstest]
    fn documented_example_combines_to_3_37() {
        let parts = SegmentParts {
            o: Some(4.0),
            n: Some(2.5),
            l: Some(2.0),
            w: Some(3.0),
        };
        let raw = parts
            .combine(true, &SegmentWeights::default())
            .expect("has data");
        assert_eq!(publish(raw), 3.37);
    }

    #[rstest]
    #[expect(clippy::float_arithmetic, reason = "tolerance check on a raw score")]
    fn low_and_absent_terms_take_the_floor() {
        let parts = SegmentParts {
            o: Some(0.4),
            n: None,
            l: Some(1.0),
            w: None,
        };
        let raw = parts
            .combine(true, &SegmentWeights::default())
            .expect("has data");
        assert!((raw - 2.0).abs() < 1e-9);
    }

    #[rstest]
    fn weather_alone_is_not_data() {
        let parts = SegmentParts {
            w: Some(5.0),
            ..SegmentParts::default()
        };
        assert_eq!(parts.combine(true, &SegmentWeights::default()), None);
    }

    #[rstest]
    fn collects_parts_for_a_city(store: MemoryStore) {
        let weather = FixedWeather::default().with_score(CITY.into(), 4.0);
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);

        let parts = aggregator
            .collect_parts(Segment::Beach, CITY, now())
            .expect("collect beach parts");

        assert_eq!(
            parts,
            SegmentParts {
                o: Some(4.0),
                n: Some(2.5),
                l: Some(2.0),
                w: Some(4.0),
            }
        );
        assert_eq!(store.value_of("segment_beach_o", CITY.into()), Some(4.0));
        assert_eq!(store.value_of("segment_beach_w", CITY.into()), Some(4.0));
    }

    #[rstest]
    fn weather_failure_leaves_the_term_absent(store: MemoryStore) {
        let weather = FixedWeather::default();
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);
        let parts = aggregator
            .collect_parts(Segment::Beach, CITY, now())
            .expect("collect beach parts");
        assert_eq!(parts.w, None);
        assert_eq!(store.value_of("segment_beach_w", CITY.into()), None);
    }

    #[rstest]
    #[case(1.0)]
    #[case(5.0)]
    fn sports_ignores_weather(store: MemoryStore, #[case] comfort: f64) {
        let weather = FixedWeather::default().with_score(CITY.into(), comfort);
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);
        aggregator
            .collect_parts(Segment::Sports, CITY, now())
            .expect("collect sports parts");
        let score = aggregator
            .aggregate_segment(Segment::Sports, CITY, now())
            .expect("aggregate sports");
        // 0.65*4 + 0.35*(0.7*4 + 0.3*2)
        assert_eq!(score, 3.79);
    }

    #[rstest]
    fn other_segments_follow_weather(store: MemoryStore) {
        let catalogue = SegmentCatalogue::default();
        let score_with = |comfort: f64| {
            let weather = FixedWeather::default().with_score(CITY.into(), comfort);
            let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);
            aggregator
                .collect_parts(Segment::Beach, CITY, now())
                .expect("collect beach parts");
            aggregator
                .aggregate_segment(Segment::Beach, CITY, now())
                .expect("aggregate beach")
        };
        assert_ne!(score_with(2.0), score_with(5.0));
    }

    #[rstest]
    fn empty_areas_have_no_data(store: MemoryStore) {
        let weather = FixedWeather::default().with_score(Area::City(CityId(9)).into(), 5.0);
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);
        let empty = Area::City(CityId(9));
        aggregator
            .collect_parts(Segment::Eco, empty, now())
            .expect("collect eco parts");
        let err = aggregator
            .aggregate_segment(Segment::Eco, empty, now())
            .expect_err("no eco data");
        assert!(matches!(err, ScoringError::NoData { .. }));
    }

    fn beach_score(store: &MemoryStore, weather: &FixedWeather, at: DateTime<Utc>) -> f64 {
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(store, weather, &catalogue);
        aggregator
            .collect_parts(Segment::Beach, CITY, at)
            .expect("collect beach parts");
        aggregator
            .aggregate_segment(Segment::Beach, CITY, at)
            .expect("aggregate beach")
    }

    #[rstest]
    fn earlier_weather_does_not_outlive_a_failed_lookup(store: MemoryStore) {
        let sunny = FixedWeather::default().with_score(CITY.into(), 5.0);
        let march = beach_score(&store, &sunny, at_month(3));
        assert_eq!(store.value_of("segment_beach_w", CITY.into()), Some(5.0));

        let unavailable = FixedWeather::default();
        let april = beach_score(&store, &unavailable, at_month(4));
        let clean = beach_score(&seeded(), &unavailable, at_month(4));

        assert_ne!(march, april);
        assert_eq!(april, clean);
        assert_eq!(april, 3.07);
        assert_eq!(store.value_of("segment_beach_w", CITY.into()), None);
    }

    #[rstest]
    fn no_data_removes_the_earlier_segment_score(store: MemoryStore) {
        let empty = Area::City(CityId(9));
        put(&store, "segment_eco", empty.into(), 4.5);
        put(&store, "segment_eco_o", empty.into(), 4.5);
        let weather = FixedWeather::default();
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);

        aggregator
            .collect_parts(Segment::Eco, empty, now())
            .expect("collect eco parts");
        let err = aggregator
            .aggregate_segment(Segment::Eco, empty, now())
            .expect_err("no eco data");

        assert!(matches!(err, ScoringError::NoData { .. }));
        assert_eq!(store.value_of("segment_eco_o", empty.into()), None);
        assert_eq!(store.value_of("segment_eco", empty.into()), None);
    }

    #[rstest]
    fn region_parts_include_city_locations(store: MemoryStore) {
        let weather = FixedWeather::default();
        let catalogue = SegmentCatalogue::default();
        let aggregator = SegmentAggregator::new(&store, &weather, &catalogue);
        let parts = aggregator
            .collect_parts(Segment::Beach, Area::Region(RegionId(1)), now())
            .expect("collect region parts");
        assert_eq!(parts.o, Some(4.0));
        assert_eq!(parts.n, None);
    }
}
