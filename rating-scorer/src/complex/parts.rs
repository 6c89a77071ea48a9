//! Builders for the persisted components of the complex score.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rating_core::{
    Area, EntityRef, GeoContext, Granularity, LocationCatalog, MetricKey, MetricStore,
    MetricValue, ScopeFilter, Segment,
};

use crate::catalogue::SegmentCatalogue;
use crate::ladder::{PercentileLadder, floored, mean};
use crate::metrics::{
    COMPLEX_DISTANCE, COMPLEX_L, COMPLEX_N, COMPLEX_NIGHT, COMPLEX_O, COMPLEX_PRICE, COMPLEX_T,
    COMPLEX_TRU, OVERNIGHT_STAYS, TOURIST_FLOW, segment_metric,
};
use crate::segment::profile_parts;
use crate::ScoringError;

/// Location type carrying hotel prices.
pub const HOTEL_TYPE: &str = "hotel";
/// Location type carrying short-term rental prices.
pub const RENTAL_TYPE: &str = "rental";
/// Prices above this ceiling are treated as outliers.
pub const PRICE_CEILING: f64 = 15_000.0;

/// Computes and stores the components read by
/// [`ComplexComposer`](crate::ComplexComposer).
#[derive(Debug)]
pub struct ComplexPartsBuilder<'a, S: ?Sized> {
    store: &'a S,
    catalogue: &'a SegmentCatalogue,
    geo: &'a GeoContext,
}

impl<'a, S> ComplexPartsBuilder<'a, S>
where
    S: MetricStore + LocationCatalog + ?Sized,
{
    /// Create a builder over `store`, reading areas and capitals from `geo`.
    pub const fn new(store: &'a S, catalogue: &'a SegmentCatalogue, geo: &'a GeoContext) -> Self {
        Self {
            store,
            catalogue,
            geo,
        }
    }

    fn areas(&self, granularity: Granularity) -> Vec<Area> {
        self.geo
            .areas()
            .into_iter()
            .filter(|area| area.granularity() == granularity)
            .collect()
    }

    fn put(&self, name: &str, area: Area, value: f64, now: DateTime<Utc>) -> Result<(), ScoringError> {
        let metric = self.store.metric_id(name)?;
        self.store
            .put_value(&MetricKey::new(metric, area.into()), value, now)?;
        Ok(())
    }

    fn clear(&self, name: &str, area: Area) -> Result<(), ScoringError> {
        let metric = self.store.metric_id(name)?;
        self.store.clear_value(&MetricKey::new(metric, area.into()))?;
        Ok(())
    }

    /// Remove `name` from every area of `granularity` not in `kept`.
    fn clear_others(
        &self,
        name: &str,
        granularity: Granularity,
        kept: &[Area],
    ) -> Result<(), ScoringError> {
        for area in self.areas(granularity) {
            if !kept.contains(&area) {
                self.clear(name, area)?;
            }
        }
        Ok(())
    }

    /// Store `complex_o`, `complex_n` and `complex_l` for `area` from the
    /// general infrastructure profile. Absent terms take the floor.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::NoData`] when the area has no infrastructure
    /// data at all, after removing its earlier infrastructure rows. Returns
    /// [`ScoringError::Store`] when reading or writing fails.
    pub fn infrastructure_parts(&self, area: Area, now: DateTime<Utc>) -> Result<(), ScoringError> {
        let parts = profile_parts(self.store, self.catalogue.infrastructure(), area)?;
        if !parts.has_data() {
            for name in [COMPLEX_O, COMPLEX_N, COMPLEX_L] {
                self.clear(name, area)?;
            }
            return Err(ScoringError::NoData {
                profile: "infrastructure".to_owned(),
                entity: area.into(),
            });
        }
        self.put(COMPLEX_O, area, floored(parts.o), now)?;
        self.put(COMPLEX_N, area, floored(parts.n), now)?;
        self.put(COMPLEX_L, area, floored(parts.l), now)
    }

    /// Store `complex_t`, the mean of the area's stored segment scores.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::MissingDependency`] when no segment score is
    /// stored, after removing any earlier `complex_t`. Returns
    /// [`ScoringError::Store`] when reading or writing fails.
    pub fn segment_mean(&self, area: Area, now: DateTime<Utc>) -> Result<f64, ScoringError> {
        let entity = EntityRef::from(area);
        let mut scores = Vec::new();
        for segment in Segment::ALL {
            let metric = self.store.metric_id(&segment_metric(segment))?;
            if let Some(row) = self.store.find_value(&MetricKey::new(metric, entity))? {
                scores.push(row.value);
            }
        }
        let Some(value) = mean(scores) else {
            self.clear(COMPLEX_T, area)?;
            return Err(ScoringError::MissingDependency {
                metric: "segment_*".to_owned(),
                entity,
            });
        };
        self.put(COMPLEX_T, area, value, now)?;
        Ok(value)
    }

    /// Store `complex_tru` and `complex_night` for every area of
    /// `granularity` with flow data, ranking annual totals.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InsufficientData`] when either sample is
    /// degenerate and [`ScoringError::Store`] when reading or writing fails.
    pub fn flow_parts(&self, granularity: Granularity, now: DateTime<Utc>) -> Result<usize, ScoringError> {
        let mut stored = 0;
        for (source, target) in [(TOURIST_FLOW, COMPLEX_TRU), (OVERNIGHT_STAYS, COMPLEX_NIGHT)] {
            let metric = self.store.metric_id(source)?;
            let mut totals = Vec::new();
            for area in self.areas(granularity) {
                let rows = self
                    .store
                    .get_values(metric, &ScopeFilter::entity(area.into()))?;
                if let Some(total) = annual_total(&rows) {
                    totals.push((area, total));
                }
            }
            stored += self.rank_and_store(target, granularity, &totals, Direction::Higher, now)?;
        }
        Ok(stored)
    }

    /// Store `complex_distance` for every area of `granularity` whose
    /// distance to its capital is known.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InsufficientData`] when distances do not vary
    /// and [`ScoringError::Store`] when writing fails.
    pub fn distance_parts(
        &self,
        granularity: Granularity,
        now: DateTime<Utc>,
    ) -> Result<usize, ScoringError> {
        let distances: Vec<(Area, f64)> = self
            .areas(granularity)
            .into_iter()
            .filter_map(|area| self.geo.distance_to_capital(area).map(|d| (area, d)))
            .collect();
        self.rank_and_store(COMPLEX_DISTANCE, granularity, &distances, Direction::Lower, now)
    }

    /// Store `complex_price` for every area of `granularity` with hotel or
    /// rental prices. Hotel and rental means are ranked separately and the
    /// available scores averaged.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InsufficientData`] when neither price sample
    /// supports a ladder and [`ScoringError::Store`] when reading or writing
    /// fails.
    pub fn price_parts(&self, granularity: Granularity, now: DateTime<Utc>) -> Result<usize, ScoringError> {
        let areas = self.areas(granularity);
        let mut kinds = Vec::new();
        let mut failure = None;
        for type_tag in [HOTEL_TYPE, RENTAL_TYPE] {
            let mut means = BTreeMap::new();
            for area in &areas {
                let locations = self
                    .store
                    .locations_by_type(type_tag, area.region(), area.city())?;
                let prices = locations
                    .iter()
                    .filter_map(|location| location.details.price)
                    .filter(|price| *price > 0.0 && *price <= PRICE_CEILING);
                if let Some(price) = mean(prices) {
                    means.insert(*area, price);
                }
            }
            match PercentileLadder::build(means.values().copied()) {
                Ok(ladder) => kinds.push((ladder, means)),
                Err(source) => {
                    if !means.is_empty() {
                        warn!("{type_tag} prices for {granularity}s cannot be ranked: {source}");
                    }
                    failure = Some(ScoringError::insufficient(
                        format!("{type_tag} prices"),
                        source,
                    ));
                }
            }
        }
        if let (true, Some(err)) = (kinds.is_empty(), failure) {
            self.clear_others(COMPLEX_PRICE, granularity, &[])?;
            return Err(err);
        }

        let mut stored = 0;
        for area in areas {
            let scores = kinds.iter().filter_map(|(ladder, means)| {
                means.get(&area).map(|price| ladder.score_inverted(*price))
            });
            if let Some(score) = mean(scores) {
                self.put(COMPLEX_PRICE, area, score, now)?;
                stored += 1;
            } else {
                self.clear(COMPLEX_PRICE, area)?;
            }
        }
        info!("{COMPLEX_PRICE}: {stored} {granularity}s");
        Ok(stored)
    }

    /// Rank `samples` into `target`; areas of `granularity` outside the
    /// sample lose their earlier `target` row.
    fn rank_and_store(
        &self,
        target: &str,
        granularity: Granularity,
        samples: &[(Area, f64)],
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Result<usize, ScoringError> {
        let ladder = match PercentileLadder::build(samples.iter().map(|(_, value)| *value)) {
            Ok(ladder) => ladder,
            Err(source) => {
                self.clear_others(target, granularity, &[])?;
                return Err(ScoringError::insufficient(target, source));
            }
        };
        let ranked: Vec<Area> = samples.iter().map(|(area, _)| *area).collect();
        self.clear_others(target, granularity, &ranked)?;
        for (area, value) in samples {
            let score = match direction {
                Direction::Higher => ladder.score(*value),
                Direction::Lower => ladder.score_inverted(*value),
            };
            self.put(target, *area, score, now)?;
        }
        info!("{target}: {} areas", samples.len());
        Ok(samples.len())
    }
}

/// Whether larger raw values rank better.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Higher,
    Lower,
}

/// Total for the latest year present, or the sum of period-less rows when
/// no row carries a year.
#[expect(clippy::float_arithmetic, reason = "summing raw counts")]
fn annual_total(rows: &[MetricValue]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let latest = rows.iter().filter_map(|row| row.period.year).max();
    Some(
        rows.iter()
            .filter(|row| row.period.year == latest)
            .map(|row| row.value)
            .sum(),
    )
}
