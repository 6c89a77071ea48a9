//! Batch driver running every scoring stage over a whole store.
//!
//! Stages run bottom-up: location scores, count percentiles, cross-area
//! complex components, then per area the segment parts, segment scores,
//! remaining complex components and the complex score. Failures are
//! recorded against the entity or type they concern and the run carries
//! on; only an expired [`Deadline`] stops it early.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rating_core::{
    Area, GeoContext, Geocoder, Granularity, LocationCatalog, MetricStore, Segment,
    SentimentAnalyser, WeatherSource,
};
use serde::{Deserialize, Serialize};

use crate::catalogue::SegmentCatalogue;
use crate::complex::{ComplexComposer, ComplexPartsBuilder, ComplexWeights};
use crate::deadline::Deadline;
use crate::location::{CountReport, LocationScorer, LocationWeights, TypeReport};
use crate::retry::RetryPolicy;
use crate::segment::{SegmentAggregator, SegmentWeights};
use crate::{ScoringError, Stage};

/// Tunables of a batch run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Location types per segment.
    pub catalogue: SegmentCatalogue,
    /// Location score weights.
    pub location_weights: LocationWeights,
    /// Segment score weights.
    pub segment_weights: SegmentWeights,
    /// Complex score weights.
    pub complex_weights: ComplexWeights,
    /// Retry policy for sentiment calls.
    pub retry: RetryPolicy,
}

/// A failure confined to one entity or location type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    /// Entity or type the failure concerns, e.g. `city 4` or `hotel`.
    pub subject: String,
    /// Stage that failed.
    pub stage: Stage,
    /// Rendered error.
    pub message: String,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.subject, self.stage, self.message)
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    /// Per-type location scoring summaries.
    pub types: Vec<TypeReport>,
    /// Per-type count percentile summaries.
    pub counts: Vec<CountReport>,
    /// Segment scores stored.
    pub segments: usize,
    /// Segments skipped because the area has no data for them.
    pub empty_segments: usize,
    /// Complex scores stored, in area order.
    pub complex: Vec<(Area, f64)>,
    /// Isolated failures.
    pub failures: Vec<EntityFailure>,
    /// Stage during which the deadline expired, if it did.
    pub interrupted: Option<Stage>,
}

impl BatchReport {
    /// Whether every stage ran to the end.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Marker for a run stopped by its deadline.
struct Interrupted;

/// Runs the scoring pipeline against one store and its collaborators.
#[derive(Debug)]
pub struct BatchRunner<'a, S: ?Sized, A: ?Sized, W: ?Sized, G: ?Sized> {
    store: &'a S,
    sentiment: &'a A,
    weather: &'a W,
    geocoder: &'a G,
    geo: &'a GeoContext,
    config: PipelineConfig,
}

impl<'a, S, A, W, G> BatchRunner<'a, S, A, W, G>
where
    S: MetricStore + LocationCatalog + ?Sized,
    A: SentimentAnalyser + ?Sized,
    W: WeatherSource + ?Sized,
    G: Geocoder + ?Sized,
{
    /// Create a runner with the default configuration.
    pub fn new(
        store: &'a S,
        sentiment: &'a A,
        weather: &'a W,
        geocoder: &'a G,
        geo: &'a GeoContext,
    ) -> Self {
        Self {
            store,
            sentiment,
            weather,
            geocoder,
            geo,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run every stage, stopping early only when `deadline` expires.
    pub fn run(&self, deadline: &Deadline, now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::default();
        if self.run_stages(&mut report, deadline, now).is_err() {
            warn!(
                "deadline expired during {}; stopping",
                report.interrupted.map_or("run", Stage::as_str)
            );
        }
        info!(
            "batch finished: {} segment scores, {} complex scores, {} failures",
            report.segments,
            report.complex.len(),
            report.failures.len()
        );
        report
    }

    fn run_stages(
        &self,
        report: &mut BatchReport,
        deadline: &Deadline,
        now: DateTime<Utc>,
    ) -> Result<(), Interrupted> {
        let catalogue = &self.config.catalogue;
        let scorer = LocationScorer::new(self.store, self.sentiment)
            .with_weights(self.config.location_weights)
            .with_retry(self.config.retry.clone());

        for type_tag in catalogue.primary_types() {
            settle(report, type_tag, Stage::LocationScore, deadline.check(Stage::LocationScore))?;
            let result = scorer.score_type(type_tag, deadline, now);
            if let Some(summary) = settle(report, type_tag, Stage::LocationScore, result)? {
                report.types.push(summary);
            }
        }

        for type_tag in catalogue.counted_types() {
            let result = scorer.count_percentiles(type_tag, self.geo, self.geocoder, deadline, now);
            if let Some(summary) = settle(report, type_tag, Stage::CountPercentile, result)? {
                report.counts.push(summary);
            }
        }

        let parts = ComplexPartsBuilder::new(self.store, catalogue, self.geo);
        for granularity in [Granularity::Region, Granularity::City] {
            let subject = format!("{granularity}s");
            settle(report, &subject, Stage::ComplexParts, deadline.check(Stage::ComplexParts))?;
            settle(report, &subject, Stage::ComplexParts, parts.flow_parts(granularity, now))?;
            settle(report, &subject, Stage::ComplexParts, parts.distance_parts(granularity, now))?;
            settle(report, &subject, Stage::ComplexParts, parts.price_parts(granularity, now))?;
        }

        let aggregator = SegmentAggregator::new(self.store, self.weather, catalogue)
            .with_weights(self.config.segment_weights);
        let composer = ComplexComposer::new(self.store).with_weights(self.config.complex_weights);
        for area in self.geo.areas() {
            settle(report, area, Stage::SegmentParts, deadline.check(Stage::SegmentParts))?;
            for segment in Segment::ALL {
                self.score_segment(report, &aggregator, segment, area, now)?;
            }
            settle(report, area, Stage::ComplexParts, parts.infrastructure_parts(area, now))?;
            settle(report, area, Stage::ComplexParts, parts.segment_mean(area, now))?;
            let result = composer.compose_complex_score(area, now);
            if let Some(score) = settle(report, area, Stage::ComplexScore, result)? {
                report.complex.push((area, score));
            }
        }
        Ok(())
    }

    fn score_segment(
        &self,
        report: &mut BatchReport,
        aggregator: &SegmentAggregator<'_, S, W>,
        segment: Segment,
        area: Area,
        now: DateTime<Utc>,
    ) -> Result<(), Interrupted> {
        let subject = format!("{area} {segment}");
        let collected = aggregator.collect_parts(segment, area, now);
        if settle(report, &subject, Stage::SegmentParts, collected)?.is_none() {
            return Ok(());
        }
        match aggregator.aggregate_segment(segment, area, now) {
            Ok(_) => report.segments += 1,
            Err(ScoringError::NoData { .. }) => report.empty_segments += 1,
            Err(err) => {
                settle::<()>(report, &subject, Stage::SegmentScore, Err(err))?;
            }
        }
        Ok(())
    }
}

/// Record the outcome of one stage for `subject`.
///
/// Non-fatal errors are logged and recorded; an expired deadline interrupts
/// the run.
fn settle<T>(
    report: &mut BatchReport,
    subject: impl fmt::Display,
    stage: Stage,
    result: Result<T, ScoringError>,
) -> Result<Option<T>, Interrupted> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => {
            report.interrupted = Some(stage);
            Err(Interrupted)
        }
        Err(err) => {
            let failure = EntityFailure {
                subject: subject.to_string(),
                stage,
                message: err.to_string(),
            };
            warn!("{failure}");
            report.failures.push(failure);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use ::geo::Coord;
    use rating_core::test_support::{FixedSentiment, FixedWeather, MemoryStore};
    use rating_core::{
        CityGeo, CityId, EntityRef, Location, LocationDetails, LocationId, MetricKey, Period,
        RegionGeo, RegionId,
    };
    use rstest::{fixture, rstest};

    use crate::metrics::{COMPLEX, COMPLEX_DISTANCE, COMPLEX_PRICE, OVERNIGHT_STAYS, TOURIST_FLOW};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, 12, 0, 0).unwrap()
    }

    fn city(region: u64, x: f64) -> CityGeo {
        CityGeo {
            name: format!("City at {x}"),
            region: Some(RegionId(region)),
            location: Coord { x, y: 0.0 },
        }
    }

    #[fixture]
    fn geo() -> GeoContext {
        GeoContext::new(
            Coord { x: 0.0, y: 10.0 },
            BTreeMap::from([(
                RegionId(1),
                RegionGeo {
                    name: "Coast".into(),
                    capital: Some(Coord { x: 0.0, y: 0.0 }),
                },
            )]),
            BTreeMap::from([(CityId(1), city(1, 0.0)), (CityId(2), city(1, 3.0))]),
        )
    }

    fn place(id: u64, tag: &str, city: u64, rating: f64, reviews: u64, price: Option<f64>) -> Location {
        Location::new(LocationId(id), format!("Place {id}"), Coord { x: 0.0, y: 0.0 })
            .with_city(CityId(city))
            .with_type(tag)
            .with_details(LocationDetails {
                rating: Some(rating),
                review_count: Some(reviews),
                price,
                ..LocationDetails::default()
            })
    }

    #[fixture]
    fn store() -> MemoryStore {
        let store = MemoryStore::with_locations([
            place(1, "hotel", 1, 4.0, 10, Some(100.0)),
            place(2, "hotel", 2, 3.0, 100, Some(200.0)),
            place(3, "beach", 1, 5.0, 50, None),
            place(4, "beach", 2, 4.0, 5, None),
        ])
        .with_city(CityId(1), RegionId(1))
        .with_city(CityId(2), RegionId(1));
        for (name, values) in [(TOURIST_FLOW, [1000.0, 4000.0]), (OVERNIGHT_STAYS, [300.0, 200.0])] {
            let metric = store.metric_id(name).expect("register metric");
            for (id, value) in [1, 2].into_iter().zip(values) {
                let key = MetricKey::new(metric, EntityRef::City(CityId(id)))
                    .with_period(Period::yearly(2023));
                store.put_value(&key, value, now()).expect("store flow");
            }
        }
        store
    }

    #[rstest]
    fn full_run_scores_every_city(store: MemoryStore, geo: GeoContext) {
        let sentiment = FixedSentiment(4.0);
        let weather = FixedWeather::default().with_score(EntityRef::City(CityId(1)), 4.5);
        let report = BatchRunner::new(&store, &sentiment, &weather, &geo, &geo)
            .with_config(PipelineConfig {
                retry: RetryPolicy::no_retry(),
                ..PipelineConfig::default()
            })
            .run(&Deadline::none(), now());

        assert!(report.is_complete());
        let cities: Vec<Area> = report.complex.iter().map(|(area, _)| *area).collect();
        assert_eq!(cities, vec![Area::City(CityId(1)), Area::City(CityId(2))]);
        for (area, score) in &report.complex {
            assert!((2.0..=5.0).contains(score));
            assert_eq!(store.value_of(COMPLEX, (*area).into()), Some(*score));
        }
        let first = EntityRef::City(CityId(1));
        assert_eq!(store.value_of(COMPLEX_DISTANCE, first), Some(5.0));
        assert_eq!(store.value_of(COMPLEX_PRICE, first), Some(5.0));
        assert!(report.segments >= 2);
    }

    fn run_at(store: &MemoryStore, geo: &GeoContext, weather: &FixedWeather, month: u32) -> BatchReport {
        let sentiment = FixedSentiment(4.0);
        BatchRunner::new(store, &sentiment, weather, geo, geo)
            .with_config(PipelineConfig {
                retry: RetryPolicy::no_retry(),
                ..PipelineConfig::default()
            })
            .run(&Deadline::none(), Utc.with_ymd_and_hms(2024, month, 10, 0, 0, 0).unwrap())
    }

    fn add_flow(store: &MemoryStore, city: u64, value: f64) {
        let metric = store.metric_id(TOURIST_FLOW).expect("register metric");
        let key = MetricKey::new(metric, EntityRef::City(CityId(city)))
            .with_period(Period::yearly(2024));
        store.put_value(&key, value, now()).expect("store flow");
    }

    #[rstest]
    fn rerun_over_changed_inputs_matches_a_clean_run(
        store: MemoryStore,
        #[from(store)] clean: MemoryStore,
        geo: GeoContext,
    ) {
        let sunny = FixedWeather::default()
            .with_score(EntityRef::City(CityId(1)), 5.0)
            .with_score(EntityRef::City(CityId(2)), 5.0);
        let march = run_at(&store, &geo, &sunny, 3);

        let unavailable = FixedWeather::default();
        add_flow(&store, 1, 9000.0);
        add_flow(&clean, 1, 9000.0);
        let april = run_at(&store, &geo, &unavailable, 4);
        let fresh = run_at(&clean, &geo, &unavailable, 4);

        assert_ne!(march.complex, april.complex);
        assert_eq!(april.complex, fresh.complex);
        for id in [1, 2] {
            let city = EntityRef::City(CityId(id));
            for name in ["segment_beach", "segment_beach_w", "complex_t", "complex_tru", COMPLEX] {
                assert_eq!(store.value_of(name, city), clean.value_of(name, city), "{name} of {city}");
            }
        }
    }

    #[rstest]
    fn incomplete_region_is_isolated(store: MemoryStore, geo: GeoContext) {
        let sentiment = FixedSentiment(4.0);
        let weather = FixedWeather::default();
        let report = BatchRunner::new(&store, &sentiment, &weather, &geo, &geo)
            .run(&Deadline::none(), now());

        let region = Area::Region(RegionId(1)).to_string();
        assert!(report.failures.iter().any(|failure| {
            failure.subject == region && failure.stage == Stage::ComplexScore
        }));
        assert_eq!(store.value_of(COMPLEX, EntityRef::Region(RegionId(1))), None);
        assert_eq!(report.complex.len(), 2);
    }

    #[rstest]
    fn expired_deadline_stops_before_writing(store: MemoryStore, geo: GeoContext) {
        let before = store.value_count();
        let sentiment = FixedSentiment(4.0);
        let weather = FixedWeather::default();
        let report = BatchRunner::new(&store, &sentiment, &weather, &geo, &geo)
            .run(&Deadline::expired(), now());

        assert_eq!(report.interrupted, Some(Stage::LocationScore));
        assert!(!report.is_complete());
        assert!(report.complex.is_empty());
        assert_eq!(store.value_count(), before);
    }
}
