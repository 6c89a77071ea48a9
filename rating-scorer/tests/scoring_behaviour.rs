//! Behavioural tests for segment, complex and batch scoring using rstest-bdd.
#![expect(clippy::expect_used, reason = "behaviour steps fail loudly")]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::Utc;
use geo::Coord;
use rating_core::test_support::{FixedSentiment, FixedWeather, MemoryStore};
use rating_core::{
    Area, CityGeo, CityId, EntityRef, GeoContext, Location, LocationId, MetricKey, MetricStore,
    RegionGeo, RegionId, Segment,
};
use rating_scorer::metrics::{LOCATION_SCORE, segment_metric};
use rating_scorer::{
    BatchReport, BatchRunner, ComplexComposer, Deadline, ScoringError, SegmentAggregator,
    SegmentCatalogue, Stage,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const CITY: Area = Area::City(CityId(1));

/// Shared state for scoring scenarios.
struct ScoringWorld {
    store: MemoryStore,
    geo: GeoContext,
    weather: RefCell<FixedWeather>,
    composed: RefCell<Option<Result<f64, ScoringError>>>,
    report: RefCell<Option<BatchReport>>,
    values_before: Cell<usize>,
}

impl ScoringWorld {
    fn new() -> Self {
        let beach = |id: u64| {
            Location::new(LocationId(id), "Beach", Coord { x: 0.0, y: 0.0 })
                .with_city(CityId(1))
                .with_type("beach")
        };
        let geo = GeoContext::new(
            Coord { x: 0.0, y: 1.0 },
            BTreeMap::from([(
                RegionId(1),
                RegionGeo {
                    name: "Coast".into(),
                    capital: Some(Coord { x: 0.0, y: 0.0 }),
                },
            )]),
            BTreeMap::from([(
                CityId(1),
                CityGeo {
                    name: "Resort".into(),
                    region: Some(RegionId(1)),
                    location: Coord { x: 0.0, y: 0.0 },
                },
            )]),
        );
        Self {
            store: MemoryStore::with_locations([beach(1), beach(2)])
                .with_city(CityId(1), RegionId(1)),
            geo,
            weather: RefCell::new(FixedWeather::default()),
            composed: RefCell::new(None),
            report: RefCell::new(None),
            values_before: Cell::new(0),
        }
    }

    fn put(&self, name: &str, entity: EntityRef, value: f64) {
        let metric = self.store.metric_id(name).expect("register metric");
        self.store
            .put_value(&MetricKey::new(metric, entity), value, Utc::now())
            .expect("store value");
    }
}

#[fixture]
fn world() -> ScoringWorld {
    ScoringWorld::new()
}

#[given("city 1 has beach locations scored 3.5 and 4.5")]
fn given_beach_locations(world: &ScoringWorld) {
    world.put(LOCATION_SCORE, EntityRef::Location(LocationId(1)), 3.5);
    world.put(LOCATION_SCORE, EntityRef::Location(LocationId(2)), 4.5);
}

#[given("city 1 has a beach count of 2.5 and a hotel count of 2.0")]
fn given_counts(world: &ScoringWorld) {
    world.put("count_beach", CITY.into(), 2.5);
    world.put("count_hotel", CITY.into(), 2.0);
}

#[given("city 1 has a weather comfort of 3.0")]
fn given_weather(world: &ScoringWorld) {
    world
        .weather
        .replace(FixedWeather::default().with_score(CITY.into(), 3.0));
}

#[given("the weather source no longer knows city 1")]
fn weather_lost(world: &ScoringWorld) {
    world.weather.replace(FixedWeather::default());
}

#[when("the beach segment of city 1 is scored")]
fn score_beach(world: &ScoringWorld) {
    let catalogue = SegmentCatalogue::default();
    let weather = world.weather.borrow();
    let aggregator = SegmentAggregator::new(&world.store, &*weather, &catalogue);
    aggregator
        .collect_parts(Segment::Beach, CITY, Utc::now())
        .expect("collect beach parts");
    aggregator
        .aggregate_segment(Segment::Beach, CITY, Utc::now())
        .expect("aggregate beach segment");
}

#[when("the complex score of city 1 is composed")]
fn compose_complex(world: &ScoringWorld) {
    let result = ComplexComposer::new(&world.store).compose_complex_score(CITY, Utc::now());
    world.composed.replace(Some(result));
}

#[when("a batch run starts after its deadline")]
fn run_expired_batch(world: &ScoringWorld) {
    world.values_before.set(world.store.value_count());
    let sentiment = FixedSentiment(3.0);
    let weather = world.weather.borrow();
    let report = BatchRunner::new(&world.store, &sentiment, &*weather, &world.geo, &world.geo)
        .run(&Deadline::expired(), Utc::now());
    world.report.replace(Some(report));
}

#[then("the beach segment score of city 1 is 3.37")]
fn beach_scores_3_37(world: &ScoringWorld) {
    assert_eq!(
        world.store.value_of(&segment_metric(Segment::Beach), CITY.into()),
        Some(3.37)
    );
}

#[then("the beach segment score of city 1 is 3.07")]
fn beach_scores_3_07(world: &ScoringWorld) {
    assert_eq!(
        world.store.value_of(&segment_metric(Segment::Beach), CITY.into()),
        Some(3.07)
    );
}

#[then("no beach weather part is stored for city 1")]
fn no_weather_part(world: &ScoringWorld) {
    assert_eq!(world.store.value_of("segment_beach_w", CITY.into()), None);
}

#[then("composition fails for lack of complex_t")]
fn composition_fails(world: &ScoringWorld) {
    let composed = world.composed.borrow();
    match composed.as_ref().expect("composition attempted") {
        Err(ScoringError::MissingDependency { metric, entity }) => {
            assert_eq!(metric, "complex_t");
            assert_eq!(*entity, EntityRef::from(CITY));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(world.store.value_of("complex", CITY.into()), None);
}

#[then("the run was interrupted while scoring locations")]
fn run_interrupted(world: &ScoringWorld) {
    let borrowed = world.report.borrow();
    let report = borrowed.as_ref().expect("batch ran");
    assert_eq!(report.interrupted, Some(Stage::LocationScore));
}

#[then("the batch wrote no values")]
fn batch_wrote_nothing(world: &ScoringWorld) {
    assert_eq!(world.store.value_count(), world.values_before.get());
}

#[scenario(path = "tests/features/scoring.feature", index = 0)]
fn beach_segment_with_weather(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/scoring.feature", index = 1)]
fn beach_segment_without_weather(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/scoring.feature", index = 2)]
fn complex_requires_stored_parts(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/scoring.feature", index = 3)]
fn expired_deadline_stops_batch(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/scoring.feature", index = 4)]
fn rescoring_without_weather(world: ScoringWorld) {
    let _ = world;
}
