//! Behaviour-driven step definitions driving the init and score commands.

use super::*;
use camino::Utf8PathBuf;
use geo::Coord;
use rating_core::{
    CityId, CityRecord, EntityRef, Location, LocationDetails, LocationId, MetricKey,
    MetricStore, Period, RegionId, RegionRecord, SCHEMA_VERSION, SqliteStore,
};
use rating_scorer::metrics::{COMPLEX, OVERNIGHT_STAYS, TOURIST_FLOW};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Debug)]
struct CommandWorld {
    _tmp: TempDir,
    database: Utf8PathBuf,
    capital_lat: RefCell<String>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl CommandWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _tmp: tmp,
            database: root.join("data/rating.db"),
            capital_lat: RefCell::new("10".to_owned()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn run(&self, argv: Vec<String>) {
        let parsed = Cli::try_parse_from(argv).map_err(CliError::from);
        let outcome = parsed.and_then(|cli| {
            let mut buffer = self.stdout.borrow_mut();
            dispatch(cli.command, &mut *buffer)
        });
        self.result.replace(Some(outcome));
    }

    fn stdout(&self) -> String {
        String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8")
    }

    fn error(&self) -> String {
        let borrowed = self.result.borrow();
        match borrowed.as_ref().expect("result recorded") {
            Ok(()) => panic!("expected the command to fail"),
            Err(err) => format!("{err:?}"),
        }
    }
}

#[fixture]
fn world() -> CommandWorld {
    CommandWorld::new()
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

fn seed(store: &SqliteStore) {
    store
        .insert_region(&RegionRecord {
            id: RegionId(1),
            name: "Coast".into(),
        })
        .expect("insert region");
    for (id, x) in [(1, 0.0), (2, 3.0)] {
        store
            .insert_city(&CityRecord {
                id: CityId(id),
                region: Some(RegionId(1)),
                name: format!("City {id}"),
                location: Coord { x, y: 0.0 },
                is_region_capital: id == 1,
            })
            .expect("insert city");
    }
    for location in [
        place(1, "hotel", 1, 4.0, 10, Some(100.0)),
        place(2, "hotel", 2, 3.0, 100, Some(200.0)),
        place(3, "beach", 1, 5.0, 50, None),
        place(4, "beach", 2, 4.0, 5, None),
    ] {
        store.insert_location(&location).expect("insert location");
    }
    let at = chrono::Utc::now();
    for (name, values) in [(TOURIST_FLOW, [1000.0, 4000.0]), (OVERNIGHT_STAYS, [300.0, 200.0])] {
        let metric = store.metric_id(name).expect("register metric");
        for (id, value) in [1, 2].into_iter().zip(values) {
            let key = MetricKey::new(metric, EntityRef::City(CityId(id)))
                .with_period(Period::yearly(2023));
            store.put_value(&key, value, at).expect("store flow");
        }
    }
}

#[given("a database path inside a missing directory")]
fn database_in_missing_directory(#[from(world)] world: &CommandWorld) {
    assert!(!world.database.as_std_path().exists());
}

#[given("a seeded rating database")]
fn seeded_database(#[from(world)] world: &CommandWorld) {
    let parent = world.database.parent().expect("database parent");
    std::fs::create_dir_all(parent).expect("create data directory");
    let store = SqliteStore::open(world.database.as_std_path()).expect("open store");
    seed(&store);
}

#[given("the capital latitude is 95")]
fn capital_latitude_out_of_range(#[from(world)] world: &CommandWorld) {
    world.capital_lat.replace("95".to_owned());
}

#[when("I run the init command")]
fn run_init_command(#[from(world)] world: &CommandWorld) {
    world.run(vec![
        "rating".to_owned(),
        "init".to_owned(),
        format!("--{ARG_DATABASE}"),
        world.database.to_string(),
    ]);
}

#[when("I run the score command")]
fn run_score_command(#[from(world)] world: &CommandWorld) {
    world.run(vec![
        "rating".to_owned(),
        "score".to_owned(),
        format!("--{ARG_DATABASE}"),
        world.database.to_string(),
        format!("--{ARG_CAPITAL_LON}"),
        "0".to_owned(),
        format!("--{ARG_CAPITAL_LAT}"),
        world.capital_lat.borrow().clone(),
        format!("--{ARG_RETRY_ATTEMPTS}"),
        "1".to_owned(),
    ]);
}

#[then("the command reports the schema version")]
fn reports_schema_version(#[from(world)] world: &CommandWorld) {
    let borrowed = world.result.borrow();
    borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect("expected success");
    let stdout = world.stdout();
    assert!(stdout.contains(world.database.as_str()));
    assert!(stdout.contains(&format!("schema version {SCHEMA_VERSION}")));
}

#[then("the database file exists")]
fn database_file_exists(#[from(world)] world: &CommandWorld) {
    assert!(world.database.as_std_path().is_file());
}

#[then("the summary lists complex scores for both cities")]
fn summary_lists_cities(#[from(world)] world: &CommandWorld) {
    let borrowed = world.result.borrow();
    borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect("expected success");
    let summary: serde_json::Value =
        serde_json::from_str(&world.stdout()).expect("output should be JSON");
    let complex = summary["complex"].as_array().expect("complex array");
    let areas: Vec<&str> = complex
        .iter()
        .map(|entry| entry["area"].as_str().expect("area name"))
        .collect();
    assert_eq!(areas, vec!["city 1", "city 2"]);
    for entry in complex {
        let score = entry["score"].as_f64().expect("numeric score");
        assert!((2.0..=5.0).contains(&score));
    }
    assert_eq!(summary["interrupted"], serde_json::Value::Null);
}

#[then("the complex scores are stored in the database")]
fn complex_scores_stored(#[from(world)] world: &CommandWorld) {
    let store = SqliteStore::open(world.database.as_std_path()).expect("reopen store");
    let metric = store.metric_id(COMPLEX).expect("complex metric");
    for id in [1, 2] {
        let key = MetricKey::new(metric, EntityRef::City(CityId(id)));
        let stored = store.find_value(&key).expect("read complex score");
        assert!(stored.is_some(), "city {id} should have a complex score");
    }
}

#[then("the command fails because the database is missing")]
fn fails_on_missing_database(#[from(world)] world: &CommandWorld) {
    let borrowed = world.result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingSourceFile { field, .. } => assert_eq!(*field, ARG_DATABASE),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

#[then("the command fails because the capital latitude is invalid")]
fn fails_on_invalid_latitude(#[from(world)] world: &CommandWorld) {
    let message = world.error();
    assert!(message.contains("InvalidArgument"), "unexpected error {message}");
    assert!(message.contains(ARG_CAPITAL_LAT), "unexpected error {message}");
}

macro_rules! register_command_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/score_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CommandWorld) {
            let _ = world;
        }
    };
}

register_command_scenario!(init_creates_database, "initialising a database");
register_command_scenario!(score_seeded_database, "scoring a seeded database");
register_command_scenario!(score_missing_database, "rejecting a missing database");
register_command_scenario!(score_invalid_capital, "rejecting an out of range capital");
