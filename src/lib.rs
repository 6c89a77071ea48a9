//! Facade crate for the tourism rating engine.
//!
//! Re-exports the domain model and metric store from `rating-core` and the
//! scoring pipeline from `rating-scorer`. The SQLite store sits behind the
//! `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use rating_core::{
    Area, CityGeo, CityId, CollaboratorError, EntityRef, GeoContext, Geocoder, Granularity,
    Location, LocationCatalog, LocationDetails, LocationId, MetricKey, MetricStore, MetricValue,
    Period, RegionGeo, RegionId, ScopeFilter, Segment, SentimentAnalyser, StoreError,
    WeatherSource,
};

#[cfg(feature = "store-sqlite")]
pub use rating_core::{CityRecord, RegionRecord, SCHEMA_VERSION, SqliteStore};

pub use rating_scorer::{
    BatchReport, BatchRunner, ComplexComposer, Deadline, LocationScorer, PercentileLadder,
    PipelineConfig, RetryPolicy, ScoringError, SegmentAggregator, Stage, StoredWeather, metrics,
};
