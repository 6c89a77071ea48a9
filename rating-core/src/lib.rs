//! Core domain types and data access for the tourism rating engine.
//!
//! The crate models the entities that carry ratings (regions, cities and
//! points of interest), the metric values computed for them, and the narrow
//! interfaces through which the scoring engine reads and writes data:
//! - [`MetricStore`] persists `(metric, entity, period) → value` rows;
//! - [`LocationCatalog`] lists scraped points of interest by type;
//! - [`SentimentAnalyser`], [`WeatherSource`] and [`Geocoder`] wrap the
//!   external collaborators.
//!
//! [`SqliteStore`] implements both store traits on top of `rusqlite` when the
//! `store-sqlite` feature is enabled (the default). [`GeoContext`] holds the
//! immutable geospatial reference data for a run.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use rating_core::{EntityRef, MetricKey, MetricStore, RegionId, SqliteStore};
//!
//! # fn main() -> Result<(), rating_core::StoreError> {
//! let store = SqliteStore::open_in_memory()?;
//! let complex = store.metric_id("complex")?;
//! let key = MetricKey::new(complex, EntityRef::Region(RegionId(1)));
//! store.put_value(&key, 3.42, Utc::now())?;
//! assert_eq!(store.find_value(&key)?.map(|row| row.value), Some(3.42));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod collaborator;
mod entity;
mod filter;
mod geo_context;
mod location;
mod metric;
mod segment;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use collaborator::{
    CollaboratorError, Geocoder, Placement, SentimentAnalyser, WeatherSource,
};
pub use entity::{Area, CityId, EntityRef, Granularity, LocationId, MetricId, MetricValueId, RegionId};
pub use filter::{Filter, ScopeFilter};
pub use geo_context::{CityGeo, GeoContext, RegionGeo, degree_distance};
pub use location::{Extras, Location, LocationDetails, TypeTags};
pub use metric::{Metric, MetricKey, MetricValue, Period};
pub use segment::Segment;
pub use store::{LocationCatalog, MetricStore, StoreError};
#[cfg(feature = "store-sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-sqlite")))]
pub use store::{CityRecord, RegionRecord, SCHEMA_VERSION, SqliteStore};
