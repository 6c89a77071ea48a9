//! Data access traits for metric values and the location catalogue.
//!
//! [`MetricStore`] persists `(metric, entity, period) → value` rows and
//! [`LocationCatalog`] lists scraped points of interest. Both are narrow on
//! purpose: the scoring engine never sees SQL.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    CityId, Location, LocationId, MetricId, MetricKey, MetricValue, MetricValueId, RegionId,
    ScopeFilter,
};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::SCHEMA_VERSION;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{CityRecord, RegionRecord, SqliteStore};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the backing database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Location of the database on disk.
        path: std::path::PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A database statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation}")]
    Sqlite {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database was created by an incompatible schema version.
    #[error("unsupported schema version {found}; supported version is {supported}")]
    SchemaVersion {
        /// Version recorded in the database.
        found: i64,
        /// Version this build understands.
        supported: i64,
    },
    /// A stored value was not a number.
    #[error("metric value {id} holds non-numeric text {raw:?}")]
    InvalidValue {
        /// Offending row.
        id: MetricValueId,
        /// Text found in the row.
        raw: String,
    },
    /// A non-finite number was offered for storage.
    #[error("refusing to store non-finite value {value} for metric {metric}")]
    NonFiniteValue {
        /// Target metric.
        metric: MetricId,
        /// Rejected value.
        value: f64,
    },
    /// A row did not reference exactly one entity.
    #[error("metric value {id} does not reference exactly one entity")]
    InvalidEntity {
        /// Offending row.
        id: MetricValueId,
    },
    /// An update targeted a row that does not exist.
    #[error("metric value {id} does not exist")]
    UnknownValue {
        /// Requested row.
        id: MetricValueId,
    },
    /// An identifier could not be represented in the database.
    #[error("identifier {id} exceeds the SQLite integer range")]
    IdOutOfRange {
        /// Offending identifier.
        id: u64,
    },
    /// A stored timestamp could not be decoded.
    #[error("metric value {id} has an invalid timestamp {raw}")]
    InvalidTimestamp {
        /// Offending row.
        id: MetricValueId,
        /// Raw seconds since the epoch.
        raw: i64,
    },
    /// Provider extras were not a JSON object.
    #[error("failed to decode extras for location {id}")]
    InvalidExtras {
        /// Offending location.
        id: LocationId,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent `(metric, entity, period) → value` rows.
///
/// The store assumes a single writer: find-then-update by composite key is
/// not atomic across processes.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use rating_core::{CityId, EntityRef, MetricKey, MetricStore, ScopeFilter, SqliteStore};
///
/// let store = SqliteStore::open_in_memory().unwrap();
/// let metric = store.metric_id("tourist_flow").unwrap();
/// let key = MetricKey::new(metric, EntityRef::City(CityId(1)));
///
/// store.put_value(&key, 10.0, Utc::now()).unwrap();
/// store.put_value(&key, 12.0, Utc::now()).unwrap();
///
/// let rows = store.get_values(metric, &ScopeFilter::any()).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].value, 12.0);
/// ```
pub trait MetricStore {
    /// Return the identifier of the metric called `name`, creating it if
    /// necessary.
    fn metric_id(&self, name: &str) -> Result<MetricId, StoreError>;

    /// Return every value of `metric` whose scoping columns satisfy `scope`.
    ///
    /// Rows are ordered by identifier.
    fn get_values(
        &self,
        metric: MetricId,
        scope: &ScopeFilter,
    ) -> Result<Vec<MetricValue>, StoreError>;

    /// Update row `existing` or, when `None`, insert a new row for `key`.
    fn upsert_value(
        &self,
        existing: Option<MetricValueId>,
        key: &MetricKey,
        value: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<MetricValue, StoreError>;

    /// Return the row identified by `key`, if any.
    fn find_value(&self, key: &MetricKey) -> Result<Option<MetricValue>, StoreError> {
        Ok(self
            .get_values(key.metric, &ScopeFilter::key(key))?
            .into_iter()
            .next())
    }

    /// Write `value` for `key`, reusing the existing row when there is one.
    fn put_value(
        &self,
        key: &MetricKey,
        value: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<MetricValue, StoreError> {
        let existing = self.find_value(key)?.map(|row| row.id);
        self.upsert_value(existing, key, value, modified_at)
    }

    /// Delete row `id`. Deleting a row that does not exist is not an error.
    fn delete_value(&self, id: MetricValueId) -> Result<(), StoreError>;

    /// Remove the row identified by `key`, returning whether one existed.
    fn clear_value(&self, key: &MetricKey) -> Result<bool, StoreError> {
        let Some(row) = self.find_value(key)? else {
            return Ok(false);
        };
        self.delete_value(row.id)?;
        Ok(true)
    }
}

/// Read access to scraped points of interest.
pub trait LocationCatalog {
    /// Locations tagged `type_tag`, optionally restricted to a region and/or
    /// city. `None` leaves the column unconstrained.
    fn locations_by_type(
        &self,
        type_tag: &str,
        region: Option<RegionId>,
        city: Option<CityId>,
    ) -> Result<Vec<Location>, StoreError>;

    /// Up to `limit` review texts for a location, best first.
    fn top_reviews(&self, location: LocationId, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// Reject values that cannot round-trip through text storage.
pub(crate) fn ensure_finite(metric: MetricId, value: f64) -> Result<(), StoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::NonFiniteValue { metric, value })
    }
}
