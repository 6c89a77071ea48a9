//! SQLite-backed metric store and location catalogue.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use geo::Coord;
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::{
    CityGeo, CityId, EntityRef, Filter, GeoContext, Location, LocationDetails, LocationId,
    MetricId, MetricKey, MetricValue, MetricValueId, Period, RegionGeo, RegionId, ScopeFilter,
};

use super::schema::initialise_schema;
use super::{LocationCatalog, MetricStore, StoreError, ensure_finite};

const SELECT_VALUES: &str = "SELECT id, metric_id, region_id, city_id, location_id, value, \
     month, year, modified_at FROM metric_values WHERE metric_id = ?";

const SELECT_LOCATIONS_BY_TYPE: &str = "SELECT
        l.id, l.name, l.lon, l.lat, l.city_id, l.region_id,
        l.external_id, l.rating, l.review_count, l.price, l.extras
     FROM locations AS l
     JOIN location_types AS t ON t.location_id = l.id
     WHERE t.type_tag = ?1
       AND (?2 IS NULL
            OR l.region_id = ?2
            OR l.city_id IN (SELECT id FROM cities WHERE region_id = ?2))
       AND (?3 IS NULL OR l.city_id = ?3)
     ORDER BY l.id";

/// A region row as written by importers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    /// Region identifier.
    pub id: RegionId,
    /// Display name.
    pub name: String,
}

/// A city row as written by importers.
#[derive(Debug, Clone, PartialEq)]
pub struct CityRecord {
    /// City identifier.
    pub id: CityId,
    /// Region the city belongs to.
    pub region: Option<RegionId>,
    /// Display name.
    pub name: String,
    /// City centre.
    pub location: Coord<f64>,
    /// Whether the city is its region's capital.
    pub is_region_capital: bool,
}

/// Metric store and location catalogue persisted in one SQLite database.
///
/// The schema is created on open. Writes assume a single writer.
pub struct SqliteStore {
    connection: Connection,
    path: Option<PathBuf>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut connection = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            operation: "open in-memory database",
            source,
        })?;
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection,
            path: None,
        })
    }

    /// Location of the database on disk, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace a region.
    pub fn insert_region(&self, record: &RegionRecord) -> Result<(), StoreError> {
        self.connection
            .execute(
                "INSERT OR REPLACE INTO regions (id, name) VALUES (?1, ?2)",
                params![sql_id(record.id.get())?, record.name],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "insert region",
                source,
            })
    }

    /// Insert or replace a city.
    pub fn insert_city(&self, record: &CityRecord) -> Result<(), StoreError> {
        let region = record.region.map(|id| sql_id(id.get())).transpose()?;
        self.connection
            .execute(
                "INSERT OR REPLACE INTO cities (id, region_id, name, lon, lat, is_region_capital)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sql_id(record.id.get())?,
                    region,
                    record.name,
                    record.location.x,
                    record.location.y,
                    record.is_region_capital,
                ],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "insert city",
                source,
            })
    }

    /// Insert or replace a location together with its type tags.
    pub fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        let id = sql_id(location.id.get())?;
        let city = location.city.map(|city| sql_id(city.get())).transpose()?;
        let region = location
            .region
            .map(|region| sql_id(region.get()))
            .transpose()?;
        let review_count = location
            .details
            .review_count
            .map(sql_id)
            .transpose()?;
        let extras = serde_json::to_string(&location.details.extras).map_err(|source| {
            StoreError::InvalidExtras {
                id: location.id,
                source,
            }
        })?;

        let transaction =
            self.connection
                .unchecked_transaction()
                .map_err(|source| StoreError::Sqlite {
                    operation: "begin location transaction",
                    source,
                })?;
        transaction
            .execute(
                "INSERT OR REPLACE INTO locations (
                    id, name, lon, lat, city_id, region_id,
                    external_id, rating, review_count, price, extras
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id,
                    location.name,
                    location.location.x,
                    location.location.y,
                    city,
                    region,
                    location.details.external_id,
                    location.details.rating,
                    review_count,
                    location.details.price,
                    extras,
                ],
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "insert location",
                source,
            })?;
        transaction
            .execute("DELETE FROM location_types WHERE location_id = ?1", [id])
            .map_err(|source| StoreError::Sqlite {
                operation: "clear location types",
                source,
            })?;
        {
            let mut insert_type = transaction
                .prepare_cached(
                    "INSERT INTO location_types (location_id, type_tag) VALUES (?1, ?2)",
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare location type insert",
                    source,
                })?;
            for tag in &location.types {
                insert_type
                    .execute(params![id, tag])
                    .map_err(|source| StoreError::Sqlite {
                        operation: "insert location type",
                        source,
                    })?;
            }
        }
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit location transaction",
            source,
        })
    }

    /// Replace the reviews of a location; order is preserved.
    pub fn insert_reviews(&self, location: LocationId, reviews: &[String]) -> Result<(), StoreError> {
        let id = sql_id(location.get())?;
        let transaction =
            self.connection
                .unchecked_transaction()
                .map_err(|source| StoreError::Sqlite {
                    operation: "begin review transaction",
                    source,
                })?;
        transaction
            .execute("DELETE FROM location_reviews WHERE location_id = ?1", [id])
            .map_err(|source| StoreError::Sqlite {
                operation: "clear reviews",
                source,
            })?;
        {
            let mut insert_review = transaction
                .prepare_cached(
                    "INSERT INTO location_reviews (location_id, position, body) VALUES (?1, ?2, ?3)",
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare review insert",
                    source,
                })?;
            for (position, body) in (0_i64..).zip(reviews) {
                insert_review
                    .execute(params![id, position, body])
                    .map_err(|source| StoreError::Sqlite {
                        operation: "insert review",
                        source,
                    })?;
            }
        }
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit review transaction",
            source,
        })
    }

    /// Load regions, cities and capitals into an immutable [`GeoContext`].
    pub fn load_geo_context(&self, national_capital: Coord<f64>) -> Result<GeoContext, StoreError> {
        let mut regions = self.load_regions()?;
        let cities = self.load_cities()?;

        let mut statement = self
            .connection
            .prepare(
                "SELECT region_id, lon, lat FROM cities
                 WHERE is_region_capital = 1 AND region_id IS NOT NULL
                 ORDER BY id",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare capital lookup",
                source,
            })?;
        let capitals = statement
            .query_map([], |row| {
                Ok((
                    RegionId(row.get(0)?),
                    Coord {
                        x: row.get(1)?,
                        y: row.get(2)?,
                    },
                ))
            })
            .map_err(|source| StoreError::Sqlite {
                operation: "query region capitals",
                source,
            })?;
        for capital in capitals {
            let (region, location) = capital.map_err(|source| StoreError::Sqlite {
                operation: "read region capital",
                source,
            })?;
            if let Some(geo) = regions.get_mut(&region) {
                geo.capital.get_or_insert(location);
            }
        }

        Ok(GeoContext::new(national_capital, regions, cities))
    }

    fn load_regions(&self) -> Result<BTreeMap<RegionId, RegionGeo>, StoreError> {
        let mut statement = self
            .connection
            .prepare("SELECT id, name FROM regions ORDER BY id")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare region scan",
                source,
            })?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    RegionId(row.get(0)?),
                    RegionGeo {
                        name: row.get(1)?,
                        capital: None,
                    },
                ))
            })
            .map_err(|source| StoreError::Sqlite {
                operation: "query regions",
                source,
            })?;
        rows.collect::<Result<_, _>>()
            .map_err(|source| StoreError::Sqlite {
                operation: "read region row",
                source,
            })
    }

    fn load_cities(&self) -> Result<BTreeMap<CityId, CityGeo>, StoreError> {
        let mut statement = self
            .connection
            .prepare("SELECT id, region_id, name, lon, lat FROM cities ORDER BY id")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare city scan",
                source,
            })?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    CityId(row.get(0)?),
                    CityGeo {
                        region: row.get::<_, Option<u64>>(1)?.map(RegionId),
                        name: row.get(2)?,
                        location: Coord {
                            x: row.get(3)?,
                            y: row.get(4)?,
                        },
                    },
                ))
            })
            .map_err(|source| StoreError::Sqlite {
                operation: "query cities",
                source,
            })?;
        rows.collect::<Result<_, _>>()
            .map_err(|source| StoreError::Sqlite {
                operation: "read city row",
                source,
            })
    }

    fn location_types(&self, id: LocationId) -> Result<Vec<String>, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT type_tag FROM location_types WHERE location_id = ?1 ORDER BY type_tag",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare location type lookup",
                source,
            })?;
        let rows = statement
            .query_map([sql_id(id.get())?], |row| row.get(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "query location types",
                source,
            })?;
        rows.collect::<Result<_, _>>()
            .map_err(|source| StoreError::Sqlite {
                operation: "read location type",
                source,
            })
    }
}

impl MetricStore for SqliteStore {
    fn metric_id(&self, name: &str) -> Result<MetricId, StoreError> {
        self.connection
            .execute("INSERT OR IGNORE INTO metrics (name) VALUES (?1)", [name])
            .map_err(|source| StoreError::Sqlite {
                operation: "register metric",
                source,
            })?;
        self.connection
            .query_row("SELECT id FROM metrics WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .map(MetricId)
            .map_err(|source| StoreError::Sqlite {
                operation: "look up metric",
                source,
            })
    }

    fn get_values(
        &self,
        metric: MetricId,
        scope: &ScopeFilter,
    ) -> Result<Vec<MetricValue>, StoreError> {
        let mut sql = String::from(SELECT_VALUES);
        let mut bindings = vec![sql_id(metric.get())?];
        push_clause(
            &mut sql,
            &mut bindings,
            "region_id",
            scope.region.map(|id| sql_id(id.get()))?,
        );
        push_clause(
            &mut sql,
            &mut bindings,
            "city_id",
            scope.city.map(|id| sql_id(id.get()))?,
        );
        push_clause(
            &mut sql,
            &mut bindings,
            "location_id",
            scope.location.map(|id| sql_id(id.get()))?,
        );
        push_clause(
            &mut sql,
            &mut bindings,
            "month",
            scope.month.map(|month| Ok::<_, StoreError>(i64::from(month)))?,
        );
        push_clause(
            &mut sql,
            &mut bindings,
            "year",
            scope.year.map(|year| Ok::<_, StoreError>(i64::from(year)))?,
        );
        sql.push_str(" ORDER BY id");

        let mut statement =
            self.connection
                .prepare_cached(&sql)
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare metric value scan",
                    source,
                })?;
        let rows = statement
            .query_map(params_from_iter(bindings.iter()), RawValueRow::from_row)
            .map_err(|source| StoreError::Sqlite {
                operation: "query metric values",
                source,
            })?;

        let mut values = Vec::new();
        for row in rows {
            let raw = row.map_err(|source| StoreError::Sqlite {
                operation: "read metric value row",
                source,
            })?;
            values.push(raw.into_value()?);
        }
        Ok(values)
    }

    fn upsert_value(
        &self,
        existing: Option<MetricValueId>,
        key: &MetricKey,
        value: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<MetricValue, StoreError> {
        ensure_finite(key.metric, value)?;
        let (region, city, location) = key.entity.columns();
        let region = region.map(|id| sql_id(id.get())).transpose()?;
        let city = city.map(|id| sql_id(id.get())).transpose()?;
        let location = location.map(|id| sql_id(id.get())).transpose()?;
        let metric = sql_id(key.metric.get())?;
        let text = value.to_string();
        let stamp = modified_at.timestamp();

        let id = if let Some(id) = existing {
            let changed = self
                .connection
                .execute(
                    "UPDATE metric_values
                     SET metric_id = ?1, region_id = ?2, city_id = ?3, location_id = ?4,
                         value = ?5, month = ?6, year = ?7, modified_at = ?8
                     WHERE id = ?9",
                    params![
                        metric,
                        region,
                        city,
                        location,
                        text,
                        key.period.month,
                        key.period.year,
                        stamp,
                        sql_id(id.get())?,
                    ],
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "update metric value",
                    source,
                })?;
            if changed == 0 {
                return Err(StoreError::UnknownValue { id });
            }
            id
        } else {
            self.connection
                .execute(
                    "INSERT INTO metric_values
                        (metric_id, region_id, city_id, location_id, value, month, year, modified_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        metric,
                        region,
                        city,
                        location,
                        text,
                        key.period.month,
                        key.period.year,
                        stamp,
                    ],
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "insert metric value",
                    source,
                })?;
            let rowid = self.connection.last_insert_rowid();
            MetricValueId(u64::try_from(rowid).map_err(|_| StoreError::IdOutOfRange {
                id: rowid.unsigned_abs(),
            })?)
        };

        let stored_at = DateTime::from_timestamp(stamp, 0)
            .ok_or(StoreError::InvalidTimestamp { id, raw: stamp })?;
        Ok(MetricValue {
            id,
            metric: key.metric,
            entity: key.entity,
            value,
            period: key.period,
            modified_at: stored_at,
        })
    }

    fn delete_value(&self, id: MetricValueId) -> Result<(), StoreError> {
        self.connection
            .execute(
                "DELETE FROM metric_values WHERE id = ?1",
                [sql_id(id.get())?],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "delete metric value",
                source,
            })
    }
}

impl LocationCatalog for SqliteStore {
    fn locations_by_type(
        &self,
        type_tag: &str,
        region: Option<RegionId>,
        city: Option<CityId>,
    ) -> Result<Vec<Location>, StoreError> {
        let region = region.map(|id| sql_id(id.get())).transpose()?;
        let city = city.map(|id| sql_id(id.get())).transpose()?;
        let mut statement = self
            .connection
            .prepare_cached(SELECT_LOCATIONS_BY_TYPE)
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare location scan",
                source,
            })?;
        let rows = statement
            .query_map(params![type_tag, region, city], RawLocationRow::from_row)
            .map_err(|source| StoreError::Sqlite {
                operation: "query locations by type",
                source,
            })?;

        let mut locations = Vec::new();
        for row in rows {
            let raw = row.map_err(|source| StoreError::Sqlite {
                operation: "read location row",
                source,
            })?;
            let mut location = raw.into_location()?;
            location.types = self.location_types(location.id)?.into_iter().collect();
            locations.push(location);
        }
        Ok(locations)
    }

    fn top_reviews(&self, location: LocationId, limit: usize) -> Result<Vec<String>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT body FROM location_reviews WHERE location_id = ?1
                 ORDER BY position LIMIT ?2",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare review lookup",
                source,
            })?;
        let rows = statement
            .query_map(params![sql_id(location.get())?, limit], |row| row.get(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "query reviews",
                source,
            })?;
        rows.collect::<Result<_, _>>()
            .map_err(|source| StoreError::Sqlite {
                operation: "read review",
                source,
            })
    }
}

/// Metric value columns as read, before validation.
struct RawValueRow {
    id: u64,
    metric: u64,
    region: Option<u64>,
    city: Option<u64>,
    location: Option<u64>,
    value: String,
    month: Option<u8>,
    year: Option<i32>,
    modified_at: i64,
}

impl RawValueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            metric: row.get(1)?,
            region: row.get(2)?,
            city: row.get(3)?,
            location: row.get(4)?,
            value: row.get(5)?,
            month: row.get(6)?,
            year: row.get(7)?,
            modified_at: row.get(8)?,
        })
    }

    fn into_value(self) -> Result<MetricValue, StoreError> {
        let id = MetricValueId(self.id);
        let entity = EntityRef::from_columns(
            self.region.map(RegionId),
            self.city.map(CityId),
            self.location.map(LocationId),
        )
        .ok_or(StoreError::InvalidEntity { id })?;
        let value = self
            .value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| StoreError::InvalidValue {
                id,
                raw: self.value.clone(),
            })?;
        let modified_at =
            DateTime::from_timestamp(self.modified_at, 0).ok_or(StoreError::InvalidTimestamp {
                id,
                raw: self.modified_at,
            })?;
        Ok(MetricValue {
            id,
            metric: MetricId(self.metric),
            entity,
            value,
            period: Period {
                month: self.month,
                year: self.year,
            },
            modified_at,
        })
    }
}

/// Location columns as read, before the extras JSON is decoded.
struct RawLocationRow {
    id: u64,
    name: String,
    lon: f64,
    lat: f64,
    city: Option<u64>,
    region: Option<u64>,
    external_id: Option<String>,
    rating: Option<f64>,
    review_count: Option<u64>,
    price: Option<f64>,
    extras: String,
}

impl RawLocationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            lon: row.get(2)?,
            lat: row.get(3)?,
            city: row.get(4)?,
            region: row.get(5)?,
            external_id: row.get(6)?,
            rating: row.get(7)?,
            review_count: row.get(8)?,
            price: row.get(9)?,
            extras: row.get(10)?,
        })
    }

    fn into_location(self) -> Result<Location, StoreError> {
        let id = LocationId(self.id);
        let extras = serde_json::from_str(&self.extras)
            .map_err(|source| StoreError::InvalidExtras { id, source })?;
        let mut location = Location::new(id, self.name, Coord {
            x: self.lon,
            y: self.lat,
        })
        .with_details(LocationDetails {
            external_id: self.external_id,
            rating: self.rating,
            review_count: self.review_count,
            price: self.price,
            extras,
        });
        location.city = self.city.map(CityId);
        location.region = self.region.map(RegionId);
        Ok(location)
    }
}

fn sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::IdOutOfRange { id })
}

fn push_clause(sql: &mut String, bindings: &mut Vec<i64>, column: &str, filter: Filter<i64>) {
    match filter {
        Filter::Any => {}
        Filter::Null => {
            sql.push_str(" AND ");
            sql.push_str(column);
            sql.push_str(" IS NULL");
        }
        Filter::Eq(value) => {
            sql.push_str(" AND ");
            sql.push_str(column);
            sql.push_str(" = ?");
            bindings.push(value);
        }
    }
}
