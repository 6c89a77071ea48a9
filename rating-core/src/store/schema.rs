//! SQLite schema for geography, locations and metric values.

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::StoreError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create tables, indexes and the version marker when missing.
///
/// Existing databases must already carry [`SCHEMA_VERSION`]; anything else
/// is rejected so migrations can be applied explicitly.
pub(crate) fn initialise_schema(connection: &mut Connection) -> Result<(), StoreError> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| StoreError::Sqlite {
            operation: "enable foreign keys",
            source,
        })?;

    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Sqlite {
            operation: "begin schema transaction",
            source,
        })?;

    create_geography_tables(&transaction)?;
    create_location_tables(&transaction)?;
    create_metric_tables(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction.commit().map_err(|source| StoreError::Sqlite {
        operation: "commit schema transaction",
        source,
    })
}

fn create_geography_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create regions table",
        "CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create cities table",
        "CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY,
            region_id INTEGER REFERENCES regions(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            lon REAL NOT NULL,
            lat REAL NOT NULL,
            is_region_capital INTEGER NOT NULL DEFAULT 0 CHECK (is_region_capital IN (0, 1))
        )",
    )
}

fn create_location_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create locations table",
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            lon REAL NOT NULL,
            lat REAL NOT NULL,
            city_id INTEGER REFERENCES cities(id) ON DELETE SET NULL,
            region_id INTEGER REFERENCES regions(id) ON DELETE SET NULL,
            external_id TEXT,
            rating REAL,
            review_count INTEGER CHECK (review_count >= 0),
            price REAL,
            extras TEXT NOT NULL DEFAULT '{}'
        )",
    )?;
    run_migration_step(
        transaction,
        "create location_types table",
        "CREATE TABLE IF NOT EXISTS location_types (
            location_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
            type_tag TEXT NOT NULL CHECK (length(trim(type_tag)) > 0),
            PRIMARY KEY (location_id, type_tag)
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "index location_types",
        "CREATE INDEX IF NOT EXISTS idx_location_types_tag
            ON location_types(type_tag, location_id)",
    )?;
    run_migration_step(
        transaction,
        "create location_reviews table",
        "CREATE TABLE IF NOT EXISTS location_reviews (
            location_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (location_id, position)
        ) WITHOUT ROWID",
    )
}

fn create_metric_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create metrics table",
        "CREATE TABLE IF NOT EXISTS metrics (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0)
        )",
    )?;
    run_migration_step(
        transaction,
        "create metric_values table",
        "CREATE TABLE IF NOT EXISTS metric_values (
            id INTEGER PRIMARY KEY,
            metric_id INTEGER NOT NULL REFERENCES metrics(id) ON DELETE CASCADE,
            region_id INTEGER,
            city_id INTEGER,
            location_id INTEGER,
            value TEXT NOT NULL,
            month INTEGER CHECK (month BETWEEN 1 AND 12),
            year INTEGER,
            modified_at INTEGER NOT NULL,
            CHECK (
                (region_id IS NOT NULL) + (city_id IS NOT NULL) + (location_id IS NOT NULL) = 1
            )
        )",
    )?;
    // SQLite treats NULLs as distinct in unique indexes, so the composite key
    // coalesces them to a sentinel.
    run_migration_step(
        transaction,
        "index metric_values identity",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_metric_values_identity
            ON metric_values(
                metric_id,
                ifnull(region_id, -1),
                ifnull(city_id, -1),
                ifnull(location_id, -1),
                ifnull(month, -1),
                ifnull(year, -1)
            )",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS rating_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM rating_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| StoreError::Sqlite {
            operation: "read schema version",
            source,
        })?;

    match existing_version {
        Some(SCHEMA_VERSION) => Ok(()),
        Some(found) => Err(StoreError::SchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
        None => transaction
            .execute(
                "INSERT INTO rating_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    operation: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Sqlite { operation, source })
}
