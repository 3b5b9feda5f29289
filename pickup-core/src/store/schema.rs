//! Catalog schema creation and version tracking.

use camino::Utf8Path;
use rusqlite::{Connection, OptionalExtension, Transaction};

use super::CatalogStoreError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the catalog tables inside `connection` if they are missing.
///
/// Existing databases must already carry [`SCHEMA_VERSION`]; anything else
/// is rejected so migrations can be applied explicitly.
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), CatalogStoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| CatalogStoreError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| CatalogStoreError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), CatalogStoreError> {
    run_migration_step(
        transaction,
        "create regions",
        "CREATE TABLE IF NOT EXISTS regions (
            region_code INTEGER PRIMARY KEY,
            region TEXT NOT NULL,
            has_points INTEGER NOT NULL DEFAULT 0,
            longitude REAL,
            latitude REAL
        )",
    )?;
    run_migration_step(
        transaction,
        "create cities",
        "CREATE TABLE IF NOT EXISTS cities (
            code INTEGER PRIMARY KEY,
            city TEXT NOT NULL,
            region TEXT NOT NULL,
            region_code INTEGER NOT NULL,
            longitude REAL NOT NULL,
            latitude REAL NOT NULL,
            points_qty INTEGER NOT NULL DEFAULT 0 CHECK (points_qty >= 0)
        )",
    )?;
    run_migration_step(
        transaction,
        "create points",
        "CREATE TABLE IF NOT EXISTS points (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE CHECK (length(code) <= 10),
            uuid TEXT NOT NULL,
            name TEXT NOT NULL,
            region_code INTEGER NOT NULL,
            city_code INTEGER NOT NULL,
            longitude REAL NOT NULL,
            latitude REAL NOT NULL,
            address TEXT NOT NULL,
            address_full TEXT NOT NULL,
            address_comment TEXT,
            nearest_station TEXT,
            nearest_metro_station TEXT,
            work_time TEXT NOT NULL,
            phones TEXT NOT NULL,
            email TEXT,
            note TEXT,
            type TEXT NOT NULL,
            owner_code TEXT NOT NULL,
            take_only INTEGER NOT NULL,
            is_handout INTEGER NOT NULL,
            is_reception INTEGER NOT NULL,
            is_dressing_room INTEGER NOT NULL,
            have_cashless INTEGER NOT NULL,
            have_cash INTEGER NOT NULL,
            have_fast_payment_system INTEGER NOT NULL,
            allowed_cod INTEGER NOT NULL,
            is_ltl INTEGER,
            fulfillment INTEGER,
            site TEXT,
            work_time_list TEXT NOT NULL,
            work_time_exception_list TEXT,
            weight_min REAL,
            weight_max REAL,
            dimensions TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0
        )",
    )
}

fn create_indexes(transaction: &Transaction<'_>) -> Result<(), CatalogStoreError> {
    run_migration_step(
        transaction,
        "index points by city",
        "CREATE INDEX IF NOT EXISTS idx_points_city ON points(city_code, is_deleted)",
    )?;
    run_migration_step(
        transaction,
        "index points by region",
        "CREATE INDEX IF NOT EXISTS idx_points_region ON points(region_code, is_deleted)",
    )?;
    run_migration_step(
        transaction,
        "index points by position",
        "CREATE INDEX IF NOT EXISTS idx_points_position ON points(longitude, latitude)",
    )?;
    run_migration_step(
        transaction,
        "index cities by points_qty",
        "CREATE INDEX IF NOT EXISTS idx_cities_points_qty ON cities(points_qty)",
    )
}

/// Check that an existing database carries the catalog schema without
/// modifying it.
pub(super) fn verify_schema(
    connection: &Connection,
    path: &Utf8Path,
) -> Result<(), CatalogStoreError> {
    let recorded: bool = connection
        .query_row(
            "SELECT EXISTS (
                SELECT 1 FROM sqlite_master
                WHERE type = 'table' AND name = 'catalog_schema_version'
            )",
            [],
            |row| row.get(0),
        )
        .map_err(|source| CatalogStoreError::Migration {
            step: "inspect schema",
            source,
        })?;
    if !recorded {
        return Err(CatalogStoreError::NotACatalog {
            path: path.to_path_buf(),
        });
    }

    match read_schema_version(connection)? {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(CatalogStoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => Err(CatalogStoreError::NotACatalog {
            path: path.to_path_buf(),
        }),
    }
}

fn read_schema_version(connection: &Connection) -> Result<Option<i64>, CatalogStoreError> {
    connection
        .query_row(
            "SELECT version FROM catalog_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| CatalogStoreError::Migration {
            step: "read schema version",
            source,
        })
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), CatalogStoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS catalog_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    match read_schema_version(transaction)? {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(CatalogStoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO catalog_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| CatalogStoreError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), CatalogStoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| CatalogStoreError::Migration { step, source })
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests should fail fast when SQLite setup breaks")]
mod tests {
    use super::*;
    use rstest::rstest;

    const PATH: &str = "catalog.db";

    #[rstest]
    fn initialising_twice_is_idempotent() {
        let mut connection = Connection::open_in_memory().expect("open database");
        initialise_schema(&mut connection).expect("first run");
        initialise_schema(&mut connection).expect("second run");
        let versions: i64 = connection
            .query_row("SELECT COUNT(*) FROM catalog_schema_version", [], |row| {
                row.get(0)
            })
            .expect("count versions");
        assert_eq!(versions, 1);
    }

    #[rstest]
    fn rejects_unknown_schema_version() {
        let mut connection = Connection::open_in_memory().expect("open database");
        initialise_schema(&mut connection).expect("initialise");
        connection
            .execute("UPDATE catalog_schema_version SET version = 99", [])
            .expect("bump version");
        let err = initialise_schema(&mut connection).expect_err("mismatch should fail");
        assert!(
            matches!(
                err,
                CatalogStoreError::VersionMismatch {
                    expected: SCHEMA_VERSION,
                    found: 99
                }
            ),
            "unexpected error {err:?}"
        );
    }

    #[rstest]
    fn verifying_accepts_an_initialised_catalog() {
        let mut connection = Connection::open_in_memory().expect("open database");
        initialise_schema(&mut connection).expect("initialise");
        verify_schema(&connection, Utf8Path::new(PATH)).expect("schema is current");
    }

    #[rstest]
    fn verifying_rejects_databases_without_a_catalog() {
        let connection = Connection::open_in_memory().expect("open database");
        let err = verify_schema(&connection, Utf8Path::new(PATH)).expect_err("no catalog");
        assert!(
            matches!(&err, CatalogStoreError::NotACatalog { path } if path.as_str() == PATH),
            "unexpected error {err:?}"
        );
        let tables: i64 = connection
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .expect("count tables");
        assert_eq!(tables, 0, "verification must not create tables");
    }
}
