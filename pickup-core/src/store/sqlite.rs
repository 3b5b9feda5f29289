//! SQLite-backed catalog store.

use std::fmt;
use std::sync::{LazyLock, Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use geo::{Coord, Rect};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, Transaction, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{City, CityRecord, Point, PointRecord, PointSummary, Region, RegionRecord};

use super::schema::{initialise_schema, verify_schema};
use super::{CatalogCounts, CatalogReader, CatalogStoreError, CatalogWriter};

/// Partner-sourced point columns in binding order.
const POINT_COLUMNS: [&str; 34] = [
    "code",
    "uuid",
    "name",
    "region_code",
    "city_code",
    "longitude",
    "latitude",
    "address",
    "address_full",
    "address_comment",
    "nearest_station",
    "nearest_metro_station",
    "work_time",
    "phones",
    "email",
    "note",
    "type",
    "owner_code",
    "take_only",
    "is_handout",
    "is_reception",
    "is_dressing_room",
    "have_cashless",
    "have_cash",
    "have_fast_payment_system",
    "allowed_cod",
    "is_ltl",
    "fulfillment",
    "site",
    "work_time_list",
    "work_time_exception_list",
    "weight_min",
    "weight_max",
    "dimensions",
];

static POINT_SELECT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "SELECT id, {}, is_deleted FROM points",
        POINT_COLUMNS.join(", ")
    )
});

// The surrogate id survives updates because the row is never replaced.
static POINT_UPSERT: LazyLock<String> = LazyLock::new(|| {
    let placeholders = (1..=POINT_COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = POINT_COLUMNS
        .iter()
        .filter(|column| **column != "code")
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO points ({columns}, is_deleted) VALUES ({placeholders}, 0)
         ON CONFLICT(code) DO UPDATE SET {updates}, is_deleted = 0",
        columns = POINT_COLUMNS.join(", "),
    )
});

const SUMMARY_SELECT: &str =
    "SELECT id, code, type, allowed_cod, longitude, latitude, address FROM points";
const CITY_SELECT: &str =
    "SELECT code, city, region, region_code, longitude, latitude, points_qty FROM cities";

/// Catalog store persisted in a single SQLite database.
///
/// The connection is guarded by a mutex, so queries and synchronisation
/// stages from different threads are serialised. Structured point fields
/// (phones, schedules, dimensions) are stored as JSON text.
///
/// # Examples
/// ```
/// use pickup_core::{CatalogReader, CatalogWriter, RegionRecord, SqliteCatalogStore};
///
/// # fn main() -> Result<(), pickup_core::CatalogStoreError> {
/// let store = SqliteCatalogStore::open_in_memory()?;
/// store.upsert_regions(&[RegionRecord { region_code: 77, region: "Moscow".into() }])?;
/// let region = store.region(77)?.expect("region stored");
/// assert!(!region.has_points);
/// assert_eq!(region.location(), None);
/// # Ok(())
/// # }
/// ```
pub struct SqliteCatalogStore {
    connection: Mutex<Connection>,
    path: Option<Utf8PathBuf>,
}

impl fmt::Debug for SqliteCatalogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCatalogStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteCatalogStore {
    /// Open or create a catalog database at `path`.
    ///
    /// Parent directories are created when missing and the schema is
    /// initialised on first use.
    ///
    /// # Errors
    /// Fails when the directory or database cannot be created, or when the
    /// database carries an unexpected schema version.
    pub fn open(path: &Utf8Path) -> Result<Self, CatalogStoreError> {
        ensure_parent_dir(path)?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| CatalogStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection, Some(path.to_path_buf()))
    }

    /// Open an existing catalog database without write access.
    ///
    /// Nothing is created: the file must exist and already carry the current
    /// schema. Writes through the returned store fail.
    ///
    /// # Errors
    /// Fails when the file is missing or unreadable, holds no catalog, or
    /// carries an unexpected schema version.
    pub fn open_read_only(path: &Utf8Path) -> Result<Self, CatalogStoreError> {
        let connection = Connection::open_with_flags(
            path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|source| CatalogStoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        register_casefold(&connection)?;
        verify_schema(&connection, path)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a private in-memory catalog.
    ///
    /// # Errors
    /// Fails when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, CatalogStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| CatalogStoreError::Open {
                path: Utf8PathBuf::from(":memory:"),
                source,
            })?;
        Self::from_connection(connection, None)
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    fn from_connection(
        mut connection: Connection,
        path: Option<Utf8PathBuf>,
    ) -> Result<Self, CatalogStoreError> {
        register_casefold(&connection)?;
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, CatalogStoreError> {
        self.connection
            .lock()
            .map_err(|_| CatalogStoreError::Poisoned)
    }

    fn in_transaction<T>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, CatalogStoreError>,
    ) -> Result<T, CatalogStoreError> {
        let mut connection = self.connection()?;
        let transaction = connection.transaction().map_err(sql(operation))?;
        let outcome = work(&transaction)?;
        transaction.commit().map_err(sql(operation))?;
        Ok(outcome)
    }

    fn query_list<T>(
        &self,
        operation: &'static str,
        query: &str,
        params: impl rusqlite::Params,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, CatalogStoreError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(query).map_err(sql(operation))?;
        let rows = statement.query_map(params, map).map_err(sql(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql(operation))
    }

    fn count(&self, operation: &'static str, query: &str) -> Result<usize, CatalogStoreError> {
        let connection = self.connection()?;
        // Reading as `usize` rejects negative totals instead of clamping them.
        connection
            .query_row(query, [], |row| row.get::<_, usize>(0))
            .map_err(sql(operation))
    }
}

fn sql(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> CatalogStoreError {
    move |source| CatalogStoreError::Sqlite { operation, source }
}

fn register_casefold(connection: &Connection) -> Result<(), CatalogStoreError> {
    // SQLite's own `lower()` only folds ASCII; Cyrillic names need Unicode
    // lowercasing for case-insensitive suggestions.
    connection
        .create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let text: String = context.get(0)?;
                Ok(text.to_lowercase())
            },
        )
        .map_err(|source| CatalogStoreError::Migration {
            step: "register casefold function",
            source,
        })
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), CatalogStoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    let create_error = |source| CatalogStoreError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority()).map_err(create_error)?;
    dir.create_dir_all(relative).map_err(create_error)
}

fn encode_json<T: Serialize>(
    code: &str,
    column: &'static str,
    value: &T,
) -> Result<String, CatalogStoreError> {
    serde_json::to_string(value).map_err(|source| CatalogStoreError::EncodeColumn {
        code: code.to_owned(),
        column,
        source,
    })
}

fn encode_optional_json<T: Serialize>(
    code: &str,
    column: &'static str,
    value: Option<&T>,
) -> Result<Option<String>, CatalogStoreError> {
    value
        .map(|inner| encode_json(code, column, inner))
        .transpose()
}

fn decode_json<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn decode_optional_json<T: DeserializeOwned>(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(index)?;
    text.map(|value| {
        serde_json::from_str(&value).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

fn decode_uuid(row: &Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(index)?;
    Uuid::parse_str(&text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn point_from_row(row: &Row<'_>) -> rusqlite::Result<Point> {
    let record = PointRecord {
        code: row.get(1)?,
        uuid: decode_uuid(row, 2)?,
        name: row.get(3)?,
        region_code: row.get(4)?,
        city_code: row.get(5)?,
        longitude: row.get(6)?,
        latitude: row.get(7)?,
        address: row.get(8)?,
        address_full: row.get(9)?,
        address_comment: row.get(10)?,
        nearest_station: row.get(11)?,
        nearest_metro_station: row.get(12)?,
        work_time: row.get(13)?,
        phones: decode_json(row, 14)?,
        email: row.get(15)?,
        note: row.get(16)?,
        point_type: row.get(17)?,
        owner_code: row.get(18)?,
        take_only: row.get(19)?,
        is_handout: row.get(20)?,
        is_reception: row.get(21)?,
        is_dressing_room: row.get(22)?,
        have_cashless: row.get(23)?,
        have_cash: row.get(24)?,
        have_fast_payment_system: row.get(25)?,
        allowed_cod: row.get(26)?,
        is_ltl: row.get(27)?,
        fulfillment: row.get(28)?,
        site: row.get(29)?,
        work_time_list: decode_json(row, 30)?,
        work_time_exception_list: decode_optional_json(row, 31)?,
        weight_min: row.get(32)?,
        weight_max: row.get(33)?,
        dimensions: decode_optional_json(row, 34)?,
    };
    Ok(Point {
        id: row.get(0)?,
        record,
        is_deleted: row.get(35)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<PointSummary> {
    Ok(PointSummary {
        id: row.get(0)?,
        code: row.get(1)?,
        point_type: row.get(2)?,
        allowed_cod: row.get(3)?,
        longitude: row.get(4)?,
        latitude: row.get(5)?,
        address: row.get(6)?,
    })
}

fn city_from_row(row: &Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        code: row.get(0)?,
        city: row.get(1)?,
        region: row.get(2)?,
        region_code: row.get(3)?,
        longitude: row.get(4)?,
        latitude: row.get(5)?,
        points_qty: row.get(6)?,
    })
}

fn region_from_row(row: &Row<'_>) -> rusqlite::Result<Region> {
    Ok(Region {
        region_code: row.get(0)?,
        region: row.get(1)?,
        has_points: row.get(2)?,
        longitude: row.get(3)?,
        latitude: row.get(4)?,
    })
}

impl CatalogReader for SqliteCatalogStore {
    fn cities_with_points(&self) -> Result<Vec<City>, CatalogStoreError> {
        self.query_list(
            "select cities with points",
            &format!("{CITY_SELECT} WHERE points_qty > 0 ORDER BY code"),
            [],
            city_from_row,
        )
    }

    fn suggest_cities(&self, needle: &str, limit: usize) -> Result<Vec<City>, CatalogStoreError> {
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_list(
            "suggest cities",
            &format!(
                "{CITY_SELECT}
                 WHERE points_qty > 0
                   AND (instr(casefold(city), ?1) > 0 OR instr(casefold(region), ?1) > 0)
                 ORDER BY points_qty DESC, code
                 LIMIT ?2"
            ),
            params![needle.to_lowercase(), row_limit],
            city_from_row,
        )
    }

    fn points_in_city(&self, city_code: i64) -> Result<Vec<PointSummary>, CatalogStoreError> {
        self.query_list(
            "select points by city",
            &format!("{SUMMARY_SELECT} WHERE city_code = ?1 AND is_deleted = 0 ORDER BY id"),
            [city_code],
            summary_from_row,
        )
    }

    fn points_in_bounds(
        &self,
        bounds: &Rect<f64>,
    ) -> Result<Vec<PointSummary>, CatalogStoreError> {
        let (min, max) = (bounds.min(), bounds.max());
        self.query_list(
            "select points by bounds",
            &format!(
                "{SUMMARY_SELECT}
                 WHERE is_deleted = 0
                   AND longitude BETWEEN ?1 AND ?2
                   AND latitude BETWEEN ?3 AND ?4
                 ORDER BY id"
            ),
            [min.x, max.x, min.y, max.y],
            summary_from_row,
        )
    }

    fn point_by_code(&self, code: &str) -> Result<Option<Point>, CatalogStoreError> {
        let connection = self.connection()?;
        connection
            .query_row(
                &format!("{} WHERE code = ?1", *POINT_SELECT),
                [code],
                point_from_row,
            )
            .optional()
            .map_err(sql("select point by code"))
    }

    fn region(&self, region_code: i64) -> Result<Option<Region>, CatalogStoreError> {
        let connection = self.connection()?;
        connection
            .query_row(
                "SELECT region_code, region, has_points, longitude, latitude
                 FROM regions WHERE region_code = ?1",
                [region_code],
                region_from_row,
            )
            .optional()
            .map_err(sql("select region"))
    }

    fn city(&self, code: i64) -> Result<Option<City>, CatalogStoreError> {
        let connection = self.connection()?;
        connection
            .query_row(
                &format!("{CITY_SELECT} WHERE code = ?1"),
                [code],
                city_from_row,
            )
            .optional()
            .map_err(sql("select city"))
    }

    fn live_point_counts_by_city(&self) -> Result<Vec<(i64, u32)>, CatalogStoreError> {
        self.query_list(
            "count live points by city",
            "SELECT city_code, COUNT(*) FROM points
             WHERE is_deleted = 0 GROUP BY city_code ORDER BY city_code",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    fn live_point_region_codes(&self) -> Result<Vec<i64>, CatalogStoreError> {
        self.query_list(
            "select live point regions",
            "SELECT DISTINCT region_code FROM points WHERE is_deleted = 0 ORDER BY region_code",
            [],
            |row| row.get(0),
        )
    }

    fn regions_with_points(&self) -> Result<Vec<i64>, CatalogStoreError> {
        self.query_list(
            "select regions with points",
            "SELECT region_code FROM regions WHERE has_points = 1 ORDER BY region_code",
            [],
            |row| row.get(0),
        )
    }

    fn live_point_coordinates(
        &self,
        region_code: i64,
    ) -> Result<Vec<Coord<f64>>, CatalogStoreError> {
        self.query_list(
            "select region point coordinates",
            "SELECT longitude, latitude FROM points
             WHERE region_code = ?1 AND is_deleted = 0 ORDER BY id",
            [region_code],
            |row| {
                Ok(Coord {
                    x: row.get(0)?,
                    y: row.get(1)?,
                })
            },
        )
    }

    fn counts(&self) -> Result<CatalogCounts, CatalogStoreError> {
        Ok(CatalogCounts {
            regions: self.count("count regions", "SELECT COUNT(*) FROM regions")?,
            cities: self.count("count cities", "SELECT COUNT(*) FROM cities")?,
            live_points: self.count(
                "count live points",
                "SELECT COUNT(*) FROM points WHERE is_deleted = 0",
            )?,
            deleted_points: self.count(
                "count deleted points",
                "SELECT COUNT(*) FROM points WHERE is_deleted = 1",
            )?,
        })
    }
}

impl CatalogWriter for SqliteCatalogStore {
    fn upsert_regions(&self, regions: &[RegionRecord]) -> Result<usize, CatalogStoreError> {
        self.in_transaction("upsert regions", |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT INTO regions (region_code, region) VALUES (?1, ?2)
                     ON CONFLICT(region_code) DO UPDATE SET region = excluded.region",
                )
                .map_err(sql("prepare region upsert"))?;
            for region in regions {
                statement
                    .execute(params![region.region_code, region.region])
                    .map_err(sql("upsert region"))?;
            }
            Ok(regions.len())
        })
    }

    fn upsert_cities(&self, cities: &[CityRecord]) -> Result<usize, CatalogStoreError> {
        self.in_transaction("upsert cities", |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT INTO cities (code, city, region, region_code, longitude, latitude)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(code) DO UPDATE SET
                        city = excluded.city,
                        region = excluded.region,
                        region_code = excluded.region_code,
                        longitude = excluded.longitude,
                        latitude = excluded.latitude",
                )
                .map_err(sql("prepare city upsert"))?;
            for city in cities {
                statement
                    .execute(params![
                        city.code,
                        city.city,
                        city.region,
                        city.region_code,
                        city.longitude,
                        city.latitude,
                    ])
                    .map_err(sql("upsert city"))?;
            }
            Ok(cities.len())
        })
    }

    fn mark_all_points_deleted(&self) -> Result<usize, CatalogStoreError> {
        let connection = self.connection()?;
        connection
            .execute("UPDATE points SET is_deleted = 1", [])
            .map_err(sql("mark points deleted"))
    }

    fn upsert_points(&self, points: &[PointRecord]) -> Result<usize, CatalogStoreError> {
        self.in_transaction("upsert points", |transaction| {
            let mut statement = transaction
                .prepare_cached(&POINT_UPSERT)
                .map_err(sql("prepare point upsert"))?;
            for point in points {
                let code = point.code.as_str();
                let phones = encode_json(code, "phones", &point.phones)?;
                let work_time_list = encode_json(code, "work_time_list", &point.work_time_list)?;
                let exceptions = encode_optional_json(
                    code,
                    "work_time_exception_list",
                    point.work_time_exception_list.as_ref(),
                )?;
                let dimensions =
                    encode_optional_json(code, "dimensions", point.dimensions.as_ref())?;
                statement
                    .execute(params![
                        point.code,
                        point.uuid.to_string(),
                        point.name,
                        point.region_code,
                        point.city_code,
                        point.longitude,
                        point.latitude,
                        point.address,
                        point.address_full,
                        point.address_comment,
                        point.nearest_station,
                        point.nearest_metro_station,
                        point.work_time,
                        phones,
                        point.email,
                        point.note,
                        point.point_type,
                        point.owner_code,
                        point.take_only,
                        point.is_handout,
                        point.is_reception,
                        point.is_dressing_room,
                        point.have_cashless,
                        point.have_cash,
                        point.have_fast_payment_system,
                        point.allowed_cod,
                        point.is_ltl,
                        point.fulfillment,
                        point.site,
                        work_time_list,
                        exceptions,
                        point.weight_min,
                        point.weight_max,
                        dimensions,
                    ])
                    .map_err(sql("upsert point"))?;
            }
            Ok(points.len())
        })
    }

    fn replace_city_points_qty(&self, counts: &[(i64, u32)]) -> Result<(), CatalogStoreError> {
        self.in_transaction("replace city points_qty", |transaction| {
            transaction
                .execute("UPDATE cities SET points_qty = 0", [])
                .map_err(sql("reset city points_qty"))?;
            let mut statement = transaction
                .prepare_cached("UPDATE cities SET points_qty = ?2 WHERE code = ?1")
                .map_err(sql("prepare city points_qty update"))?;
            for (code, qty) in counts {
                statement
                    .execute(params![code, qty])
                    .map_err(sql("set city points_qty"))?;
            }
            Ok(())
        })
    }

    fn replace_region_has_points(&self, region_codes: &[i64]) -> Result<(), CatalogStoreError> {
        self.in_transaction("replace region has_points", |transaction| {
            transaction
                .execute("UPDATE regions SET has_points = 0", [])
                .map_err(sql("reset region has_points"))?;
            let mut statement = transaction
                .prepare_cached("UPDATE regions SET has_points = 1 WHERE region_code = ?1")
                .map_err(sql("prepare region has_points update"))?;
            for code in region_codes {
                statement
                    .execute([code])
                    .map_err(sql("set region has_points"))?;
            }
            Ok(())
        })
    }

    fn set_region_coordinates(
        &self,
        coordinates: &[(i64, Coord<f64>)],
    ) -> Result<(), CatalogStoreError> {
        self.in_transaction("set region coordinates", |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "UPDATE regions SET longitude = ?2, latitude = ?3 WHERE region_code = ?1",
                )
                .map_err(sql("prepare region coordinate update"))?;
            for (code, at) in coordinates {
                statement
                    .execute(params![code, at.x, at.y])
                    .map_err(sql("set region coordinates"))?;
            }
            Ok(())
        })
    }
}
