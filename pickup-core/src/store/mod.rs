//! Repository traits for the mirrored catalog.
//!
//! [`CatalogReader`] serves the query side and the aggregate reads the sync
//! pipeline needs. [`CatalogWriter`] adds the upserts and bulk updates the
//! pipeline issues. Every bulk update runs in a single transaction so
//! readers observe either the previous or the new aggregate values.

use geo::{Coord, Rect};
use thiserror::Error;

use crate::{City, CityRecord, Point, PointRecord, PointSummary, Region, RegionRecord};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::SCHEMA_VERSION;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteCatalogStore;

/// Row totals for a catalog snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CatalogCounts {
    /// Regions on record.
    pub regions: usize,
    /// Cities on record.
    pub cities: usize,
    /// Points not marked deleted.
    pub live_points: usize,
    /// Points marked deleted.
    pub deleted_points: usize,
}

/// Errors raised by catalog store implementations.
#[derive(Debug, Error)]
pub enum CatalogStoreError {
    /// Creating the directory that holds the database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: camino::Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database location.
        path: camino::Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A schema migration step failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Label of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database carries a schema version this build does not understand.
    #[cfg(feature = "store-sqlite")]
    #[error("expected catalog schema version {expected} but found {found}")]
    VersionMismatch {
        /// Version this build writes.
        expected: i64,
        /// Version found on disk.
        found: i64,
    },
    /// The database exists but holds no catalog schema.
    #[cfg(feature = "store-sqlite")]
    #[error("{path:?} does not contain a pickup catalog")]
    NotACatalog {
        /// Database location.
        path: camino::Utf8PathBuf,
    },
    /// A read or write statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("catalog operation '{operation}' failed")]
    Sqlite {
        /// Label of the failing operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Encoding a structured column as JSON failed.
    #[error("failed to encode {column} for point {code}")]
    EncodeColumn {
        /// Code of the point being written.
        code: String,
        /// Column being encoded.
        column: &'static str,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A previous holder of the store lock panicked.
    #[error("catalog store lock poisoned")]
    Poisoned,
}

/// Read access to the mirrored catalog.
///
/// Listing methods never return points marked deleted. Orderings described
/// as "store order" are stable between calls: ascending city code for
/// cities and ascending surrogate id for points.
pub trait CatalogReader {
    /// Cities whose `points_qty` is positive, in store order.
    fn cities_with_points(&self) -> Result<Vec<City>, CatalogStoreError>;

    /// Up to `limit` cities with points whose name or region name contains
    /// `needle`, ignoring case. Ordered by `points_qty` descending, then
    /// city code.
    fn suggest_cities(&self, needle: &str, limit: usize) -> Result<Vec<City>, CatalogStoreError>;

    /// Live points in the given city.
    fn points_in_city(&self, city_code: i64) -> Result<Vec<PointSummary>, CatalogStoreError>;

    /// Live points inside `bounds`, boundaries included.
    fn points_in_bounds(&self, bounds: &Rect<f64>)
    -> Result<Vec<PointSummary>, CatalogStoreError>;

    /// Point with the given code, whether or not it is marked deleted.
    fn point_by_code(&self, code: &str) -> Result<Option<Point>, CatalogStoreError>;

    /// Region with the given code.
    fn region(&self, region_code: i64) -> Result<Option<Region>, CatalogStoreError>;

    /// City with the given code.
    fn city(&self, code: i64) -> Result<Option<City>, CatalogStoreError>;

    /// Number of live points per `city_code`.
    fn live_point_counts_by_city(&self) -> Result<Vec<(i64, u32)>, CatalogStoreError>;

    /// Distinct `region_code` values among live points.
    fn live_point_region_codes(&self) -> Result<Vec<i64>, CatalogStoreError>;

    /// Codes of regions flagged `has_points`.
    fn regions_with_points(&self) -> Result<Vec<i64>, CatalogStoreError>;

    /// Positions of live points in a region, in store order.
    fn live_point_coordinates(&self, region_code: i64)
    -> Result<Vec<Coord<f64>>, CatalogStoreError>;

    /// Row totals.
    fn counts(&self) -> Result<CatalogCounts, CatalogStoreError>;
}

/// Write access used by the synchronisation pipeline.
pub trait CatalogWriter: CatalogReader {
    /// Insert or update regions by `region_code`, keeping derived fields.
    fn upsert_regions(&self, regions: &[RegionRecord]) -> Result<usize, CatalogStoreError>;

    /// Insert or update cities by `code`, keeping `points_qty`.
    fn upsert_cities(&self, cities: &[CityRecord]) -> Result<usize, CatalogStoreError>;

    /// Flag every point as deleted. Returns the number of rows touched.
    fn mark_all_points_deleted(&self) -> Result<usize, CatalogStoreError>;

    /// Insert or update points by `code`, overwriting every partner field
    /// and clearing `is_deleted`. Existing points keep their surrogate id.
    fn upsert_points(&self, points: &[PointRecord]) -> Result<usize, CatalogStoreError>;

    /// Reset every city's `points_qty` to zero, then apply `counts`.
    fn replace_city_points_qty(&self, counts: &[(i64, u32)]) -> Result<(), CatalogStoreError>;

    /// Reset every region's `has_points` to false, then set it for
    /// `region_codes`.
    fn replace_region_has_points(&self, region_codes: &[i64]) -> Result<(), CatalogStoreError>;

    /// Store derived centroids.
    fn set_region_coordinates(
        &self,
        coordinates: &[(i64, Coord<f64>)],
    ) -> Result<(), CatalogStoreError>;
}

impl<T: CatalogReader + ?Sized> CatalogReader for &T {
    fn cities_with_points(&self) -> Result<Vec<City>, CatalogStoreError> {
        (**self).cities_with_points()
    }

    fn suggest_cities(&self, needle: &str, limit: usize) -> Result<Vec<City>, CatalogStoreError> {
        (**self).suggest_cities(needle, limit)
    }

    fn points_in_city(&self, city_code: i64) -> Result<Vec<PointSummary>, CatalogStoreError> {
        (**self).points_in_city(city_code)
    }

    fn points_in_bounds(
        &self,
        bounds: &Rect<f64>,
    ) -> Result<Vec<PointSummary>, CatalogStoreError> {
        (**self).points_in_bounds(bounds)
    }

    fn point_by_code(&self, code: &str) -> Result<Option<Point>, CatalogStoreError> {
        (**self).point_by_code(code)
    }

    fn region(&self, region_code: i64) -> Result<Option<Region>, CatalogStoreError> {
        (**self).region(region_code)
    }

    fn city(&self, code: i64) -> Result<Option<City>, CatalogStoreError> {
        (**self).city(code)
    }

    fn live_point_counts_by_city(&self) -> Result<Vec<(i64, u32)>, CatalogStoreError> {
        (**self).live_point_counts_by_city()
    }

    fn live_point_region_codes(&self) -> Result<Vec<i64>, CatalogStoreError> {
        (**self).live_point_region_codes()
    }

    fn regions_with_points(&self) -> Result<Vec<i64>, CatalogStoreError> {
        (**self).regions_with_points()
    }

    fn live_point_coordinates(
        &self,
        region_code: i64,
    ) -> Result<Vec<Coord<f64>>, CatalogStoreError> {
        (**self).live_point_coordinates(region_code)
    }

    fn counts(&self) -> Result<CatalogCounts, CatalogStoreError> {
        (**self).counts()
    }
}
