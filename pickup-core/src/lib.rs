//! Core catalog model and queries for the pickup-point mirror.
//!
//! The crate defines the mirrored records ([`Region`], [`City`], [`Point`]),
//! the repository traits the synchronisation pipeline writes through, the
//! geometry used to derive region centroids, and [`GeoQueryService`], which
//! answers read-side lookups. The SQLite store lives behind the
//! `store-sqlite` feature.

#![forbid(unsafe_code)]

mod catalog;
pub mod geometry;
pub mod params;
mod query;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use catalog::{
    City, CityRecord, Dimensions, Phone, Point, PointRecord, PointSummary, Region, RegionRecord,
    WorkTime, WorkTimeException,
};
pub use params::{ParameterError, PointCode, SuggestText};
pub use query::{GeoQueryService, QueryError, SUGGESTION_LIMIT};
pub use store::{CatalogCounts, CatalogReader, CatalogStoreError, CatalogWriter};

#[cfg(feature = "store-sqlite")]
pub use store::{SCHEMA_VERSION, SqliteCatalogStore};
