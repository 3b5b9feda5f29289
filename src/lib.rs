//! Facade crate for the pickup-point catalog mirror.
//!
//! This crate re-exports the catalog model, store traits and geographic
//! queries, and exposes the SQLite store and the partner synchronisation
//! pipeline behind feature flags.

#![forbid(unsafe_code)]

pub use pickup_core::{
    CatalogCounts, CatalogReader, CatalogStoreError, CatalogWriter, City, CityRecord,
    GeoQueryService, ParameterError, Point, PointCode, PointRecord, PointSummary, QueryError,
    Region, RegionRecord, SUGGESTION_LIMIT, SuggestText, geometry,
};

#[cfg(feature = "store-sqlite")]
pub use pickup_core::SqliteCatalogStore;

#[cfg(feature = "partner")]
pub use pickup_data::partner::{HttpPartnerClient, PartnerConfig, PartnerError, PartnerSource};
#[cfg(feature = "partner")]
pub use pickup_data::{SyncError, SyncPipeline, SyncReport, SyncStage};
