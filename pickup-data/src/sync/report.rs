//! Run outcome and failure types for the sync pipeline.

use std::fmt;

use pickup_core::CatalogStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::partner::PartnerError;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    /// Upsert regions.
    Regions,
    /// Upsert cities.
    Cities,
    /// Tombstone every point, then upsert the reported ones.
    Points,
    /// Recompute `points_qty` per city.
    CityPointCounts,
    /// Recompute `has_points` per region.
    RegionFlags,
    /// Derive region centroids.
    RegionCentroids,
}

impl SyncStage {
    /// Every stage in execution order.
    pub const ALL: [Self; 6] = [
        Self::Regions,
        Self::Cities,
        Self::Points,
        Self::CityPointCounts,
        Self::RegionFlags,
        Self::RegionCentroids,
    ];

    /// Human-readable stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::Cities => "cities",
            Self::Points => "points",
            Self::CityPointCounts => "city point counts",
            Self::RegionFlags => "region flags",
            Self::RegionCentroids => "region centroids",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a pipeline run.
///
/// Stages completed before the failure stay committed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading from the partner failed.
    #[error("{stage} stage failed to read from the partner API")]
    Partner {
        /// Stage that failed.
        stage: SyncStage,
        /// Underlying partner error.
        #[source]
        source: PartnerError,
    },
    /// Writing to or reading from the catalog failed.
    #[error("{stage} stage failed to update the catalog")]
    Store {
        /// Stage that failed.
        stage: SyncStage,
        /// Underlying store error.
        #[source]
        source: CatalogStoreError,
    },
}

impl SyncError {
    /// Stage that failed.
    #[must_use]
    pub const fn stage(&self) -> SyncStage {
        match self {
            Self::Partner { stage, .. } | Self::Store { stage, .. } => *stage,
        }
    }
}

/// Counts gathered during one successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncReport {
    /// Region records upserted.
    pub regions: usize,
    /// City records upserted.
    pub cities: usize,
    /// Point records upserted.
    pub points: usize,
    /// Points left tombstoned because the feed no longer reports them.
    pub tombstoned: usize,
    /// Distinct cities referenced by live points.
    pub cities_with_points: usize,
    /// Regions referenced by live points.
    pub regions_with_points: usize,
    /// Regions that received a centroid.
    pub regions_located: usize,
}
