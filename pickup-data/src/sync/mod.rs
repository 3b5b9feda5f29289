//! Full-catalog synchronisation.
//!
//! [`SyncPipeline::run_full`] runs six stages strictly in sequence:
//!
//! 1. page through regions and upsert them;
//! 2. page through cities and upsert them;
//! 3. tombstone every point, then page through points and upsert them,
//!    which revives the ones still reported;
//! 4. recount live points per city;
//! 5. flag regions that hold live points;
//! 6. derive a centroid for every flagged region.
//!
//! Each listing stops at the first empty page. A failure aborts the run and
//! names its stage; earlier stages stay committed and the next run starts
//! again from the regions.

mod report;

use std::future::Future;

use pickup_core::geometry::region_coordinate;
use pickup_core::{CatalogStoreError, CatalogWriter};

use crate::partner::{PageSizes, PartnerError, PartnerSource};

pub use report::{SyncError, SyncReport, SyncStage};

/// Drives one catalog refresh from a [`PartnerSource`] into a
/// [`CatalogWriter`].
///
/// The pipeline holds no state between runs and knows nothing about
/// scheduling.
///
/// # Examples
/// ```
/// use pickup_core::{CatalogReader, RegionRecord, SqliteCatalogStore};
/// use pickup_data::partner::test_support::StubPartnerSource;
/// use pickup_data::sync::SyncPipeline;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// # runtime.block_on(async {
/// let source = StubPartnerSource::new().with_regions(vec![RegionRecord {
///     region_code: 77,
///     region: "Moscow".into(),
/// }]);
/// let store = SqliteCatalogStore::open_in_memory()?;
/// let report = SyncPipeline::new(&source, &store).run_full().await?;
/// assert_eq!(report.regions, 1);
/// assert!(!store.region(77)?.expect("stored").has_points);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # })
/// # }
/// ```
#[derive(Debug)]
pub struct SyncPipeline<'a, P: ?Sized, W: ?Sized> {
    source: &'a P,
    store: &'a W,
    page_sizes: PageSizes,
}

impl<'a, P, W> SyncPipeline<'a, P, W>
where
    P: PartnerSource + ?Sized,
    W: CatalogWriter + ?Sized,
{
    /// Pair a partner source with a catalog, using default page sizes.
    pub fn new(source: &'a P, store: &'a W) -> Self {
        Self {
            source,
            store,
            page_sizes: PageSizes::default(),
        }
    }

    /// Override the page sizes requested from the partner.
    #[must_use]
    pub fn with_page_sizes(mut self, page_sizes: PageSizes) -> Self {
        self.page_sizes = page_sizes;
        self
    }

    /// Run every stage once.
    ///
    /// # Errors
    /// Returns [`SyncError`] naming the first stage that failed.
    pub async fn run_full(&self) -> Result<SyncReport, SyncError> {
        let regions = self.sync_regions().await?;
        log::info!("synchronised {regions} regions");

        let cities = self.sync_cities().await?;
        log::info!("synchronised {cities} cities");

        let (points, tombstoned) = self.sync_points().await?;
        log::info!("synchronised {points} points, {tombstoned} tombstoned");

        let cities_with_points = self.recount_city_points()?;
        log::info!("{cities_with_points} cities have pickup points");

        let regions_with_points = self.flag_regions()?;
        log::info!("{regions_with_points} regions have pickup points");

        let regions_located = self.locate_regions()?;
        log::info!("located {regions_located} regions");

        Ok(SyncReport {
            regions,
            cities,
            points,
            tombstoned,
            cities_with_points,
            regions_with_points,
            regions_located,
        })
    }

    async fn sync_regions(&self) -> Result<usize, SyncError> {
        let size = self.page_sizes.regions;
        drain(
            SyncStage::Regions,
            |page| self.source.regions(page, size),
            |records| self.store.upsert_regions(records),
        )
        .await
    }

    async fn sync_cities(&self) -> Result<usize, SyncError> {
        let size = self.page_sizes.cities;
        drain(
            SyncStage::Cities,
            |page| self.source.cities(page, size),
            |records| self.store.upsert_cities(records),
        )
        .await
    }

    async fn sync_points(&self) -> Result<(usize, usize), SyncError> {
        let stage = SyncStage::Points;
        let size = self.page_sizes.points;
        self.store
            .mark_all_points_deleted()
            .map_err(store_error(stage))?;
        let upserted = drain(
            stage,
            |page| self.source.points(page, size),
            |records| self.store.upsert_points(records),
        )
        .await?;
        let tombstoned = self.store.counts().map_err(store_error(stage))?.deleted_points;
        Ok((upserted, tombstoned))
    }

    fn recount_city_points(&self) -> Result<usize, SyncError> {
        let stage = SyncStage::CityPointCounts;
        let counts = self
            .store
            .live_point_counts_by_city()
            .map_err(store_error(stage))?;
        self.store
            .replace_city_points_qty(&counts)
            .map_err(store_error(stage))?;
        Ok(counts.len())
    }

    fn flag_regions(&self) -> Result<usize, SyncError> {
        let stage = SyncStage::RegionFlags;
        let region_codes = self
            .store
            .live_point_region_codes()
            .map_err(store_error(stage))?;
        self.store
            .replace_region_has_points(&region_codes)
            .map_err(store_error(stage))?;
        // Points may reference regions the feed never listed.
        Ok(self
            .store
            .regions_with_points()
            .map_err(store_error(stage))?
            .len())
    }

    fn locate_regions(&self) -> Result<usize, SyncError> {
        let stage = SyncStage::RegionCentroids;
        let mut located = Vec::new();
        for region_code in self
            .store
            .regions_with_points()
            .map_err(store_error(stage))?
        {
            let points = self
                .store
                .live_point_coordinates(region_code)
                .map_err(store_error(stage))?;
            if let Some(centroid) = region_coordinate(&points) {
                located.push((region_code, centroid));
            }
        }
        self.store
            .set_region_coordinates(&located)
            .map_err(store_error(stage))?;
        Ok(located.len())
    }
}

fn store_error(stage: SyncStage) -> impl FnOnce(CatalogStoreError) -> SyncError {
    move |source| SyncError::Store { stage, source }
}

/// Fetch pages from zero until one comes back empty, writing each as it
/// arrives. Returns the number of records written.
async fn drain<T, Fut>(
    stage: SyncStage,
    mut fetch: impl FnMut(u32) -> Fut,
    mut write: impl FnMut(&[T]) -> Result<usize, CatalogStoreError>,
) -> Result<usize, SyncError>
where
    Fut: Future<Output = Result<Vec<T>, PartnerError>>,
{
    let mut written = 0;
    let mut page = 0_u32;
    loop {
        let records = fetch(page)
            .await
            .map_err(|source| SyncError::Partner { stage, source })?;
        if records.is_empty() {
            return Ok(written);
        }
        log::debug!("{stage}: page {page} holds {} records", records.len());
        written += write(records.as_slice()).map_err(store_error(stage))?;
        page = page.saturating_add(1);
    }
}
