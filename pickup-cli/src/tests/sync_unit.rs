//! Focused unit tests covering the sync command wiring.

use super::helpers::{CatalogFixture, MOSCOW};
use super::*;
use crate::sync::{PartnerSourceBuilder, SyncSettings, run_sync_with, sync_once};
use geo::Coord;
use pickup_core::test_support::{city_record, point_record, region_record};
use pickup_core::{CatalogReader, SqliteCatalogStore};
use pickup_data::partner::{PageSizes, PartnerResource, PartnerSource};
use pickup_data::partner::test_support::StubPartnerSource;
use rstest::rstest;
use serde_json::Value;

struct StubSourceBuilder;

impl PartnerSourceBuilder for StubSourceBuilder {
    fn build(&self, _settings: &SyncSettings) -> Result<Box<dyn PartnerSource>, CliError> {
        Ok(Box::new(
            StubPartnerSource::new()
                .with_regions(vec![region_record(77, "Moscow")])
                .with_cities(vec![city_record(MOSCOW, "Moscow", 77)])
                .with_points(vec![
                    point_record("MSK1", 77, MOSCOW, Coord { x: 37.60, y: 55.70 }),
                    point_record("MSK2", 77, MOSCOW, Coord { x: 37.70, y: 55.80 }),
                    point_record("MSK3", 77, MOSCOW, Coord { x: 37.65, y: 55.90 }),
                ]),
        ))
    }
}

fn settings_for(catalog: &CatalogFixture) -> SyncSettings {
    SyncSettings::try_from(SyncArgs {
        database: Some(catalog.database.clone()),
        api_url: Some("https://api.example.test/v2".to_owned()),
        client_id: Some("client".to_owned()),
        client_secret: Some("secret".to_owned()),
        ..SyncArgs::default()
    })
    .expect("settings")
}

#[rstest]
fn sync_prints_the_report_and_fills_the_catalog() {
    let catalog = CatalogFixture::empty();
    let mut stdout = Vec::new();
    run_sync_with(&settings_for(&catalog), &StubSourceBuilder, &mut stdout).expect("sync");

    let report: Value = serde_json::from_slice(&stdout).expect("report JSON");
    assert_eq!(report["regions"], 1);
    assert_eq!(report["points"], 3);
    assert_eq!(report["tombstoned"], 0);
    assert_eq!(report["regions_located"], 1);

    let store = SqliteCatalogStore::open(&catalog.database).expect("reopen");
    let city = store.city(MOSCOW).expect("lookup").expect("city stored");
    assert_eq!(city.points_qty, 3);
    assert!(store.region(77).expect("lookup").expect("region").has_points);
}

#[rstest]
fn sync_failures_surface_their_stage() {
    struct FailingBuilder;

    impl PartnerSourceBuilder for FailingBuilder {
        fn build(&self, _settings: &SyncSettings) -> Result<Box<dyn PartnerSource>, CliError> {
            let source = StubPartnerSource::new();
            source.fail_with_status(pickup_data::partner::PartnerResource::Regions, 401);
            Ok(Box::new(source))
        }
    }

    let catalog = CatalogFixture::empty();
    let mut stdout = Vec::new();
    let err = run_sync_with(&settings_for(&catalog), &FailingBuilder, &mut stdout)
        .expect_err("sync should fail");
    match err {
        CliError::Sync(sync_err) => {
            assert_eq!(sync_err.stage(), pickup_data::SyncStage::Regions);
        }
        other => panic!("expected Sync, found {other:?}"),
    }
    assert!(stdout.is_empty());
}

#[rstest]
#[tokio::test]
async fn sync_requests_pages_of_the_configured_sizes() {
    let catalog = CatalogFixture::empty();
    let mut settings = settings_for(&catalog);
    settings.page_sizes = PageSizes {
        regions: 7,
        cities: 11,
        points: 2,
    };
    let source = StubPartnerSource::new()
        .with_regions(vec![region_record(77, "Moscow")])
        .with_cities(vec![city_record(MOSCOW, "Moscow", 77)])
        .with_points(vec![
            point_record("MSK1", 77, MOSCOW, Coord { x: 37.60, y: 55.70 }),
            point_record("MSK2", 77, MOSCOW, Coord { x: 37.70, y: 55.80 }),
            point_record("MSK3", 77, MOSCOW, Coord { x: 37.65, y: 55.90 }),
        ]);
    let store = SqliteCatalogStore::open_in_memory().expect("store");

    let report = sync_once(&source, &store, settings.page_sizes)
        .await
        .expect("sync");

    assert_eq!(report.points, 3);
    let requests = source.requests();
    assert!(!requests.is_empty());
    for (resource, page, size) in requests {
        let expected = match resource {
            PartnerResource::Regions => 7,
            PartnerResource::Cities => 11,
            PartnerResource::Points => 2,
        };
        assert_eq!(size, expected, "{resource:?} page {page}");
    }
}
