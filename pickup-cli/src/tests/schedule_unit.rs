//! Focused unit tests covering the schedule command.

use std::sync::Arc;

use super::*;
use crate::schedule::{ScheduleArgs, ScheduleSettings, run_tick, scheduled_job};
use pickup_core::SqliteCatalogStore;
use pickup_core::test_support::region_record;
use pickup_data::partner::PageSizes;
use pickup_data::partner::test_support::StubPartnerSource;
use rstest::{fixture, rstest};
use tokio::sync::Mutex;

#[fixture]
fn source() -> StubPartnerSource {
    StubPartnerSource::new().with_regions(vec![region_record(77, "Moscow")])
}

#[rstest]
fn schedule_defaults_to_a_daily_run() {
    let settings = ScheduleSettings::try_from(ScheduleArgs {
        api_url: Some("https://api.example.test/v2".to_owned()),
        client_id: Some("client".to_owned()),
        client_secret: Some("secret".to_owned()),
        ..ScheduleArgs::default()
    })
    .expect("settings");
    assert_eq!(settings.cron, DEFAULT_CRON);
    assert_eq!(settings.sync.api_url, "https://api.example.test/v2");
}

#[rstest]
fn schedule_names_its_own_environment_variables() {
    let err = ScheduleSettings::try_from(ScheduleArgs::default()).expect_err("missing url");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_API_URL);
            assert_eq!(env, "PICKUP_CMDS_SCHEDULE_API_URL");
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn ticks_run_a_full_sync(source: StubPartnerSource) {
    let store = SqliteCatalogStore::open_in_memory().expect("store");
    let running = Mutex::new(());
    let report = run_tick(&running, &source, &store, PageSizes::default())
        .await
        .expect("tick should run")
        .expect("sync should succeed");
    assert_eq!(report.regions, 1);
}

#[rstest]
#[tokio::test]
async fn ticks_are_skipped_while_a_run_is_active(source: StubPartnerSource) {
    let store = SqliteCatalogStore::open_in_memory().expect("store");
    let running = Mutex::new(());
    let _active = running.lock().await;
    let outcome = run_tick(&running, &source, &store, PageSizes::default()).await;
    assert!(outcome.is_none());
    assert!(source.requests().is_empty());
}

#[rstest]
#[case::default_expression(DEFAULT_CRON, true)]
#[case::every_minute("0 * * * * *", true)]
#[case::garbage("whenever", false)]
#[tokio::test]
async fn cron_expressions_are_validated(
    source: StubPartnerSource,
    #[case] cron: &str,
    #[case] valid: bool,
) {
    let store = Arc::new(SqliteCatalogStore::open_in_memory().expect("store"));
    let result = scheduled_job(cron, Arc::new(source), store, PageSizes::default());
    match (result, valid) {
        (Ok(_), true) | (Err(CliError::Scheduler(_)), false) => {}
        (Ok(_), false) => panic!("{cron:?} should be rejected"),
        (Err(err), _) => panic!("unexpected error for {cron:?}: {err:?}"),
    }
}
