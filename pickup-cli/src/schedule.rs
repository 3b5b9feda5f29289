//! `schedule` command: repeated refreshes on a cron expression.
//!
//! Runs never overlap. A tick that fires while the previous run is still
//! going is skipped with a warning.

use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pickup_core::SqliteCatalogStore;
use pickup_data::SyncReport;
use pickup_data::partner::{PageSizes, PartnerSource};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::query::open_catalog;
use crate::sync::{
    HttpSourceBuilder, PartnerSourceBuilder, RequiredEnv, SyncArgs, SyncSettings, sync_once,
};
use crate::{
    ARG_API_URL, ARG_CLIENT_ID, ARG_CLIENT_SECRET, ARG_COUNTRY_CODE, ARG_CRON, ARG_DATABASE,
    ARG_STRICT, ARG_TIMEOUT_SECS, CliError, DEFAULT_CRON,
};

const SCHEDULE_ENV: RequiredEnv = RequiredEnv {
    api_url: "PICKUP_CMDS_SCHEDULE_API_URL",
    client_id: "PICKUP_CMDS_SCHEDULE_CLIENT_ID",
    client_secret: "PICKUP_CMDS_SCHEDULE_CLIENT_SECRET",
};

/// CLI arguments for the `schedule` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "schedule",
    long_about = "Keep the local catalog fresh by running a full refresh \
                 whenever the cron expression fires (default: daily at \
                 03:00). Runs until interrupted with Ctrl-C.",
    about = "Refresh the local catalog on a schedule"
)]
#[ortho_config(prefix = "PICKUP")]
pub(crate) struct ScheduleArgs {
    /// Path to the SQLite catalog.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Partner API root.
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// OAuth client identifier.
    #[arg(long = ARG_CLIENT_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) client_id: Option<String>,
    /// OAuth client secret.
    #[arg(long = ARG_CLIENT_SECRET, value_name = "secret")]
    #[serde(default)]
    pub(crate) client_secret: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Country filter sent with every listing request.
    #[arg(long = ARG_COUNTRY_CODE, value_name = "code")]
    #[serde(default)]
    pub(crate) country_code: Option<String>,
    /// Fail on malformed pages instead of skipping them.
    #[arg(long = ARG_STRICT)]
    #[serde(default)]
    pub(crate) strict: bool,
    /// Six-field cron expression (seconds first).
    #[arg(long = ARG_CRON, value_name = "expr")]
    #[serde(default)]
    pub(crate) cron: Option<String>,
}

/// Resolved `schedule` settings.
#[derive(Debug)]
pub(crate) struct ScheduleSettings {
    pub(crate) sync: SyncSettings,
    pub(crate) cron: String,
}

impl TryFrom<ScheduleArgs> for ScheduleSettings {
    type Error = CliError;

    fn try_from(args: ScheduleArgs) -> Result<Self, Self::Error> {
        let cron = args.cron.unwrap_or_else(|| DEFAULT_CRON.to_owned());
        let sync = SyncSettings::resolve(
            SyncArgs {
                database: args.database,
                api_url: args.api_url,
                client_id: args.client_id,
                client_secret: args.client_secret,
                timeout_secs: args.timeout_secs,
                country_code: args.country_code,
                strict: args.strict,
            },
            SCHEDULE_ENV,
        )?;
        Ok(Self { sync, cron })
    }
}

pub(super) fn run_schedule(args: ScheduleArgs) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let settings = ScheduleSettings::try_from(merged)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(schedule_until_interrupted(&settings, &HttpSourceBuilder))
}

async fn schedule_until_interrupted(
    settings: &ScheduleSettings,
    builder: &dyn PartnerSourceBuilder,
) -> Result<(), CliError> {
    let source: Arc<dyn PartnerSource> = Arc::from(builder.build(&settings.sync)?);
    let store = Arc::new(open_catalog(&settings.sync.database)?);
    let job = scheduled_job(
        &settings.cron,
        source,
        store,
        settings.sync.page_sizes,
    )?;

    let mut scheduler = JobScheduler::new().await?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    log::info!("sync scheduled on '{}'; press Ctrl-C to stop", settings.cron);

    tokio::signal::ctrl_c().await.map_err(CliError::Signal)?;
    log::info!("interrupt received; stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

/// Build the cron job that refreshes `store` from `source`.
pub(crate) fn scheduled_job(
    cron: &str,
    source: Arc<dyn PartnerSource>,
    store: Arc<SqliteCatalogStore>,
    page_sizes: PageSizes,
) -> Result<Job, CliError> {
    let running = Arc::new(Mutex::new(()));
    let job = Job::new_async(cron, move |_id, _scheduler| {
        let source = Arc::clone(&source);
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        Box::pin(async move {
            if let Some(Err(err)) = run_tick(&running, &*source, &store, page_sizes).await {
                log::error!("scheduled sync failed: {err}");
            }
        })
    })?;
    Ok(job)
}

/// Run one refresh unless another still holds `running`.
///
/// Returns `None` when the tick was skipped.
pub(crate) async fn run_tick(
    running: &Mutex<()>,
    source: &dyn PartnerSource,
    store: &SqliteCatalogStore,
    page_sizes: PageSizes,
) -> Option<Result<SyncReport, CliError>> {
    let Ok(_guard) = running.try_lock() else {
        log::warn!("previous sync still running; skipping this tick");
        return None;
    };
    Some(sync_once(source, store, page_sizes).await)
}
