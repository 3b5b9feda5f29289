//! `sync` command implementation.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pickup_core::SqliteCatalogStore;
use pickup_data::{SyncPipeline, SyncReport};
use pickup_data::partner::{
    DEFAULT_COUNTRY_CODE, DEFAULT_TIMEOUT_SECS, HttpPartnerClient, PageSizes, PartnerConfig,
    PartnerSource,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::query::open_catalog;
use crate::{
    ARG_API_URL, ARG_CLIENT_ID, ARG_CLIENT_SECRET, ARG_COUNTRY_CODE, ARG_DATABASE, ARG_STRICT,
    ARG_TIMEOUT_SECS, CliError, DEFAULT_DATABASE, write_json,
};

pub(crate) const ENV_SYNC_API_URL: &str = "PICKUP_CMDS_SYNC_API_URL";
pub(crate) const ENV_SYNC_CLIENT_ID: &str = "PICKUP_CMDS_SYNC_CLIENT_ID";
pub(crate) const ENV_SYNC_CLIENT_SECRET: &str = "PICKUP_CMDS_SYNC_CLIENT_SECRET";

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "sync",
    long_about = "Run one full refresh: regions, cities and points are paged \
                 from the partner API into the local catalog, then city \
                 counts, region flags and region centroids are recomputed. \
                 Credentials can come from CLI flags, configuration files, \
                 or environment variables.",
    about = "Refresh the local catalog once"
)]
#[ortho_config(prefix = "PICKUP")]
pub(crate) struct SyncArgs {
    /// Path to the SQLite catalog.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Partner API root, e.g. "https://api.cdek.ru/v2".
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
}

impl SyncArgs {
    pub(crate) fn into_settings(self) -> Result<SyncSettings, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncSettings::try_from(merged)
    }
}

/// Environment variables named in missing-argument errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequiredEnv {
    pub(crate) api_url: &'static str,
    pub(crate) client_id: &'static str,
    pub(crate) client_secret: &'static str,
}

const SYNC_ENV: RequiredEnv = RequiredEnv {
    api_url: ENV_SYNC_API_URL,
    client_id: ENV_SYNC_CLIENT_ID,
    client_secret: ENV_SYNC_CLIENT_SECRET,
};

/// Resolved settings for one refresh.
#[derive(Debug)]
pub(crate) struct SyncSettings {
    pub(crate) database: Utf8PathBuf,
    pub(crate) api_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: SecretString,
    pub(crate) timeout: Duration,
    pub(crate) country_code: String,
    pub(crate) strict: bool,
    pub(crate) page_sizes: PageSizes,
}

impl SyncSettings {
    /// Resolve merged values, naming `env` when a required one is missing.
    pub(crate) fn resolve(args: SyncArgs, env: RequiredEnv) -> Result<Self, CliError> {
        let api_url = args.api_url.ok_or(CliError::MissingArgument {
            field: ARG_API_URL,
            env: env.api_url,
        })?;
        let client_id = args.client_id.ok_or(CliError::MissingArgument {
            field: ARG_CLIENT_ID,
            env: env.client_id,
        })?;
        let client_secret = args.client_secret.ok_or(CliError::MissingArgument {
            field: ARG_CLIENT_SECRET,
            env: env.client_secret,
        })?;
        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            api_url,
            client_id,
            client_secret: SecretString::from(client_secret),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            country_code: args
                .country_code
                .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_owned()),
            strict: args.strict,
            page_sizes: PageSizes::default(),
        })
    }

    fn partner_config(&self) -> PartnerConfig {
        PartnerConfig::new(
            self.api_url.as_str(),
            self.client_id.as_str(),
            SecretString::from(self.client_secret.expose_secret()),
        )
        .with_timeout(self.timeout)
        .with_country_code(self.country_code.as_str())
        .with_strict(self.strict)
    }
}

impl TryFrom<SyncArgs> for SyncSettings {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        Self::resolve(args, SYNC_ENV)
    }
}

/// Builds the partner source for a refresh.
pub(crate) trait PartnerSourceBuilder {
    fn build(&self, settings: &SyncSettings) -> Result<Box<dyn PartnerSource>, CliError>;
}

pub(crate) struct HttpSourceBuilder;

impl PartnerSourceBuilder for HttpSourceBuilder {
    fn build(&self, settings: &SyncSettings) -> Result<Box<dyn PartnerSource>, CliError> {
        let client = HttpPartnerClient::new(settings.partner_config()).map_err(|source| {
            CliError::BuildPartnerClient {
                base_url: settings.api_url.clone(),
                source,
            }
        })?;
        Ok(Box::new(client))
    }
}

pub(super) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let settings = args.into_settings()?;
    run_sync_with(&settings, &HttpSourceBuilder, writer)
}

pub(super) fn run_sync_with(
    settings: &SyncSettings,
    builder: &dyn PartnerSourceBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let source = builder.build(settings)?;
    let store = open_catalog(&settings.database)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let report = runtime.block_on(sync_once(&*source, &store, settings.page_sizes))?;
    write_json(writer, &report)
}

pub(crate) async fn sync_once(
    source: &dyn PartnerSource,
    store: &SqliteCatalogStore,
    page_sizes: PageSizes,
) -> Result<SyncReport, CliError> {
    let report = SyncPipeline::new(source, store)
        .with_page_sizes(page_sizes)
        .run_full()
        .await?;
    log::info!(
        "sync finished: {} points, {} tombstoned, {} regions located",
        report.points,
        report.tombstoned,
        report.regions_located
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) fn settings_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncSettings, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncSettings::try_from(merged)
}
