//! Error types emitted by the pickup CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use pickup_core::{CatalogStoreError, ParameterError, QueryError};
use pickup_data::SyncError;
use pickup_data::partner::PartnerError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors emitted by the pickup CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A query argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidParameter(#[from] ParameterError),
    /// The catalog database named for a lookup does not exist.
    #[error("{field} path {path:?} does not exist; run `pickup sync` first")]
    MissingCatalog {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The catalog path names something other than a file.
    #[error("{field} path {path:?} exists but is not a file")]
    CatalogNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// Inspecting the catalog path failed.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectCatalog {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the catalog database failed.
    #[error("failed to open catalog at {path:?}: {source}")]
    OpenCatalog {
        path: Utf8PathBuf,
        #[source]
        source: CatalogStoreError,
    },
    /// A lookup failed or found nothing.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Constructing the partner client failed.
    #[error("failed to build partner client for {base_url:?}: {source}")]
    BuildPartnerClient {
        base_url: String,
        #[source]
        source: PartnerError,
    },
    /// A synchronisation run failed.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
    /// Starting the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The cron scheduler rejected the job or failed to run.
    #[error("scheduler failed: {0}")]
    Scheduler(#[from] JobSchedulerError),
    /// Waiting for the interrupt signal failed.
    #[error("failed to listen for interrupt: {0}")]
    Signal(#[source] std::io::Error),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
