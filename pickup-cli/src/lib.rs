//! Command-line interface for the pickup-point catalog mirror.
//!
//! `sync` refreshes the local catalog from the partner API once, `schedule`
//! keeps doing so on a cron expression, and the remaining subcommands answer
//! lookups against the local database and print pretty JSON.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod error;
mod query;
mod schedule;
mod sync;

pub use error::CliError;

use query::{NearestCityArgs, PointArgs, PointsByBoundsArgs, PointsByCityArgs, SuggestCitiesArgs};
use schedule::ScheduleArgs;
use sync::SyncArgs;

const ARG_DATABASE: &str = "database";
const ARG_API_URL: &str = "api-url";
const ARG_CLIENT_ID: &str = "client-id";
const ARG_CLIENT_SECRET: &str = "client-secret";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ARG_COUNTRY_CODE: &str = "country-code";
const ARG_STRICT: &str = "strict";
const ARG_CRON: &str = "cron";

/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "catalog.db";
/// Daily at 03:00, in the six-field cron syntax with seconds.
pub const DEFAULT_CRON: &str = "0 0 3 * * *";

/// Run the pickup CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli, &mut stdout)
}

fn dispatch(cli: Cli, writer: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Sync(args) => sync::run_sync(args, writer),
        Command::Schedule(args) => schedule::run_schedule(args),
        Command::NearestCity(args) => query::run_nearest_city(&args, writer),
        Command::SuggestCities(args) => query::run_suggest_cities(&args, writer),
        Command::Point(args) => query::run_point(&args, writer),
        Command::PointsByCity(args) => query::run_points_by_city(&args, writer),
        Command::PointsByBounds(args) => query::run_points_by_bounds(&args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "pickup",
    about = "Mirror a delivery partner's pickup-point catalog and query it",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the local catalog from the partner API once.
    Sync(SyncArgs),
    /// Refresh the catalog on a cron schedule until interrupted.
    Schedule(ScheduleArgs),
    /// Find the city with pickup points closest to a coordinate.
    NearestCity(NearestCityArgs),
    /// Suggest cities whose name or region contains some text.
    SuggestCities(SuggestCitiesArgs),
    /// Show one pickup point by code.
    Point(PointArgs),
    /// List pickup points in a city.
    PointsByCity(PointsByCityArgs),
    /// List pickup points inside a bounding box.
    PointsByBounds(PointsByBoundsArgs),
}

fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
