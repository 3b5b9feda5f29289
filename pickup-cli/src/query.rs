//! Lookup subcommands answered from the local catalog.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::Parser;
use pickup_core::params::coordinate;
use pickup_core::{GeoQueryService, PointCode, SqliteCatalogStore, SuggestText};

use crate::{ARG_DATABASE, CliError, DEFAULT_DATABASE, write_json};

/// Location of the catalog database shared by every lookup.
#[derive(Debug, Clone, Parser)]
pub(crate) struct CatalogArg {
    /// Path to the SQLite catalog.
    #[arg(long = ARG_DATABASE, value_name = "path", default_value = DEFAULT_DATABASE)]
    pub(crate) database: Utf8PathBuf,
}

/// CLI arguments for the `nearest-city` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct NearestCityArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArg,
    /// Longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lng: f64,
    /// Latitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lat: f64,
}

/// CLI arguments for the `suggest-cities` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct SuggestCitiesArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArg,
    /// Fragment of a city or region name, at least three characters.
    #[arg(value_name = "text")]
    pub(crate) text: String,
}

/// CLI arguments for the `point` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct PointArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArg,
    /// Partner point code.
    #[arg(value_name = "code")]
    pub(crate) code: String,
}

/// CLI arguments for the `points-by-city` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct PointsByCityArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArg,
    /// Partner city code.
    #[arg(value_name = "code")]
    pub(crate) city_code: i64,
}

/// CLI arguments for the `points-by-bounds` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct PointsByBoundsArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArg,
    /// Longitude of the north-west corner.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) nw_lng: f64,
    /// Latitude of the north-west corner.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) nw_lat: f64,
    /// Longitude of the south-east corner.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) se_lng: f64,
    /// Latitude of the south-east corner.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) se_lat: f64,
}

/// Open or create the catalog a sync writes into.
pub(crate) fn open_catalog(path: &Utf8Path) -> Result<SqliteCatalogStore, CliError> {
    SqliteCatalogStore::open(path).map_err(|source| CliError::OpenCatalog {
        path: path.to_path_buf(),
        source,
    })
}

/// Open an existing catalog for lookups, refusing to create one.
pub(crate) fn open_existing_catalog(path: &Utf8Path) -> Result<SqliteCatalogStore, CliError> {
    require_existing(path, ARG_DATABASE)?;
    SqliteCatalogStore::open_read_only(path).map_err(|source| CliError::OpenCatalog {
        path: path.to_path_buf(),
        source,
    })
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::CatalogNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingCatalog {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectCatalog {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn file_is_file(path: &Utf8Path) -> std::io::Result<bool> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

pub(crate) fn run_nearest_city(
    args: &NearestCityArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let at = coordinate(args.lng, args.lat, "lng", "lat")?;
    let store = open_existing_catalog(&args.catalog.database)?;
    let city = GeoQueryService::new(&store).nearest_city(at)?;
    write_json(writer, &city)
}

pub(crate) fn run_suggest_cities(
    args: &SuggestCitiesArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let text = SuggestText::new(args.text.as_str())?;
    let store = open_existing_catalog(&args.catalog.database)?;
    let cities = GeoQueryService::new(&store).suggest_cities(&text)?;
    write_json(writer, &cities)
}

pub(crate) fn run_point(args: &PointArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let code = PointCode::new(args.code.as_str())?;
    let store = open_existing_catalog(&args.catalog.database)?;
    let point = GeoQueryService::new(&store).point_by_code(&code)?;
    write_json(writer, &point)
}

pub(crate) fn run_points_by_city(
    args: &PointsByCityArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let store = open_existing_catalog(&args.catalog.database)?;
    let points = GeoQueryService::new(&store).points_by_city(args.city_code)?;
    write_json(writer, &points)
}

pub(crate) fn run_points_by_bounds(
    args: &PointsByBoundsArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let north_west = coordinate(args.nw_lng, args.nw_lat, "nw-lng", "nw-lat")?;
    let south_east = coordinate(args.se_lng, args.se_lat, "se-lng", "se-lat")?;
    let store = open_existing_catalog(&args.catalog.database)?;
    let points = GeoQueryService::new(&store).points_by_bounds(north_west, south_east)?;
    write_json(writer, &points)
}
