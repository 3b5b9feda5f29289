//! Test helpers for seeding catalogs and driving the CLI in-process.

use super::*;
use camino::Utf8PathBuf;
use geo::Coord;
use pickup_core::test_support::{point_record, region_record};
use pickup_core::{CatalogWriter, CityRecord, SqliteCatalogStore};
use tempfile::TempDir;

pub(super) const MOSCOW: i64 = 100;
pub(super) const TVER: i64 = 300;
pub(super) const ZELENOGRAD: i64 = 400;

fn city(code: i64, name: &str, region_code: i64, at: Coord<f64>) -> CityRecord {
    CityRecord {
        code,
        city: name.to_owned(),
        region: if region_code == 77 {
            "Moscow".to_owned()
        } else {
            "Tver Oblast".to_owned()
        },
        region_code,
        longitude: at.x,
        latitude: at.y,
    }
}

/// A catalog on disk holding two cities with points and one without.
pub(super) struct CatalogFixture {
    _dir: TempDir,
    pub(super) database: Utf8PathBuf,
}

impl CatalogFixture {
    pub(super) fn empty() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _dir: dir,
            database: root.join("catalog.db"),
        }
    }

    /// A catalog file carrying the schema but no rows.
    pub(super) fn initialised() -> Self {
        let fixture = Self::empty();
        SqliteCatalogStore::open(&fixture.database).expect("create catalog");
        fixture
    }

    pub(super) fn seeded() -> Self {
        let fixture = Self::empty();
        let store = SqliteCatalogStore::open(&fixture.database).expect("open catalog");
        store
            .upsert_regions(&[region_record(77, "Moscow"), region_record(69, "Tver Oblast")])
            .expect("seed regions");
        store
            .upsert_cities(&[
                city(MOSCOW, "Moscow", 77, Coord { x: 37.62, y: 55.75 }),
                city(TVER, "Tver", 69, Coord { x: 35.90, y: 56.86 }),
                city(ZELENOGRAD, "Zelenograd", 77, Coord { x: 37.20, y: 55.98 }),
            ])
            .expect("seed cities");
        store
            .upsert_points(&[
                point_record("MSK1", 77, MOSCOW, Coord { x: 37.60, y: 55.70 }),
                point_record("MSK2", 77, MOSCOW, Coord { x: 37.70, y: 55.80 }),
                point_record("TVR1", 69, TVER, Coord { x: 35.90, y: 56.86 }),
            ])
            .expect("seed points");
        store
            .replace_city_points_qty(&[(MOSCOW, 2), (TVER, 1)])
            .expect("seed counts");
        fixture
    }

    pub(super) fn arg(&self) -> String {
        format!("--{ARG_DATABASE}={}", self.database)
    }
}

/// Parse `argv` and run it, capturing stdout.
pub(super) fn run_cli<I, S>(argv: I) -> (Result<(), CliError>, String)
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
{
    let mut stdout = Vec::new();
    let result = Cli::try_parse_from(argv)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| dispatch(cli, &mut stdout));
    let output = String::from_utf8(stdout).expect("utf-8 output");
    (result, output)
}
