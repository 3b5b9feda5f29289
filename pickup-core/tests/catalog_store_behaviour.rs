//! Behavioural tests for `SqliteCatalogStore` using rstest-bdd.
#![expect(clippy::expect_used, reason = "steps unwrap store results they just produced")]

use std::cell::RefCell;

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use pickup_core::{
    CatalogReader, CatalogWriter, City, CityRecord, GeoQueryService, PointRecord, RegionRecord,
    SqliteCatalogStore, SuggestText,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug)]
struct CatalogWorld {
    temp_dir: TempDir,
    path: RefCell<Option<Utf8PathBuf>>,
    store: RefCell<Option<SqliteCatalogStore>>,
    suggestions: RefCell<Vec<City>>,
}

impl CatalogWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            path: RefCell::new(None),
            store: RefCell::new(None),
            suggestions: RefCell::new(Vec::new()),
        }
    }

    fn open(&self) {
        let path = self
            .path
            .borrow()
            .clone()
            .expect("database path should be chosen first");
        // Drop any previous handle before reopening the same file.
        self.store.replace(None);
        let store = SqliteCatalogStore::open(&path).expect("open catalog");
        self.store.replace(Some(store));
    }

    fn with_store<T>(&self, f: impl FnOnce(&SqliteCatalogStore) -> T) -> T {
        let borrowed = self.store.borrow();
        let store = borrowed.as_ref().expect("store should be open");
        f(store)
    }
}

#[fixture]
fn world() -> CatalogWorld {
    CatalogWorld::new()
}

fn city(code: i64, name: &str) -> CityRecord {
    CityRecord {
        code,
        city: name.to_owned(),
        region: "Novgorod Oblast".to_owned(),
        region_code: 53,
        longitude: 31.27,
        latitude: 58.52,
    }
}

fn point(code: &str, city_code: i64, seed: u128) -> PointRecord {
    PointRecord {
        code: code.to_owned(),
        uuid: Uuid::from_u128(seed),
        name: format!("Pickup {code}"),
        region_code: 53,
        city_code,
        longitude: 31.27,
        latitude: 58.52,
        address: format!("{code} street"),
        address_full: format!("Veliky Novgorod, {code} street"),
        work_time: "Mon-Fri 09:00-21:00".to_owned(),
        point_type: "PVZ".to_owned(),
        owner_code: "cdek".to_owned(),
        ..PointRecord::default()
    }
}

#[given("a catalog database in a nested temporary directory")]
fn given_database(world: &CatalogWorld) {
    let root = Utf8Path::from_path(world.temp_dir.path()).expect("utf-8 temp dir");
    world
        .path
        .replace(Some(root.join("state/catalog/catalog.db")));
    world.open();
}

#[when("I store a city with two pickup points")]
fn store_city_with_points(world: &CatalogWorld) {
    world.with_store(|store| {
        store
            .upsert_regions(&[RegionRecord {
                region_code: 53,
                region: "Novgorod Oblast".to_owned(),
            }])
            .expect("store region");
        store
            .upsert_cities(&[city(100, "Veliky Novgorod")])
            .expect("store city");
        store
            .upsert_points(&[point("VNG1", 100, 1), point("VNG2", 100, 2)])
            .expect("store points");
    });
}

#[when("I reopen the catalog database")]
fn reopen(world: &CatalogWorld) {
    world.open();
}

#[when("every point is tombstoned and one is reported again")]
fn tombstone_and_revive(world: &CatalogWorld) {
    world.with_store(|store| {
        store.mark_all_points_deleted().expect("tombstone points");
        store
            .upsert_points(&[point("VNG2", 100, 2)])
            .expect("revive point");
    });
}

#[when("I store cities with differing point counts")]
fn store_ranked_cities(world: &CatalogWorld) {
    world.with_store(|store| {
        store
            .upsert_cities(&[
                city(1, "Borovichi"),
                city(2, "Novgorod"),
                city(3, "Staraya Russa"),
            ])
            .expect("store cities");
        store
            .replace_city_points_qty(&[(1, 2), (2, 9)])
            .expect("store counts");
    });
}

#[when("I ask for suggestions matching a shared fragment")]
fn ask_for_suggestions(world: &CatalogWorld) {
    let found = world.with_store(|store| {
        let text = SuggestText::new("NOVGOROD").expect("valid text");
        GeoQueryService::new(store)
            .suggest_cities(&text)
            .expect("suggest cities")
    });
    world.suggestions.replace(found);
}

#[then("the catalog reports two live points")]
fn then_two_live_points(world: &CatalogWorld) {
    let counts = world.with_store(|store| store.counts().expect("counts"));
    assert_eq!(counts.regions, 1);
    assert_eq!(counts.cities, 1);
    assert_eq!(counts.live_points, 2);
    assert_eq!(counts.deleted_points, 0);
}

#[then("the city listing contains only the reported point")]
fn then_only_revived_listed(world: &CatalogWorld) {
    let listed = world.with_store(|store| store.points_in_city(100).expect("list city"));
    let codes: Vec<_> = listed.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, ["VNG2"]);
}

#[then("the tombstoned point can still be looked up by code")]
fn then_tombstone_visible_by_code(world: &CatalogWorld) {
    let found = world.with_store(|store| store.point_by_code("VNG1").expect("lookup"));
    let found = found.expect("tombstoned point should remain stored");
    assert!(found.is_deleted);
    assert_eq!(found.record.location(), Coord { x: 31.27, y: 58.52 });
}

#[then("the suggestions are ordered by point count")]
fn then_ranked(world: &CatalogWorld) {
    let codes: Vec<_> = world
        .suggestions
        .borrow()
        .iter()
        .map(|c| c.code)
        .collect();
    // Staraya Russa has no points and is left out despite the region match.
    assert_eq!(codes, [2, 1]);
}

#[scenario(path = "tests/features/catalog_store.feature", index = 0)]
fn catalog_survives_reopen(world: CatalogWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/catalog_store.feature", index = 1)]
fn tombstones_hidden(world: CatalogWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/catalog_store.feature", index = 2)]
fn suggestions_ranked(world: CatalogWorld) {
    let _ = world;
}
