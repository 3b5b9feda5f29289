//! Read-side geographic queries over the mirrored catalog.

use geo::{Coord, Rect};
use thiserror::Error;

use crate::geometry::great_circle_miles;
use crate::params::{PointCode, SuggestText};
use crate::store::{CatalogReader, CatalogStoreError};
use crate::{City, Point, PointSummary};

/// Maximum number of cities returned by [`GeoQueryService::suggest_cities`].
pub const SUGGESTION_LIMIT: usize = 10;

/// Errors returned by [`GeoQueryService`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// No city with live points exists, so nothing can be nearest.
    #[error("no city with pickup points found")]
    CityNotFound,
    /// No point carries the requested code.
    #[error("pickup point {code} not found")]
    PointNotFound {
        /// Code that was looked up.
        code: String,
    },
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] CatalogStoreError),
}

/// Answers lookups against any [`CatalogReader`].
///
/// # Examples
/// ```
/// use geo::Coord;
/// use pickup_core::{CatalogWriter, CityRecord, GeoQueryService, SqliteCatalogStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteCatalogStore::open_in_memory()?;
/// store.upsert_cities(&[CityRecord {
///     code: 44,
///     city: "Moscow".into(),
///     region: "Moscow".into(),
///     region_code: 81,
///     longitude: 37.6,
///     latitude: 55.7,
/// }])?;
/// store.replace_city_points_qty(&[(44, 3)])?;
///
/// let service = GeoQueryService::new(&store);
/// let city = service.nearest_city(Coord { x: 37.0, y: 55.0 })?;
/// assert_eq!(city.code, 44);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeoQueryService<S> {
    store: S,
}

impl<S: CatalogReader> GeoQueryService<S> {
    /// Wrap a catalog reader.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying reader.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// City with live points closest to `at` by great-circle distance.
    ///
    /// Ties resolve to the city listed first by the store.
    ///
    /// # Errors
    /// [`QueryError::CityNotFound`] when no city has points.
    pub fn nearest_city(&self, at: Coord<f64>) -> Result<City, QueryError> {
        let mut nearest: Option<(f64, City)> = None;
        for city in self.store.cities_with_points()? {
            let distance = great_circle_miles(at, city.location());
            let closer = nearest
                .as_ref()
                .is_none_or(|(best, _)| distance < *best);
            if closer {
                nearest = Some((distance, city));
            }
        }
        nearest
            .map(|(_, city)| city)
            .ok_or(QueryError::CityNotFound)
    }

    /// Up to ten cities with points whose name or region contains `text`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn suggest_cities(&self, text: &SuggestText) -> Result<Vec<City>, QueryError> {
        Ok(self
            .store
            .suggest_cities(text.as_str(), SUGGESTION_LIMIT)?)
    }

    /// Live points in a city. Unknown cities yield an empty list.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn points_by_city(&self, city_code: i64) -> Result<Vec<PointSummary>, QueryError> {
        Ok(self.store.points_in_city(city_code)?)
    }

    /// Live points inside the rectangle spanned by two corners.
    ///
    /// Corners may be given in any order; boundaries are inclusive.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn points_by_bounds(
        &self,
        north_west: Coord<f64>,
        south_east: Coord<f64>,
    ) -> Result<Vec<PointSummary>, QueryError> {
        let bounds = Rect::new(north_west, south_east);
        Ok(self.store.points_in_bounds(&bounds)?)
    }

    /// Full record of a point, including tombstoned ones.
    ///
    /// # Errors
    /// [`QueryError::PointNotFound`] when the code is unknown.
    pub fn point_by_code(&self, code: &PointCode) -> Result<Point, QueryError> {
        self.store
            .point_by_code(code.as_str())?
            .ok_or_else(|| QueryError::PointNotFound {
                code: code.as_str().to_owned(),
            })
    }
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "tests fail fast and index into listings of known length"
)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryCatalogStore, city_record, point_record};
    use crate::{CatalogWriter, CityRecord};
    use rstest::{fixture, rstest};

    fn city(code: i64, name: &str, at: Coord<f64>, points_qty: u32) -> City {
        City::from_record(
            CityRecord {
                longitude: at.x,
                latitude: at.y,
                ..city_record(code, name, 77)
            },
            points_qty,
        )
    }

    #[fixture]
    fn cities() -> MemoryCatalogStore {
        MemoryCatalogStore::with_cities([
            city(1, "Moscow", Coord { x: 37.62, y: 55.75 }, 40),
            city(2, "Saint Petersburg", Coord { x: 30.31, y: 59.94 }, 25),
            city(3, "Tver", Coord { x: 35.90, y: 56.86 }, 0),
            city(4, "Klin", Coord { x: 36.73, y: 56.33 }, 3),
        ])
    }

    #[rstest]
    #[case(Coord { x: 37.5, y: 55.8 }, 1)]
    #[case(Coord { x: 30.0, y: 60.0 }, 2)]
    // Tver itself has no points, so its neighbour wins.
    #[case(Coord { x: 35.90, y: 56.86 }, 4)]
    fn nearest_city_skips_cities_without_points(
        cities: MemoryCatalogStore,
        #[case] at: Coord<f64>,
        #[case] expected: i64,
    ) {
        let service = GeoQueryService::new(&cities);
        let found = service.nearest_city(at).expect("nearest city");
        assert_eq!(found.code, expected);
    }

    #[rstest]
    fn nearest_city_prefers_first_on_ties() {
        let at = Coord { x: 10.0, y: 10.0 };
        let store =
            MemoryCatalogStore::with_cities([city(7, "Twin A", at, 1), city(8, "Twin B", at, 1)]);
        let found = GeoQueryService::new(&store)
            .nearest_city(at)
            .expect("nearest city");
        assert_eq!(found.code, 7);
    }

    #[rstest]
    fn nearest_city_fails_on_empty_catalog() {
        let store = MemoryCatalogStore::default();
        let err = GeoQueryService::new(&store)
            .nearest_city(Coord { x: 0.0, y: 0.0 })
            .expect_err("no cities");
        assert!(matches!(err, QueryError::CityNotFound));
    }

    #[rstest]
    fn suggestions_are_ranked_by_point_count(cities: MemoryCatalogStore) {
        let service = GeoQueryService::new(&cities);
        let text = SuggestText::new("mo").err();
        assert!(text.is_some(), "two characters are rejected before querying");

        let by_name = service
            .suggest_cities(&SuggestText::new("MOS").expect("valid text"))
            .expect("suggest");
        assert_eq!(by_name.iter().map(|c| c.code).collect::<Vec<_>>(), [1]);

        let by_region = service
            .suggest_cities(&SuggestText::new("region 77").expect("valid text"))
            .expect("suggest");
        assert_eq!(
            by_region.iter().map(|c| c.code).collect::<Vec<_>>(),
            [1, 2, 4]
        );
    }

    #[rstest]
    fn suggestions_are_capped() {
        let store = MemoryCatalogStore::with_cities(
            (1..=15).map(|code| city(code, &format!("Town {code}"), Coord::zero(), 1)),
        );
        let found = GeoQueryService::new(&store)
            .suggest_cities(&SuggestText::new("town").expect("valid text"))
            .expect("suggest");
        assert_eq!(found.len(), SUGGESTION_LIMIT);
    }

    #[fixture]
    fn points() -> MemoryCatalogStore {
        let store = MemoryCatalogStore::default();
        store
            .upsert_points(&[
                point_record("P1", 77, 1, Coord { x: 37.60, y: 55.70 }),
                point_record("P2", 77, 1, Coord { x: 37.70, y: 55.80 }),
                point_record("P3", 78, 2, Coord { x: 30.30, y: 59.90 }),
            ])
            .expect("seed points");
        store
    }

    #[rstest]
    #[case(Coord { x: 37.0, y: 56.0 }, Coord { x: 38.0, y: 55.0 })]
    #[case(Coord { x: 38.0, y: 55.0 }, Coord { x: 37.0, y: 56.0 })]
    fn bounds_accept_corners_in_any_order(
        points: MemoryCatalogStore,
        #[case] north_west: Coord<f64>,
        #[case] south_east: Coord<f64>,
    ) {
        let found = GeoQueryService::new(&points)
            .points_by_bounds(north_west, south_east)
            .expect("bounds query");
        assert_eq!(
            found.iter().map(|p| p.code.as_str()).collect::<Vec<_>>(),
            ["P1", "P2"]
        );
    }

    #[rstest]
    fn city_listing_uses_summary_projection(points: MemoryCatalogStore) {
        let found = GeoQueryService::new(&points)
            .points_by_city(2)
            .expect("city query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "P3");
        assert_eq!(found[0].point_type, "PVZ");
        assert!(GeoQueryService::new(&points)
            .points_by_city(99)
            .expect("city query")
            .is_empty());
    }

    #[rstest]
    fn point_lookup_reports_missing_codes(points: MemoryCatalogStore) {
        let service = GeoQueryService::new(&points);
        let code = PointCode::new("NOPE").expect("valid code");
        let err = service.point_by_code(&code).expect_err("unknown code");
        assert!(matches!(err, QueryError::PointNotFound { code } if code == "NOPE"));
    }
}
