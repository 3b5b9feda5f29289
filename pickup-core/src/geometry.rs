//! Planar and spherical helpers used by synchronisation and queries.
//!
//! Hull and centroid work directly on longitude/latitude degrees, treating
//! them as planar coordinates. Regions are small enough that the distortion
//! does not matter for a representative map position.

use geo::{Centroid, ConvexHull, Coord, MultiPoint};

/// Statute miles per nautical mile.
pub const STATUTE_MILES_PER_NAUTICAL_MILE: f64 = 1.1515;

/// Nautical miles per degree of arc.
const NAUTICAL_MILES_PER_DEGREE: f64 = 60.0;

/// Representative position for a region from the positions of its points.
///
/// More than two points yield the area-weighted centroid of their convex
/// hull. One or two points yield the first point unchanged; the second of a
/// pair is ignored rather than averaged. `None` when `points` is empty.
/// Non-finite coordinates are left out of the hull.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use pickup_core::geometry::region_coordinate;
///
/// let pair = [Coord { x: 10.0, y: 10.0 }, Coord { x: 20.0, y: 20.0 }];
/// assert_eq!(region_coordinate(&pair), Some(Coord { x: 10.0, y: 10.0 }));
/// ```
#[must_use]
pub fn region_coordinate(points: &[Coord<f64>]) -> Option<Coord<f64>> {
    if points.len() <= 2 {
        return points.first().copied();
    }
    let finite: MultiPoint<f64> = points
        .iter()
        .copied()
        .filter(|point| point.x.is_finite() && point.y.is_finite())
        .collect();
    finite.convex_hull().centroid().map(|centre| centre.0)
}

/// Great-circle distance in statute miles using the spherical law of
/// cosines.
///
/// Inputs are degrees. The cosine term is clamped to `[-1, 1]` so rounding
/// never produces `NaN` for identical or antipodal points.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use pickup_core::geometry::great_circle_miles;
///
/// let moscow = Coord { x: 37.62, y: 55.75 };
/// let kazan = Coord { x: 49.11, y: 55.79 };
/// let miles = great_circle_miles(moscow, kazan);
/// assert!((440.0..460.0).contains(&miles));
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "great-circle distance is floating-point trigonometry"
)]
pub fn great_circle_miles(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let from_lat = from.y.to_radians();
    let to_lat = to.y.to_radians();
    let delta_lon = (from.x - to.x).to_radians();
    let cosine = from_lat
        .sin()
        .mul_add(to_lat.sin(), from_lat.cos() * to_lat.cos() * delta_lon.cos())
        .clamp(-1.0, 1.0);
    cosine.acos().to_degrees() * NAUTICAL_MILES_PER_DEGREE * STATUTE_MILES_PER_NAUTICAL_MILE
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    clippy::expect_used,
    reason = "tests compare floating-point results and fail fast on missing values"
)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EARTH_RADIUS_MILES: f64 = 3958.8;

    fn coords(values: &[(f64, f64)]) -> Vec<Coord<f64>> {
        values.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    fn haversine_miles(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (from_lat, to_lat) = (from.1.to_radians(), to.1.to_radians());
        let half_lat = (to_lat - from_lat) / 2.0;
        let half_lon = (to.0 - from.0).to_radians() / 2.0;
        let a = half_lat.sin().powi(2) + from_lat.cos() * to_lat.cos() * half_lon.sin().powi(2);
        2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
    }

    fn assert_close(actual: Coord<f64>, expected: Coord<f64>) {
        let delta = (actual.x - expected.x).abs().max((actual.y - expected.y).abs());
        assert!(delta <= 1.0e-9, "expected {expected:?}, got {actual:?}");
    }

    #[rstest]
    #[case(&[(37.5, 55.6), (37.9, 55.6), (37.9, 55.9), (37.5, 55.9)])]
    #[case(&[(0.0, 0.0), (4.0, 0.0), (1.0, 3.0), (2.0, 1.0)])]
    #[case(&[(30.1, 59.8), (30.5, 59.7), (30.6, 60.1), (30.2, 60.0), (30.3, 59.9)])]
    fn hull_centroid_matches_geo(#[case] values: &[(f64, f64)]) {
        let points = coords(values);
        let expected = MultiPoint::from(points.clone())
            .convex_hull()
            .centroid()
            .expect("non-empty polygon has a centroid");
        let actual = region_coordinate(&points).expect("points present");
        assert_close(actual, expected.0);
    }

    #[rstest]
    fn interior_points_do_not_move_the_centroid() {
        let corners = coords(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)]);
        let mut crowded = corners.clone();
        crowded.extend(coords(&[(1.0, 1.0), (1.1, 1.0), (1.2, 1.1), (3.9, 0.1)]));
        let expected = Coord { x: 2.0, y: 1.0 };
        assert_close(region_coordinate(&corners).expect("centroid"), expected);
        assert_close(region_coordinate(&crowded).expect("centroid"), expected);
    }

    #[rstest]
    fn hull_ignores_non_finite_points() {
        let mut points = coords(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)]);
        points.insert(1, Coord { x: f64::NAN, y: 1.0 });
        assert_close(
            region_coordinate(&points).expect("centroid"),
            Coord { x: 2.0, y: 1.0 },
        );
    }

    #[rstest]
    fn single_point_region_uses_that_point() {
        let point = Coord { x: 49.1, y: 55.8 };
        assert_eq!(region_coordinate(&[point]), Some(point));
    }

    #[rstest]
    fn two_point_region_uses_first_point_without_averaging() {
        let points = coords(&[(10.0, 10.0), (20.0, 20.0)]);
        assert_eq!(region_coordinate(&points), Some(Coord { x: 10.0, y: 10.0 }));
    }

    #[rstest]
    fn empty_region_has_no_coordinate() {
        assert_eq!(region_coordinate(&[]), None);
    }

    #[rstest]
    #[case((37.62, 55.75), (30.31, 59.94))]
    #[case((0.0, 0.0), (0.0, 1.0))]
    #[case((-73.99, 40.73), (151.21, -33.87))]
    fn distance_agrees_with_haversine(#[case] from: (f64, f64), #[case] to: (f64, f64)) {
        let miles = great_circle_miles(Coord::from(from), Coord::from(to));
        let expected = haversine_miles(from, to);
        let relative = (miles - expected).abs() / expected;
        assert!(relative < 1.0e-3, "expected ~{expected}, got {miles}");
    }

    #[rstest]
    fn distance_for_identical_points_is_zero() {
        let here = Coord { x: 60.6, y: 56.8 };
        assert!(great_circle_miles(here, here) < 1.0e-3);
    }

    #[rstest]
    fn one_degree_of_latitude_is_sixty_nautical_miles() {
        let miles = great_circle_miles(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 1.0 });
        assert!((miles - 69.09).abs() < 1.0e-9);
    }
}
