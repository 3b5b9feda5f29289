//! Partner response shapes and page decoding.
//!
//! Regions and cities arrive in the shape the catalog stores them. Points
//! nest their position and address under `location`, which is flattened
//! onto [`PointRecord`]. Fields the catalog does not model are ignored.

use pickup_core::params::POINT_CODE_MAX_CHARS;
use pickup_core::{Dimensions, Phone, PointRecord, WorkTime, WorkTimeException};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

/// Why a page was not accepted.
///
/// A single offending record rejects the whole page.
#[derive(Debug, Error)]
pub enum PageRejection {
    /// The body is not a JSON array of the expected records.
    #[error("body does not match the expected record shape")]
    Malformed(#[from] serde_json::Error),
    /// A point code exceeds the catalog's column width.
    #[error("point code {code} is {length} characters long")]
    CodeTooLong {
        /// Offending code.
        code: String,
        /// Its length in characters.
        length: usize,
    },
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    region_code: i64,
    city_code: i64,
    longitude: f64,
    latitude: f64,
    address: String,
    address_full: String,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    code: String,
    uuid: Uuid,
    name: String,
    location: RawLocation,
    address_comment: Option<String>,
    nearest_station: Option<String>,
    nearest_metro_station: Option<String>,
    work_time: String,
    phones: Vec<Phone>,
    email: Option<String>,
    note: Option<String>,
    #[serde(rename = "type")]
    point_type: String,
    owner_code: String,
    take_only: bool,
    is_handout: bool,
    is_reception: bool,
    is_dressing_room: bool,
    have_cashless: bool,
    have_cash: bool,
    have_fast_payment_system: bool,
    allowed_cod: bool,
    is_ltl: Option<bool>,
    fulfillment: Option<bool>,
    site: Option<String>,
    work_time_list: Vec<WorkTime>,
    work_time_exception_list: Option<Vec<WorkTimeException>>,
    weight_min: Option<f64>,
    weight_max: Option<f64>,
    dimensions: Option<Vec<Dimensions>>,
}

impl TryFrom<RawPoint> for PointRecord {
    type Error = PageRejection;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        let length = raw.code.chars().count();
        if length > POINT_CODE_MAX_CHARS {
            return Err(PageRejection::CodeTooLong {
                code: raw.code,
                length,
            });
        }
        let RawLocation {
            region_code,
            city_code,
            longitude,
            latitude,
            address,
            address_full,
        } = raw.location;
        Ok(Self {
            code: raw.code,
            uuid: raw.uuid,
            name: raw.name,
            region_code,
            city_code,
            longitude,
            latitude,
            address,
            address_full,
            address_comment: raw.address_comment,
            nearest_station: raw.nearest_station,
            nearest_metro_station: raw.nearest_metro_station,
            work_time: raw.work_time,
            phones: raw.phones,
            email: raw.email,
            note: raw.note,
            point_type: raw.point_type,
            owner_code: raw.owner_code,
            take_only: raw.take_only,
            is_handout: raw.is_handout,
            is_reception: raw.is_reception,
            is_dressing_room: raw.is_dressing_room,
            have_cashless: raw.have_cashless,
            have_cash: raw.have_cash,
            have_fast_payment_system: raw.have_fast_payment_system,
            allowed_cod: raw.allowed_cod,
            is_ltl: raw.is_ltl,
            fulfillment: raw.fulfillment,
            site: raw.site,
            work_time_list: raw.work_time_list,
            work_time_exception_list: raw.work_time_exception_list,
            weight_min: raw.weight_min,
            weight_max: raw.weight_max,
            dimensions: raw.dimensions,
        })
    }
}

/// Decode a page of records that need no reshaping.
pub(crate) fn decode_page<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, PageRejection> {
    Ok(serde_json::from_slice(body)?)
}

/// Decode and flatten a page of points.
pub(crate) fn decode_points(body: &[u8]) -> Result<Vec<PointRecord>, PageRejection> {
    let raw: Vec<RawPoint> = serde_json::from_slice(body)?;
    raw.into_iter().map(PointRecord::try_from).collect()
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "tests index into decoded fixture pages"
)]
mod tests {
    use super::*;
    use pickup_core::{CityRecord, RegionRecord};
    use rstest::rstest;
    use serde_json::json;

    fn raw_point(code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "uuid": "0b1e4cc4-2b0b-4d1b-9c4a-0f1a2b3c4d5e",
            "name": "On Tverskaya",
            "location": {
                "country_code": "RU",
                "region_code": 81,
                "city_code": 44,
                "longitude": 37.61,
                "latitude": 55.76,
                "address": "Tverskaya 1",
                "address_full": "Moscow, Tverskaya 1"
            },
            "address_comment": null,
            "work_time": "Mon-Sun 10:00-22:00",
            "phones": [{ "number": "+74950000000" }],
            "type": "PVZ",
            "owner_code": "cdek",
            "take_only": false,
            "is_handout": true,
            "is_reception": true,
            "is_dressing_room": false,
            "have_cashless": true,
            "have_cash": true,
            "have_fast_payment_system": false,
            "allowed_cod": true,
            "work_time_list": [{ "day": 1, "time": "10:00/22:00" }],
            "dimensions": [{ "width": 30, "height": 40, "depth": 50 }]
        })
    }

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).expect("encode fixture")
    }

    #[rstest]
    fn points_are_flattened() {
        let points = decode_points(&body(&json!([raw_point("MSK44")]))).expect("valid page");
        let [point] = points.as_slice() else {
            panic!("expected one point, got {points:?}");
        };
        assert_eq!(point.region_code, 81);
        assert_eq!(point.city_code, 44);
        assert_eq!(point.address_full, "Moscow, Tverskaya 1");
        assert_eq!(point.point_type, "PVZ");
        assert_eq!(point.address_comment, None);
        assert_eq!(point.phones[0].additional, None);
        assert_eq!(point.work_time_exception_list, None);
        assert_eq!(
            point.dimensions.as_deref(),
            Some(
                &[Dimensions {
                    width: 30.0,
                    height: 40.0,
                    depth: 50.0
                }][..]
            )
        );
    }

    #[rstest]
    fn one_long_code_rejects_the_page() {
        let page = json!([raw_point("MSK1"), raw_point("MSK1234567X")]);
        let err = decode_points(&body(&page)).expect_err("code too long");
        assert!(matches!(
            err,
            PageRejection::CodeTooLong { length: 11, .. }
        ));
    }

    #[rstest]
    #[case::bad_uuid("uuid", json!("not-a-uuid"))]
    #[case::missing_location("location", serde_json::Value::Null)]
    #[case::string_flag("allowed_cod", json!("yes"))]
    fn malformed_points_reject_the_page(#[case] field: &str, #[case] value: serde_json::Value) {
        let mut point = raw_point("MSK1");
        point[field] = value;
        let err = decode_points(&body(&json!([point]))).expect_err("malformed");
        assert!(matches!(err, PageRejection::Malformed(_)));
    }

    #[rstest]
    fn regions_and_cities_decode_directly() {
        let regions: Vec<RegionRecord> =
            decode_page(br#"[{"region":"Moscow","region_code":81,"country":"Russia"}]"#)
                .expect("regions");
        assert_eq!(regions[0].region_code, 81);

        let cities: Vec<CityRecord> = decode_page(
            br#"[{"code":44,"city":"Moscow","region":"Moscow","region_code":81,
                  "longitude":37.6,"latitude":55.7}]"#,
        )
        .expect("cities");
        assert_eq!(cities[0].city, "Moscow");
    }

    #[rstest]
    fn error_objects_are_not_pages() {
        let result: Result<Vec<RegionRecord>, _> =
            decode_page(br#"{"errors":[{"code":"v2_internal_error"}]}"#);
        assert!(matches!(result, Err(PageRejection::Malformed(_))));
    }
}
