//! Catalog records mirrored from the partner network.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`. The
//! `*Record` types carry exactly what the partner reports; the plain types add
//! the fields the mirror derives during synchronisation.

use geo::Coord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Region as reported by the partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Partner region code; unique within the catalog.
    pub region_code: i64,
    /// Display name.
    pub region: String,
}

/// Persisted region with derived aggregates.
///
/// `longitude` and `latitude` stay `None` until the first synchronisation
/// that finds live points in the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Partner region code.
    pub region_code: i64,
    /// Display name.
    pub region: String,
    /// Whether at least one live point references the region.
    pub has_points: bool,
    /// Derived centroid longitude.
    pub longitude: Option<f64>,
    /// Derived centroid latitude.
    pub latitude: Option<f64>,
}

impl Region {
    /// Derived centroid, when one has been computed.
    #[must_use]
    pub fn location(&self) -> Option<Coord<f64>> {
        self.longitude
            .zip(self.latitude)
            .map(|(x, y)| Coord { x, y })
    }
}

/// City as reported by the partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    /// Partner city code; unique within the catalog.
    pub code: i64,
    /// City name.
    pub city: String,
    /// Name of the owning region.
    pub region: String,
    /// Code of the owning region. Not enforced as a foreign key.
    pub region_code: i64,
    /// Longitude reported by the partner.
    pub longitude: f64,
    /// Latitude reported by the partner.
    pub latitude: f64,
}

/// Persisted city with its live point count.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use pickup_core::{City, CityRecord};
///
/// let record = CityRecord {
///     code: 44,
///     city: "Moscow".into(),
///     region: "Moscow".into(),
///     region_code: 81,
///     longitude: 37.6,
///     latitude: 55.7,
/// };
/// let city = City::from_record(record, 12);
/// assert_eq!(city.location(), Coord { x: 37.6, y: 55.7 });
/// assert_eq!(city.points_qty, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Partner city code.
    pub code: i64,
    /// City name.
    pub city: String,
    /// Name of the owning region.
    pub region: String,
    /// Code of the owning region.
    pub region_code: i64,
    /// Longitude reported by the partner.
    pub longitude: f64,
    /// Latitude reported by the partner.
    pub latitude: f64,
    /// Number of live points whose `city_code` matches, as of the last sync.
    pub points_qty: u32,
}

impl City {
    /// Combine a partner record with a live point count.
    #[must_use]
    pub fn from_record(record: CityRecord, points_qty: u32) -> Self {
        let CityRecord {
            code,
            city,
            region,
            region_code,
            longitude,
            latitude,
        } = record;
        Self {
            code,
            city,
            region,
            region_code,
            longitude,
            latitude,
            points_qty,
        }
    }

    /// Partner-reported position.
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Contact phone attached to a point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Phone {
    /// Phone number.
    pub number: String,
    /// Extension or free-form addition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<String>,
}

/// Opening hours for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkTime {
    /// Day of the week, 1 = Monday.
    pub day: u8,
    /// Opening interval, e.g. `10:00/20:00`.
    pub time: String,
}

/// A dated deviation from the regular schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkTimeException {
    /// First day of the exception.
    pub date_start: String,
    /// Last day of the exception.
    pub date_end: String,
    /// Opening time on those days, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// Closing time on those days, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// Whether the point opens at all.
    pub is_working: bool,
}

/// Maximum parcel dimensions accepted by a point, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Depth.
    pub depth: f64,
}

/// Pickup point as reported by the partner, with its location flattened.
///
/// `Default` exists so fixtures can spell out only the fields they care
/// about; the nil UUID and empty strings are not meaningful partner data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointRecord {
    /// Partner point code; unique, at most ten characters.
    pub code: String,
    /// Partner UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Code of the region the point belongs to.
    pub region_code: i64,
    /// Code of the city the point belongs to.
    pub city_code: i64,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
    /// Short street address.
    pub address: String,
    /// Address including city and postcode.
    pub address_full: String,
    /// Directions to find the entrance.
    pub address_comment: Option<String>,
    /// Nearest public transport stop.
    pub nearest_station: Option<String>,
    /// Nearest metro station.
    pub nearest_metro_station: Option<String>,
    /// Human-readable opening hours.
    pub work_time: String,
    /// Contact phones in partner order.
    pub phones: Vec<Phone>,
    /// Contact e-mail.
    pub email: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
    /// Point kind, e.g. `PVZ` or `POSTAMAT`.
    #[serde(rename = "type")]
    pub point_type: String,
    /// Operator of the point.
    pub owner_code: String,
    /// Only accepts parcels for pickup.
    pub take_only: bool,
    /// Hands parcels out.
    pub is_handout: bool,
    /// Accepts parcels for sending.
    pub is_reception: bool,
    /// Has a fitting room.
    pub is_dressing_room: bool,
    /// Accepts card payments.
    pub have_cashless: bool,
    /// Accepts cash.
    pub have_cash: bool,
    /// Accepts fast-payment-system transfers.
    pub have_fast_payment_system: bool,
    /// Supports cash on delivery.
    pub allowed_cod: bool,
    /// Handles less-than-truckload freight.
    pub is_ltl: Option<bool>,
    /// Offers fulfilment services.
    pub fulfillment: Option<bool>,
    /// Point web page.
    pub site: Option<String>,
    /// Opening hours per weekday.
    pub work_time_list: Vec<WorkTime>,
    /// Dated schedule exceptions.
    pub work_time_exception_list: Option<Vec<WorkTimeException>>,
    /// Minimum parcel weight in kilograms.
    pub weight_min: Option<f64>,
    /// Maximum parcel weight in kilograms.
    pub weight_max: Option<f64>,
    /// Accepted parcel dimensions.
    pub dimensions: Option<Vec<Dimensions>>,
}

impl PointRecord {
    /// Position of the point.
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Persisted point, including its soft-delete marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Store-assigned surrogate key, stable across synchronisations.
    pub id: i64,
    /// Partner fields as of the last feed that reported the point.
    #[serde(flatten)]
    pub record: PointRecord,
    /// Set when the latest feed no longer reported the point.
    pub is_deleted: bool,
}

/// Listing projection returned by area and city queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSummary {
    /// Store-assigned surrogate key.
    pub id: i64,
    /// Partner point code.
    pub code: String,
    /// Point kind.
    #[serde(rename = "type")]
    pub point_type: String,
    /// Supports cash on delivery.
    pub allowed_cod: bool,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
    /// Short street address.
    pub address: String,
}

impl From<&Point> for PointSummary {
    fn from(point: &Point) -> Self {
        Self {
            id: point.id,
            code: point.record.code.clone(),
            point_type: point.record.point_type.clone(),
            allowed_cod: point.record.allowed_cod,
            longitude: point.record.longitude,
            latitude: point.record.latitude,
            address: point.record.address.clone(),
        }
    }
}
