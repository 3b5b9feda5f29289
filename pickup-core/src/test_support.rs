//! In-memory catalog store and record builders for unit and behaviour tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use geo::{Coord, Intersects, Rect};
use uuid::Uuid;

use crate::store::{CatalogCounts, CatalogReader, CatalogStoreError, CatalogWriter};
use crate::{City, CityRecord, Point, PointRecord, PointSummary, Region, RegionRecord};

/// Build a region record.
#[must_use]
pub fn region_record(region_code: i64, region: &str) -> RegionRecord {
    RegionRecord {
        region_code,
        region: region.to_owned(),
    }
}

/// Build a city record positioned at the origin of its region.
///
/// The region name is derived from the code so suggestion tests can match on
/// city names without accidental region hits.
#[must_use]
pub fn city_record(code: i64, city: &str, region_code: i64) -> CityRecord {
    CityRecord {
        code,
        city: city.to_owned(),
        region: format!("Region {region_code}"),
        region_code,
        longitude: 0.0,
        latitude: 0.0,
    }
}

/// Build a point record with plausible defaults for every partner field.
#[must_use]
pub fn point_record(code: &str, region_code: i64, city_code: i64, at: Coord<f64>) -> PointRecord {
    PointRecord {
        code: code.to_owned(),
        uuid: Uuid::from_u128(u128::from(code.bytes().fold(7_u64, |acc, byte| {
            acc.wrapping_mul(31).wrapping_add(u64::from(byte))
        }))),
        name: format!("Pickup {code}"),
        region_code,
        city_code,
        longitude: at.x,
        latitude: at.y,
        address: format!("{code} street"),
        address_full: format!("{city_code}, {code} street"),
        work_time: "Mon-Sun 10:00-20:00".to_owned(),
        point_type: "PVZ".to_owned(),
        owner_code: "cdek".to_owned(),
        is_handout: true,
        have_cashless: true,
        allowed_cod: true,
        ..PointRecord::default()
    }
}

#[derive(Debug, Default)]
struct MemoryCatalog {
    regions: BTreeMap<i64, Region>,
    cities: BTreeMap<i64, City>,
    points: Vec<Point>,
    next_point_id: i64,
}

impl MemoryCatalog {
    fn live_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|point| !point.is_deleted)
    }
}

/// In-memory [`CatalogWriter`] mirroring the SQLite store's semantics.
///
/// Lookups are linear scans; intended for small fixtures only.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    inner: Mutex<MemoryCatalog>,
}

impl MemoryCatalogStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryCatalog>, CatalogStoreError> {
        self.inner.lock().map_err(|_| CatalogStoreError::Poisoned)
    }

    /// Create a store holding the given cities with preset point counts.
    #[must_use]
    pub fn with_cities<I>(cities: I) -> Self
    where
        I: IntoIterator<Item = City>,
    {
        let catalog = MemoryCatalog {
            cities: cities.into_iter().map(|city| (city.code, city)).collect(),
            ..MemoryCatalog::default()
        };
        Self {
            inner: Mutex::new(catalog),
        }
    }
}

impl CatalogReader for MemoryCatalogStore {
    fn cities_with_points(&self) -> Result<Vec<City>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .cities
            .values()
            .filter(|city| city.points_qty > 0)
            .cloned()
            .collect())
    }

    fn suggest_cities(&self, needle: &str, limit: usize) -> Result<Vec<City>, CatalogStoreError> {
        let folded = needle.to_lowercase();
        let mut matches = self
            .cities_with_points()?
            .into_iter()
            .filter(|city| {
                city.city.to_lowercase().contains(&folded)
                    || city.region.to_lowercase().contains(&folded)
            })
            .collect::<Vec<_>>();
        // Stable sort keeps ascending code order among equal counts.
        matches.sort_by(|a, b| b.points_qty.cmp(&a.points_qty));
        matches.truncate(limit);
        Ok(matches)
    }

    fn points_in_city(&self, city_code: i64) -> Result<Vec<PointSummary>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .live_points()
            .filter(|point| point.record.city_code == city_code)
            .map(PointSummary::from)
            .collect())
    }

    fn points_in_bounds(
        &self,
        bounds: &Rect<f64>,
    ) -> Result<Vec<PointSummary>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .live_points()
            // `Intersects` treats boundary points as inside the rectangle.
            .filter(|point| bounds.intersects(&point.record.location()))
            .map(PointSummary::from)
            .collect())
    }

    fn point_by_code(&self, code: &str) -> Result<Option<Point>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .points
            .iter()
            .find(|point| point.record.code == code)
            .cloned())
    }

    fn region(&self, region_code: i64) -> Result<Option<Region>, CatalogStoreError> {
        Ok(self.lock()?.regions.get(&region_code).cloned())
    }

    fn city(&self, code: i64) -> Result<Option<City>, CatalogStoreError> {
        Ok(self.lock()?.cities.get(&code).cloned())
    }

    fn live_point_counts_by_city(&self) -> Result<Vec<(i64, u32)>, CatalogStoreError> {
        let catalog = self.lock()?;
        let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
        for point in catalog.live_points() {
            *counts.entry(point.record.city_code).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn live_point_region_codes(&self) -> Result<Vec<i64>, CatalogStoreError> {
        let catalog = self.lock()?;
        let codes: BTreeSet<i64> = catalog
            .live_points()
            .map(|point| point.record.region_code)
            .collect();
        Ok(codes.into_iter().collect())
    }

    fn regions_with_points(&self) -> Result<Vec<i64>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .regions
            .values()
            .filter(|region| region.has_points)
            .map(|region| region.region_code)
            .collect())
    }

    fn live_point_coordinates(
        &self,
        region_code: i64,
    ) -> Result<Vec<Coord<f64>>, CatalogStoreError> {
        let catalog = self.lock()?;
        Ok(catalog
            .live_points()
            .filter(|point| point.record.region_code == region_code)
            .map(|point| point.record.location())
            .collect())
    }

    fn counts(&self) -> Result<CatalogCounts, CatalogStoreError> {
        let catalog = self.lock()?;
        let live_points = catalog.live_points().count();
        Ok(CatalogCounts {
            regions: catalog.regions.len(),
            cities: catalog.cities.len(),
            live_points,
            deleted_points: catalog.points.len() - live_points,
        })
    }
}

impl CatalogWriter for MemoryCatalogStore {
    fn upsert_regions(&self, regions: &[RegionRecord]) -> Result<usize, CatalogStoreError> {
        let mut catalog = self.lock()?;
        for record in regions {
            catalog
                .regions
                .entry(record.region_code)
                .and_modify(|region| region.region.clone_from(&record.region))
                .or_insert_with(|| Region {
                    region_code: record.region_code,
                    region: record.region.clone(),
                    has_points: false,
                    longitude: None,
                    latitude: None,
                });
        }
        Ok(regions.len())
    }

    fn upsert_cities(&self, cities: &[CityRecord]) -> Result<usize, CatalogStoreError> {
        let mut catalog = self.lock()?;
        for record in cities {
            let points_qty = catalog
                .cities
                .get(&record.code)
                .map_or(0, |city| city.points_qty);
            catalog
                .cities
                .insert(record.code, City::from_record(record.clone(), points_qty));
        }
        Ok(cities.len())
    }

    fn mark_all_points_deleted(&self) -> Result<usize, CatalogStoreError> {
        let mut catalog = self.lock()?;
        for point in &mut catalog.points {
            point.is_deleted = true;
        }
        Ok(catalog.points.len())
    }

    fn upsert_points(&self, points: &[PointRecord]) -> Result<usize, CatalogStoreError> {
        let mut catalog = self.lock()?;
        let mut positions: HashMap<String, usize> = catalog
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| (point.record.code.clone(), index))
            .collect();
        for record in points {
            if let Some(existing) = positions
                .get(&record.code)
                .and_then(|&index| catalog.points.get_mut(index))
            {
                existing.record = record.clone();
                existing.is_deleted = false;
                continue;
            }
            catalog.next_point_id += 1;
            let id = catalog.next_point_id;
            positions.insert(record.code.clone(), catalog.points.len());
            catalog.points.push(Point {
                id,
                record: record.clone(),
                is_deleted: false,
            });
        }
        Ok(points.len())
    }

    fn replace_city_points_qty(&self, counts: &[(i64, u32)]) -> Result<(), CatalogStoreError> {
        let mut catalog = self.lock()?;
        for city in catalog.cities.values_mut() {
            city.points_qty = 0;
        }
        for (code, qty) in counts {
            if let Some(city) = catalog.cities.get_mut(code) {
                city.points_qty = *qty;
            }
        }
        Ok(())
    }

    fn replace_region_has_points(&self, region_codes: &[i64]) -> Result<(), CatalogStoreError> {
        let mut catalog = self.lock()?;
        for region in catalog.regions.values_mut() {
            region.has_points = region_codes.contains(&region.region_code);
        }
        Ok(())
    }

    fn set_region_coordinates(
        &self,
        coordinates: &[(i64, Coord<f64>)],
    ) -> Result<(), CatalogStoreError> {
        let mut catalog = self.lock()?;
        for (code, at) in coordinates {
            if let Some(region) = catalog.regions.get_mut(code) {
                region.longitude = Some(at.x);
                region.latitude = Some(at.y);
            }
        }
        Ok(())
    }
}
