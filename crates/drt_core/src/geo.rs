//! Geographic primitives: coordinates, conversion, and great-circle
//! distance.
//!
//! On-disk corpora and wire messages carry `[lon, lat]` pairs; everything in
//! memory is a [`GeoPoint`]. The conversion happens here, exactly once, at
//! the I/O boundary. A `GeoPoint` keeps the degree values bit-for-bit as
//! parsed: routes-corpus keys are formatted from these values, so any
//! rounding would break corpus lookups.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (haversine).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair out of range or non-finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCoords;

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoords> {
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(InvalidCoords);
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// Build a [`GeoPoint`] from an on-disk `[lon, lat]` pair.
pub fn point_from_lonlat(lonlat: [f64; 2]) -> Result<GeoPoint, InvalidCoords> {
    GeoPoint::new(lonlat[1], lonlat[0])
}

/// Convert a [`GeoPoint`] back to the on-disk `[lon, lat]` ordering.
pub fn lonlat_from_point(point: GeoPoint) -> [f64; 2] {
    [point.lng(), point.lat()]
}

/// Routes-corpus key fragment for one endpoint: a `(lat, lon)` tuple of
/// floats.
pub fn coord_key(point: GeoPoint) -> String {
    format!("({}, {})", point.lat(), point.lng())
}

/// Routes-corpus key for an ordered pair of endpoints.
pub fn route_key(from: GeoPoint, to: GeoPoint) -> String {
    format!("{}:{}", coord_key(from), coord_key(to))
}

/// Uncached great-circle distance (internal use).
fn geodesic_km_uncached(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat().to_radians(), a.lng().to_radians());
    let (lat2, lon2) = (b.lat().to_radians(), b.lng().to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Global distance cache (10,000 entries).
fn get_distance_cache() -> &'static Mutex<LruCache<(u64, u64, u64, u64), f64>> {
    static CACHE: OnceLock<Mutex<LruCache<(u64, u64, u64, u64), f64>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(10_000).expect("cache capacity must be > 0"),
        ))
    })
}

/// Great-circle distance between two points in kilometres, LRU-cached.
pub fn geodesic_km(a: GeoPoint, b: GeoPoint) -> f64 {
    // Symmetric key (lexicographically smaller endpoint first) to maximize
    // cache hits.
    let ka = (a.lat().to_bits(), a.lng().to_bits());
    let kb = (b.lat().to_bits(), b.lng().to_bits());
    let key = if ka <= kb {
        (ka.0, ka.1, kb.0, kb.1)
    } else {
        (kb.0, kb.1, ka.0, ka.1)
    };

    let mut cache = get_distance_cache().lock().unwrap();
    *cache.get_or_insert(key, || geodesic_km_uncached(a, b))
}

/// Exact coordinate equality as the corpora define it: both components
/// equal.
pub fn same_point(a: GeoPoint, b: GeoPoint) -> bool {
    a.lat() == b.lat() && a.lng() == b.lng()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lonlat_round_trips_exactly() {
        let point = point_from_lonlat([-0.3763, 39.4697]).expect("valid coords");
        assert_eq!(point.lat(), 39.4697);
        assert_eq!(point.lng(), -0.3763);
        assert_eq!(lonlat_from_point(point), [-0.3763, 39.4697]);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 181.0).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn route_key_uses_lat_lon_tuples() {
        let a = GeoPoint::new(39.5, -0.4).unwrap();
        let b = GeoPoint::new(39.6, -0.3).unwrap();
        assert_eq!(route_key(a, b), "(39.5, -0.4):(39.6, -0.3)");
    }

    #[test]
    fn geodesic_distance_is_symmetric_and_zero_on_self() {
        let a = GeoPoint::new(39.4697, -0.3763).unwrap();
        let b = GeoPoint::new(39.4870, -0.3520).unwrap();
        assert_eq!(geodesic_km(a, a), 0.0);
        let ab = geodesic_km(a, b);
        let ba = geodesic_km(b, a);
        assert!((ab - ba).abs() < 1e-12);
        // Valencia city distances: a couple of km.
        assert!(ab > 1.0 && ab < 5.0, "unexpected distance {ab}");
    }
}
