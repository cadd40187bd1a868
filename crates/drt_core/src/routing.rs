//! Routing oracle: driving distance/duration between stop coordinates.
//!
//! The oracle is backed by the routes corpus, a mapping keyed
//! `"(lat,lon):(lat,lon)"` with metres/seconds values. Lookups are
//! deterministic and cached (the corpus map is append-only during a run);
//! a miss fails with [`CorpusError::MissingRoute`] unless an upstream
//! [`RouteFetch`] is configured, in which case the fetched route is inserted
//! into the corpus. Internal units are kilometres and minutes; the metre /
//! second conversion lives on [`RouteResult`] and nowhere else.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;
use crate::geo::{route_key, same_point, GeoPoint};

/// One route as stored in the routes corpus. `path` entries are `[lat, lon]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub path: Vec<[f64; 2]>,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Result of a route query.
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// Lat/lng waypoints along the road (empty for the same-point route).
    pub path: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl RouteResult {
    pub fn zero() -> Self {
        Self {
            path: Vec::new(),
            distance_m: 0.0,
            duration_s: 0.0,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn duration_min(&self) -> f64 {
        self.duration_s / 60.0
    }

    fn from_record(record: &RouteRecord) -> Self {
        let path = record
            .path
            .iter()
            .filter_map(|p| GeoPoint::new(p[0], p[1]).ok())
            .collect();
        Self {
            path,
            distance_m: record.distance_m,
            duration_s: record.duration_s,
        }
    }
}

/// Upstream route fetch, consulted on corpus misses.
pub trait RouteFetch: Send + Sync {
    fn fetch(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteRecord, CorpusError>;
}

/// The routing oracle: corpus map plus the optional upstream fetch.
#[derive(Default)]
pub struct RouteOracle {
    routes: HashMap<String, RouteRecord>,
    fetch: Option<Box<dyn RouteFetch>>,
}

impl std::fmt::Debug for RouteOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOracle")
            .field("routes", &self.routes.len())
            .field("fetch", &self.fetch.is_some())
            .finish()
    }
}

impl RouteOracle {
    pub fn from_records(routes: HashMap<String, RouteRecord>) -> Self {
        Self {
            routes,
            fetch: None,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CorpusError> {
        let file = File::open(path)?;
        let routes: HashMap<String, RouteRecord> = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::from_records(routes))
    }

    pub fn with_fetch(mut self, fetch: Box<dyn RouteFetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route for an ordered coordinate pair. Identical origin and destination
    /// yield the zero route without consulting the corpus.
    pub fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, CorpusError> {
        if same_point(from, to) {
            return Ok(RouteResult::zero());
        }
        let key = route_key(from, to);
        match self.routes.get(&key) {
            Some(record) => Ok(RouteResult::from_record(record)),
            None => Err(CorpusError::MissingRoute {
                from: crate::geo::coord_key(from),
                to: crate::geo::coord_key(to),
            }),
        }
    }

    /// Make sure the ordered pair is resolvable: hit the corpus, or fetch from
    /// the upstream service and insert. Without an upstream this is a plain
    /// presence check.
    pub fn ensure(&mut self, from: GeoPoint, to: GeoPoint) -> Result<(), CorpusError> {
        if same_point(from, to) {
            return Ok(());
        }
        let key = route_key(from, to);
        if self.routes.contains_key(&key) {
            return Ok(());
        }
        let Some(fetch) = self.fetch.as_ref() else {
            return Err(CorpusError::MissingRoute {
                from: crate::geo::coord_key(from),
                to: crate::geo::coord_key(to),
            });
        };
        let record = fetch.fetch(from, to)?;
        self.routes.insert(key, record);
        Ok(())
    }

    pub fn insert(&mut self, from: GeoPoint, to: GeoPoint, record: RouteRecord) {
        self.routes.insert(route_key(from, to), record);
    }
}

/// Straight-line fetch: a zero-dependency fallback that answers with the
/// great-circle distance driven at a fixed speed. Used where no road network
/// is available (tests, synthetic scenarios).
pub struct GeodesicFetch {
    pub speed_kmh: f64,
}

impl GeodesicFetch {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }
}

impl RouteFetch for GeodesicFetch {
    fn fetch(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteRecord, CorpusError> {
        let km = crate::geo::geodesic_km(from, to);
        let duration_s = if km > 0.0 {
            km / self.speed_kmh.max(1.0) * 3600.0
        } else {
            0.0
        };
        Ok(RouteRecord {
            path: vec![[from.lat(), from.lng()], [to.lat(), to.lng()]],
            distance_m: km * 1000.0,
            duration_s,
        })
    }
}

// ---------------------------------------------------------------------------
// OSRM fetch (behind `osrm` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
pub mod osrm {
    use super::*;
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use lru::LruCache;
    use reqwest::blocking::Client;

    /// Default cache capacity for fetched routes.
    const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

    /// Fetches driving routes from an OSRM HTTP endpoint.
    pub struct OsrmFetch {
        client: Client,
        endpoint: String,
    }

    impl OsrmFetch {
        pub fn new(endpoint: &str) -> Self {
            let client = Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build HTTP client");
            Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            }
        }
    }

    /// Minimal OSRM JSON response structures.
    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
        geometry: OsrmGeometry,
    }

    #[derive(Deserialize)]
    struct OsrmGeometry {
        coordinates: Vec<Vec<f64>>, // [lng, lat]
    }

    impl RouteFetch for OsrmFetch {
        fn fetch(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteRecord, CorpusError> {
            let url = format!(
                "{}/route/v1/car/{},{};{},{}?geometries=geojson&overview=full",
                self.endpoint,
                from.lng(),
                from.lat(),
                to.lng(),
                to.lat(),
            );

            let resp: OsrmResponse = self
                .client
                .get(&url)
                .send()
                .map_err(|e| CorpusError::Fetch(format!("http: {e}")))?
                .json()
                .map_err(|e| CorpusError::Fetch(format!("json: {e}")))?;

            if resp.code != "Ok" {
                return Err(CorpusError::Fetch(format!("osrm status {}", resp.code)));
            }

            let route = resp
                .routes
                .and_then(|r| r.into_iter().next())
                .ok_or_else(|| CorpusError::Fetch("osrm returned no routes".into()))?;

            // OSRM returns [lng, lat]; the corpus stores [lat, lng].
            let path: Vec<[f64; 2]> = route
                .geometry
                .coordinates
                .iter()
                .map(|c| [c[1], c[0]])
                .collect();

            Ok(RouteRecord {
                path,
                distance_m: route.distance,
                duration_s: route.duration,
            })
        }
    }

    /// LRU-cached wrapper around any [`RouteFetch`], keyed by the corpus route
    /// key. Keeps repeated prefetches of one pair from re-hitting the server.
    pub struct CachedFetch {
        inner: Box<dyn RouteFetch>,
        cache: Mutex<LruCache<String, RouteRecord>>,
    }

    impl CachedFetch {
        pub fn new(inner: Box<dyn RouteFetch>, capacity: usize) -> Self {
            Self {
                inner,
                cache: Mutex::new(LruCache::new(
                    NonZeroUsize::new(capacity.max(1)).expect("cache capacity must be > 0"),
                )),
            }
        }

        pub fn with_default_capacity(inner: Box<dyn RouteFetch>) -> Self {
            Self::new(inner, DEFAULT_ROUTE_CACHE_CAPACITY)
        }
    }

    impl RouteFetch for CachedFetch {
        fn fetch(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteRecord, CorpusError> {
            let key = route_key(from, to);
            if let Ok(mut cache) = self.cache.lock() {
                if let Some(cached) = cache.get(&key) {
                    return Ok(cached.clone());
                }
            }
            let record = self.inner.fetch(from, to)?;
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, record.clone());
            }
            Ok(record)
        }
    }
}
