//! Input corpora: stops (feature collection) and the combined lookup surface
//! shared by the itinerary model and the scheduler.
//!
//! Stop ids are opaque strings. Synthetic vehicle-position stops use the form
//! `"<vehicle_id>-current-0"`; synthetic customer stops
//! `"<name>-<origin|destination>-<issue_time>"`. Both corpora are append-only
//! during a run except for the purge of `-current-` entries at the start of
//! each scheduling cycle.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CorpusError;
use crate::geo::{geodesic_km, lonlat_from_point, point_from_lonlat, GeoPoint};
use crate::routing::{RouteOracle, RouteResult};

/// One stop feature as it appears on disk. Coordinates are `[lon, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopFeature {
    pub id: String,
    pub geometry: StopGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopGeometry {
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StopsFile {
    features: Vec<StopFeature>,
}

/// In-memory stop record: id plus the converted coordinate.
#[derive(Debug, Clone)]
struct StopRecord {
    id: String,
    coords: GeoPoint,
    lonlat: [f64; 2],
}

/// The stops corpus: ordered features with id and coordinate lookups.
#[derive(Debug, Default)]
pub struct StopsCorpus {
    stops: Vec<StopRecord>,
    by_id: HashMap<String, usize>,
}

impl StopsCorpus {
    pub fn from_features(features: Vec<StopFeature>) -> Result<Self, CorpusError> {
        let mut corpus = Self::default();
        for feature in features {
            corpus.add(&feature.id, feature.geometry.coordinates)?;
        }
        Ok(corpus)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CorpusError> {
        let file = File::open(path)?;
        let parsed: StopsFile = serde_json::from_reader(BufReader::new(file))?;
        Self::from_features(parsed.features)
    }

    /// Register a stop under `id` at the given on-disk `[lon, lat]` coordinates.
    /// Re-registering an existing id replaces its coordinates.
    pub fn add(&mut self, id: &str, lonlat: [f64; 2]) -> Result<(), CorpusError> {
        let coords = point_from_lonlat(lonlat).map_err(|_| CorpusError::InvalidCoords {
            lon: lonlat[0],
            lat: lonlat[1],
        })?;
        match self.by_id.get(id) {
            Some(&index) => {
                self.stops[index] = StopRecord {
                    id: id.to_string(),
                    coords,
                    lonlat,
                };
            }
            None => {
                self.by_id.insert(id.to_string(), self.stops.len());
                self.stops.push(StopRecord {
                    id: id.to_string(),
                    coords,
                    lonlat,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stops.iter().map(|s| s.id.as_str())
    }

    pub fn coords(&self, id: &str) -> Result<GeoPoint, CorpusError> {
        self.by_id
            .get(id)
            .map(|&i| self.stops[i].coords)
            .ok_or_else(|| CorpusError::UnknownStopId(id.to_string()))
    }

    /// Find the stop located at the given on-disk `[lon, lat]` coordinates.
    /// Fatal for the instance when absent.
    pub fn id_at(&self, lonlat: [f64; 2]) -> Result<&str, CorpusError> {
        self.stops
            .iter()
            .find(|s| s.lonlat == lonlat)
            .map(|s| s.id.as_str())
            .ok_or(CorpusError::MissingStop {
                lon: lonlat[0],
                lat: lonlat[1],
            })
    }

    /// Remove every synthetic `-current-` stop, returning how many were
    /// dropped. Route entries are keyed by coordinates and stay append-only:
    /// plans committed in earlier cycles may still traverse an old current
    /// position.
    pub fn purge_current_stops(&mut self) -> usize {
        let before = self.stops.len();
        self.stops.retain(|s| !s.id.contains("-current-"));
        self.by_id.clear();
        for (index, stop) in self.stops.iter().enumerate() {
            self.by_id.insert(stop.id.clone(), index);
        }
        before - self.stops.len()
    }
}

/// ECS resource wrapping the shared corpus.
#[derive(Resource)]
pub struct CorpusResource(pub Corpus);

/// Combined corpus: stops plus the routing oracle, the shared lookup surface
/// for itineraries and the scheduler.
#[derive(Debug, Default)]
pub struct Corpus {
    pub stops: StopsCorpus,
    pub routes: RouteOracle,
}

impl Corpus {
    pub fn new(stops: StopsCorpus, routes: RouteOracle) -> Self {
        Self { stops, routes }
    }

    pub fn load<P: AsRef<Path>>(stops_path: P, routes_path: P) -> Result<Self, CorpusError> {
        Ok(Self {
            stops: StopsCorpus::load(stops_path)?,
            routes: RouteOracle::load(routes_path)?,
        })
    }

    pub fn stop_coords(&self, id: &str) -> Result<GeoPoint, CorpusError> {
        self.stops.coords(id)
    }

    /// Route between two stops by id. Identical endpoints yield the zero route.
    pub fn route(&self, from_id: &str, to_id: &str) -> Result<RouteResult, CorpusError> {
        let from = self.stops.coords(from_id)?;
        let to = self.stops.coords(to_id)?;
        self.routes.route(from, to)
    }

    /// Make sure the route for the ordered pair is present, fetching it from
    /// the upstream service when configured.
    pub fn ensure_route(&mut self, from_id: &str, to_id: &str) -> Result<(), CorpusError> {
        let from = self.stops.coords(from_id)?;
        let to = self.stops.coords(to_id)?;
        self.routes.ensure(from, to)
    }

    pub fn route_distance_km(&self, from_id: &str, to_id: &str) -> Result<f64, CorpusError> {
        Ok(self.route(from_id, to_id)?.distance_km())
    }

    pub fn route_time_min(&self, from_id: &str, to_id: &str) -> Result<f64, CorpusError> {
        Ok(self.route(from_id, to_id)?.duration_min())
    }

    /// Straight-line alternative to the driving distance.
    pub fn geodesic_km(&self, from_id: &str, to_id: &str) -> Result<f64, CorpusError> {
        let from = self.stops.coords(from_id)?;
        let to = self.stops.coords(to_id)?;
        Ok(geodesic_km(from, to))
    }

    /// Register a synthetic stop (vehicle current position or customer
    /// origin/destination) at in-memory coordinates.
    pub fn add_synthetic_stop(&mut self, id: &str, coords: GeoPoint) -> Result<(), CorpusError> {
        self.stops.add(id, lonlat_from_point(coords))
    }

    /// Drop all `-current-` stops. Run at the start of each scheduling cycle.
    pub fn purge_current_stops(&mut self) {
        self.stops.purge_current_stops();
    }
}
