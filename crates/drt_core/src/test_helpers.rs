//! Test helpers for common corpus and world setup.

use crate::corpus::{Corpus, StopsCorpus};
use crate::geo::GeoPoint;
use crate::routing::{RouteOracle, RouteRecord};

/// Insert a directed route of exactly `km` kilometres / `minutes` minutes
/// between two named stops, with a two-point path.
pub fn set_route_km_min(corpus: &mut Corpus, from: &str, to: &str, km: f64, minutes: f64) {
    let a = corpus.stop_coords(from).expect("known stop");
    let b = corpus.stop_coords(to).expect("known stop");
    corpus.routes.insert(
        a,
        b,
        RouteRecord {
            path: vec![[a.lat(), a.lng()], [b.lat(), b.lng()]],
            distance_m: km * 1000.0,
            duration_s: minutes * 60.0,
        },
    );
}

/// A corpus of named stops at on-disk `[lon, lat]` coordinates, with no
/// routes.
pub fn corpus_with_stops(stops: &[(&str, f64, f64)]) -> Corpus {
    let mut corpus = Corpus::new(StopsCorpus::default(), RouteOracle::default());
    for (id, lon, lat) in stops {
        corpus.stops.add(id, [*lon, *lat]).expect("valid coords");
    }
    corpus
}

/// Connect every ordered pair of distinct stops with `km` kilometres /
/// `minutes` minutes.
pub fn link_all_pairs(corpus: &mut Corpus, km: f64, minutes: f64) {
    let ids: Vec<String> = corpus.stops.ids().map(str::to_string).collect();
    for from in &ids {
        for to in &ids {
            if from != to {
                set_route_km_min(corpus, from, to, km, minutes);
            }
        }
    }
}

/// Depot plus two customer stops, every directed pair one kilometre and two
/// minutes apart.
pub fn three_stop_corpus() -> Corpus {
    let mut corpus = corpus_with_stops(&[
        ("depot", -0.400, 39.500),
        ("a", -0.395, 39.505),
        ("b", -0.390, 39.510),
    ]);
    link_all_pairs(&mut corpus, 1.0, 2.0);
    corpus
}

/// Coordinates of a named stop (panics on unknown ids; tests only).
pub fn stop_coords(corpus: &Corpus, id: &str) -> GeoPoint {
    corpus.stop_coords(id).expect("known stop")
}
