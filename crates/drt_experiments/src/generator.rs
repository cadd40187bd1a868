//! Seeded demand generator: random customer requests over the stops corpus.
//!
//! Issue times are drawn over the experiment horizon with a minimum
//! separation; windows derive from the direct driving time between the drawn
//! stops. Deterministic for a fixed seed and corpus.

use drt_core::corpus::Corpus;
use drt_core::geo::lonlat_from_point;
use drt_core::scenario::CustomerConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimum separation between generated issue times (minutes).
const MIN_TIME_BETWEEN_REQUESTS: f64 = 0.5;

/// Tunables of the random demand.
#[derive(Debug, Clone)]
pub struct DemandParams {
    pub n_requests: usize,
    /// Horizon over which issue times are drawn (minutes).
    pub duration_minutes: f64,
    /// Width range of the pickup window (minutes).
    pub pickup_window: (f64, f64),
    /// Multiplier of the direct travel time allowed for the drop-off window.
    pub travel_factor: f64,
    pub seed: u64,
}

impl Default for DemandParams {
    fn default() -> Self {
        Self {
            n_requests: 20,
            duration_minutes: 20.0,
            pickup_window: (30.0, 45.0),
            travel_factor: 2.5,
            seed: 0,
        }
    }
}

/// Draw `n_requests` customers over the corpus stops. Stops are drawn
/// uniformly; a pair whose direct route is unknown falls back to a drawn
/// travel-time estimate.
pub fn generate_customers(corpus: &Corpus, params: &DemandParams) -> Vec<CustomerConfig> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let stop_ids: Vec<String> = corpus.stops.ids().map(str::to_string).collect();
    if stop_ids.len() < 2 {
        return Vec::new();
    }

    let mut issue_times: Vec<f64> = (0..params.n_requests)
        .map(|_| rng.gen_range(0.0..params.duration_minutes.max(MIN_TIME_BETWEEN_REQUESTS)))
        .collect();
    issue_times.sort_by(|a, b| a.partial_cmp(b).unwrap());
    // Enforce the minimum separation by pushing collisions forward.
    for i in 1..issue_times.len() {
        if issue_times[i] - issue_times[i - 1] < MIN_TIME_BETWEEN_REQUESTS {
            issue_times[i] = issue_times[i - 1] + MIN_TIME_BETWEEN_REQUESTS;
        }
    }

    let mut customers = Vec::with_capacity(params.n_requests);
    for (i, issue_time) in issue_times.into_iter().enumerate() {
        let origin = &stop_ids[rng.gen_range(0..stop_ids.len())];
        let destination = loop {
            let candidate = &stop_ids[rng.gen_range(0..stop_ids.len())];
            if candidate != origin {
                break candidate;
            }
        };

        let origin_ini = issue_time;
        let origin_end =
            origin_ini + rng.gen_range(params.pickup_window.0..params.pickup_window.1);
        let travel_minutes = corpus
            .route_time_min(origin, destination)
            .unwrap_or_else(|_| rng.gen_range(10.0..20.0));
        let dest_ini = origin_ini + travel_minutes;
        let dest_end = origin_end + travel_minutes * params.travel_factor;

        let position = lonlat_from_point(corpus.stop_coords(origin).expect("drawn stop"));
        let destination_coords =
            lonlat_from_point(corpus.stop_coords(destination).expect("drawn stop"));
        customers.push(CustomerConfig {
            name: format!("auto_generated_request_{i}"),
            position,
            destination: destination_coords,
            npass: 1,
            issue_time,
            origin_time_ini: origin_ini,
            origin_time_end: Some(origin_end),
            destination_time_ini: dest_ini,
            destination_time_end: dest_end,
        });
    }
    customers
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_core::corpus::StopsCorpus;
    use drt_core::routing::{GeodesicFetch, RouteFetch, RouteOracle};

    fn small_corpus() -> Corpus {
        let mut stops = StopsCorpus::default();
        stops.add("a", [-0.40, 39.50]).unwrap();
        stops.add("b", [-0.39, 39.51]).unwrap();
        stops.add("c", [-0.38, 39.52]).unwrap();
        let mut corpus = Corpus::new(stops, RouteOracle::default());
        let fetch = GeodesicFetch::new(30.0);
        let ids: Vec<String> = corpus.stops.ids().map(str::to_string).collect();
        for from in &ids {
            for to in &ids {
                if from != to {
                    let a = corpus.stop_coords(from).unwrap();
                    let b = corpus.stop_coords(to).unwrap();
                    corpus.routes.insert(a, b, fetch.fetch(a, b).unwrap());
                }
            }
        }
        corpus
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let corpus = small_corpus();
        let params = DemandParams {
            n_requests: 8,
            ..Default::default()
        };
        let first = generate_customers(&corpus, &params);
        let second = generate_customers(&corpus, &params);
        assert_eq!(first.len(), 8);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.position, b.position);
            assert_eq!(a.issue_time, b.issue_time);
        }
    }

    #[test]
    fn windows_are_ordered_and_separated() {
        let corpus = small_corpus();
        let params = DemandParams {
            n_requests: 10,
            seed: 7,
            ..Default::default()
        };
        let customers = generate_customers(&corpus, &params);
        for pair in customers.windows(2) {
            assert!(
                pair[1].issue_time - pair[0].issue_time >= MIN_TIME_BETWEEN_REQUESTS - 1e-9
            );
        }
        for customer in &customers {
            assert!(customer.origin_time_end.unwrap() > customer.origin_time_ini);
            assert!(customer.destination_time_end > customer.destination_time_ini);
            assert!(customer.destination_time_ini >= customer.origin_time_ini);
            assert_ne!(customer.position, customer.destination);
        }
    }
}
