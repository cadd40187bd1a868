//! Experiment runner: solve one scenario offline or drive the online event
//! loop, and sweep seeds in parallel.

use bevy_ecs::prelude::World;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use drt_core::corpus::{Corpus, CorpusResource};
use drt_core::error::ScheduleError;
use drt_core::runner::{run_until_empty, simulation_schedule};
use drt_core::scenario::{
    build_scenario, create_ordering_policy, itineraries_from_config, FleetConfig, ScenarioParams,
};
use drt_core::scheduler::{Scheduler, SchedulerResource};
use drt_core::telemetry::{simulation_stats, SimTelemetry, SimulationStats};

use crate::generator::{generate_customers, DemandParams};

/// Safety cap on event-loop steps per run.
const MAX_EVENT_STEPS: usize = 5_000_000;

/// How a scenario is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One-shot solve of all configured customers with the ordering policy.
    #[default]
    Offline,
    /// Full dispatch loop with position polling and mid-trip rerouting.
    Online,
}

/// Outcome of one experiment run.
#[derive(Debug, Serialize)]
pub struct ExperimentResult {
    pub seed: Option<u64>,
    pub stats: SimulationStats,
}

/// Solve the configured customers in one shot, without the dispatch loop.
pub fn run_offline(
    corpus: &mut Corpus,
    config: &FleetConfig,
    params: &ScenarioParams,
) -> Result<SimulationStats, ScheduleError> {
    let itineraries = itineraries_from_config(corpus, config)?;
    let mut scheduler = Scheduler::new(itineraries);

    for customer in &config.customers {
        let origin_id = corpus.stops.id_at(customer.position)?.to_string();
        let destination_id = corpus.stops.id_at(customer.destination)?.to_string();
        scheduler
            .pending_requests
            .push(drt_core::request::Request::new(
                corpus,
                &customer.name,
                &origin_id,
                &destination_id,
                customer.origin_time_ini,
                customer.origin_time_end,
                customer.destination_time_ini,
                customer.destination_time_end,
                customer.npass,
                customer.issue_time,
                params.max_wait_minutes,
                params.service_minutes_per_passenger,
            )?);
    }

    let policy = create_ordering_policy(params);
    info!(
        "solving {} request(s) with the {} policy",
        scheduler.pending_requests.len(),
        policy.name()
    );
    policy.run(&mut scheduler, corpus)?;
    simulation_stats(&scheduler, corpus)
}

/// Run the full online dispatch loop to completion. Returns the solution
/// evaluation together with the collected telemetry.
pub fn run_online(
    corpus: Corpus,
    config: FleetConfig,
    params: ScenarioParams,
) -> Result<(SimulationStats, SimTelemetry), ScheduleError> {
    let mut world = World::new();
    build_scenario(&mut world, corpus, config, params)?;
    let mut schedule = simulation_schedule();
    let steps = run_until_empty(&mut world, &mut schedule, MAX_EVENT_STEPS);
    info!("event loop finished after {steps} step(s)");

    let stats = {
        let scheduler = &world.resource::<SchedulerResource>().0;
        let corpus = &world.resource::<CorpusResource>().0;
        simulation_stats(scheduler, corpus)?
    };
    let telemetry = world
        .remove_resource::<SimTelemetry>()
        .unwrap_or_default();
    Ok((stats, telemetry))
}

/// Run one generated-demand experiment for each seed, in parallel.
pub fn run_seed_sweep<F>(
    seeds: &[u64],
    demand: &DemandParams,
    params: &ScenarioParams,
    make_instance: F,
) -> Vec<Result<ExperimentResult, ScheduleError>>
where
    F: Fn() -> (Corpus, FleetConfig) + Sync,
{
    let bar = ProgressBar::new(seeds.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} seeds {msg}")
            .expect("valid progress template"),
    );

    let results: Vec<Result<ExperimentResult, ScheduleError>> = seeds
        .par_iter()
        .map(|&seed| {
            let (mut corpus, mut config) = make_instance();
            let demand = DemandParams {
                seed,
                ..demand.clone()
            };
            config.customers = generate_customers(&corpus, &demand);
            let stats = run_offline(&mut corpus, &config, params)?;
            bar.inc(1);
            Ok(ExperimentResult {
                seed: Some(seed),
                stats,
            })
        })
        .collect();
    bar.finish();
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_core::corpus::StopsCorpus;
    use drt_core::routing::{GeodesicFetch, RouteFetch, RouteOracle};
    use drt_core::scenario::{CustomerConfig, TransportConfig};

    fn test_corpus() -> Corpus {
        let mut stops = StopsCorpus::default();
        stops.add("depot", [-0.400, 39.500]).unwrap();
        stops.add("a", [-0.395, 39.505]).unwrap();
        stops.add("b", [-0.390, 39.510]).unwrap();
        let mut corpus = Corpus::new(stops, RouteOracle::default());
        let fetch = GeodesicFetch::new(30.0);
        let ids: Vec<String> = corpus.stops.ids().map(str::to_string).collect();
        for from in &ids {
            for to in &ids {
                if from != to {
                    let p = corpus.stop_coords(from).unwrap();
                    let q = corpus.stop_coords(to).unwrap();
                    corpus.routes.insert(p, q, fetch.fetch(p, q).unwrap());
                }
            }
        }
        corpus
    }

    fn test_config() -> FleetConfig {
        FleetConfig {
            transports: vec![TransportConfig {
                name: "bus1".into(),
                position: [-0.400, 39.500],
                destination: [-0.400, 39.500],
                capacity: 4,
                speed: 30.0,
                start_time: 0.0,
                end_time: 480.0,
            }],
            customers: vec![CustomerConfig {
                name: "alice".into(),
                position: [-0.395, 39.505],
                destination: [-0.390, 39.510],
                npass: 1,
                issue_time: 1.0,
                origin_time_ini: 10.0,
                origin_time_end: Some(40.0),
                destination_time_ini: 11.0,
                destination_time_end: 80.0,
            }],
        }
    }

    #[test]
    fn offline_run_schedules_the_configured_customer() {
        let mut corpus = test_corpus();
        let stats = run_offline(&mut corpus, &test_config(), &ScenarioParams::default()).unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.scheduled_requests, 1);
        assert!(stats.total_kms > 0.0);
    }

    #[test]
    fn seed_sweep_produces_one_result_per_seed() {
        let demand = DemandParams {
            n_requests: 3,
            duration_minutes: 30.0,
            ..Default::default()
        };
        let results = run_seed_sweep(
            &[1, 2, 3],
            &demand,
            &ScenarioParams::default(),
            || {
                let corpus = test_corpus();
                let mut config = test_config();
                config.customers.clear();
                (corpus, config)
            },
        );
        assert_eq!(results.len(), 3);
        for result in results {
            let result = result.unwrap();
            assert_eq!(result.stats.total_requests, 3);
        }
    }
}
