//! Scenario runner CLI: load the corpora and fleet configuration, solve the
//! instance offline or drive the online dispatch loop, and export results.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use drt_core::corpus::Corpus;
use drt_core::scenario::{FleetConfig, OrderingPolicyKind, OutputPaths, ScenarioParams};
use drt_core::telemetry_export::{write_arrivals_parquet, write_services_parquet};
use drt_experiments::export::{export_customers_csv, export_stats_json, export_summary_csv};
use drt_experiments::generator::DemandParams;
use drt_experiments::runner::{run_offline, run_online, run_seed_sweep, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Offline,
    Online,
    /// Parallel batch of offline runs over generated demand, one per seed.
    Sweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    IssuanceOrder,
    MinimalCost,
}

#[derive(Parser, Debug)]
#[command(name = "drt_experiments", about = "Demand-responsive transport scenario runner")]
struct Args {
    /// Stops corpus (feature collection JSON).
    #[arg(long)]
    stops: PathBuf,
    /// Routes corpus (coordinate-pair keyed JSON).
    #[arg(long)]
    routes: PathBuf,
    /// Fleet / demand configuration JSON.
    #[arg(long)]
    config: PathBuf,
    /// Solve offline in one shot, or run the online dispatch loop.
    #[arg(long, value_enum, default_value_t = ModeArg::Offline)]
    mode: ModeArg,
    /// Request ordering policy for the offline solve.
    #[arg(long, value_enum, default_value_t = PolicyArg::IssuanceOrder)]
    policy: PolicyArg,
    /// Stop the online loop at this fleet minute.
    #[arg(long)]
    end_minutes: Option<f64>,
    /// OSRM endpoint for routes missing from the corpus.
    #[arg(long)]
    osrm: Option<String>,
    /// Number of demand seeds in a sweep (seeds 0..N).
    #[arg(long, default_value_t = 10)]
    seeds: u64,
    /// Generated requests per sweep run.
    #[arg(long, default_value_t = 20)]
    sweep_requests: usize,
    /// Directory for result files.
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,
}

/// Load a fresh corpus/config pair for one sweep run. Sweep instances share
/// nothing mutable, so each run reloads from disk.
fn load_instance(args: &Args) -> (Corpus, FleetConfig) {
    #[allow(unused_mut)]
    let mut corpus = Corpus::load(&args.stops, &args.routes).expect("corpora loaded once already");
    #[cfg(feature = "osrm")]
    if let Some(endpoint) = &args.osrm {
        use drt_core::routing::osrm::{CachedFetch, OsrmFetch};
        corpus.routes = std::mem::take(&mut corpus.routes).with_fetch(Box::new(
            CachedFetch::with_default_capacity(Box::new(OsrmFetch::new(endpoint))),
        ));
    }
    let mut config = FleetConfig::load(&args.config).expect("config loaded once already");
    // Demand comes from the generator; only the fleet is kept.
    config.customers.clear();
    (corpus, config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut corpus = Corpus::load(&args.stops, &args.routes)?;
    #[cfg(feature = "osrm")]
    if let Some(endpoint) = &args.osrm {
        use drt_core::routing::osrm::{CachedFetch, OsrmFetch};
        corpus.routes = std::mem::take(&mut corpus.routes).with_fetch(Box::new(
            CachedFetch::with_default_capacity(Box::new(OsrmFetch::new(endpoint))),
        ));
    }
    #[cfg(not(feature = "osrm"))]
    if args.osrm.is_some() {
        tracing::warn!("built without the osrm feature; --osrm is ignored");
    }

    let config = FleetConfig::load(&args.config)?;
    info!(
        "loaded {} stop(s), {} route(s), {} transport(s), {} customer(s)",
        corpus.stops.len(),
        corpus.routes.len(),
        config.transports.len(),
        config.customers.len()
    );

    std::fs::create_dir_all(&args.out_dir)?;
    let mut params = ScenarioParams {
        ordering_policy: match args.policy {
            PolicyArg::IssuanceOrder => OrderingPolicyKind::ByIssuanceOrder,
            PolicyArg::MinimalCost => OrderingPolicyKind::ByMinimalCost,
        },
        simulation_end_minutes: args.end_minutes,
        ..Default::default()
    };

    if args.mode == ModeArg::Sweep {
        let seeds: Vec<u64> = (0..args.seeds).collect();
        let demand = DemandParams {
            n_requests: args.sweep_requests,
            ..Default::default()
        };
        info!("sweeping {} seed(s), {} request(s) each", seeds.len(), demand.n_requests);
        let results = run_seed_sweep(&seeds, &demand, &params, || load_instance(&args));

        let mut succeeded = Vec::new();
        for result in results {
            match result {
                Ok(result) => succeeded.push(result),
                Err(e) => tracing::error!("sweep run failed: {e}"),
            }
        }
        let summary_path = args.out_dir.join("sweep_summary.csv");
        export_summary_csv(&summary_path, &succeeded)?;
        info!(
            "{}/{} run(s) succeeded; summary written to {}",
            succeeded.len(),
            args.seeds,
            summary_path.display()
        );
        return Ok(());
    }

    let mode = match args.mode {
        ModeArg::Offline => RunMode::Offline,
        ModeArg::Online => RunMode::Online,
        ModeArg::Sweep => unreachable!("handled above"),
    };
    let stats = match mode {
        RunMode::Offline => run_offline(&mut corpus, &config, &params)?,
        RunMode::Online => {
            params = params.with_output(OutputPaths {
                vehicle_itineraries: args.out_dir.join("vehicle_itineraries.json"),
                customer_itineraries: args.out_dir.join("customer_itineraries.json"),
            });
            let (stats, telemetry) = run_online(corpus, config, params)?;
            write_services_parquet(args.out_dir.join("services.parquet"), &telemetry)?;
            write_arrivals_parquet(args.out_dir.join("arrivals.parquet"), &telemetry)?;
            stats
        }
    };

    info!(
        "scheduled {}/{} request(s) ({:.1}%), fleet drove {:.2} km",
        stats.scheduled_requests,
        stats.total_requests,
        stats.scheduled_percent,
        stats.total_kms
    );

    export_stats_json(&args.out_dir.join("simulation_stats.json"), &stats)?;
    export_customers_csv(&args.out_dir.join("customer_metrics.csv"), &stats)?;
    Ok(())
}
