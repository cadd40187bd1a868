//! Result export: CSV summaries of experiment runs and JSON dumps of the
//! full evaluation.

use std::fs::File;
use std::path::Path;

use drt_core::telemetry::SimulationStats;

use crate::runner::ExperimentResult;

/// One CSV row per run: headline service-quality and cost numbers.
pub fn export_summary_csv(
    path: &Path,
    results: &[ExperimentResult],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "seed",
        "total_requests",
        "scheduled_requests",
        "scheduled_percent",
        "rejected_requests",
        "num_vehicles",
        "total_kms",
        "total_cost",
    ])?;
    for result in results {
        let stats = &result.stats;
        writer.write_record([
            result.seed.map(|s| s.to_string()).unwrap_or_default(),
            stats.total_requests.to_string(),
            stats.scheduled_requests.to_string(),
            format!("{:.2}", stats.scheduled_percent),
            stats.rejected_requests.to_string(),
            stats.num_vehicles.to_string(),
            format!("{:.3}", stats.total_kms),
            format!("{:.3}", stats.total_cost),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One CSV row per served customer: wait, on-board time, and detour ratio.
pub fn export_customers_csv(
    path: &Path,
    stats: &SimulationStats,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "vehicle_id",
        "passenger_id",
        "wait_min",
        "on_board_min",
        "trip_kms",
        "min_kms",
    ])?;
    for vehicle in &stats.vehicle_stats {
        for customer in &vehicle.customer_stats {
            writer.write_record([
                vehicle.vehicle_id.clone(),
                customer.passenger_id.clone(),
                format!("{:.2}", customer.stats.wait),
                format!("{:.2}", customer.stats.on_board),
                format!("{:.3}", customer.stats.trip_kms),
                format!("{:.3}", customer.stats.min_kms),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Full evaluation as pretty-printed JSON.
pub fn export_stats_json(
    path: &Path,
    stats: &SimulationStats,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, stats)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_stats() -> SimulationStats {
        SimulationStats {
            total_requests: 0,
            scheduled_requests: 0,
            scheduled_percent: 0.0,
            rejected_requests: 0,
            rejected_percent: 0.0,
            num_vehicles: 0,
            total_cost: 0.0,
            total_kms: 0.0,
            vehicle_stats: vec![],
        }
    }

    #[test]
    fn summary_csv_has_a_row_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let results = vec![
            ExperimentResult {
                seed: Some(1),
                stats: empty_stats(),
            },
            ExperimentResult {
                seed: Some(2),
                stats: empty_stats(),
            },
        ];
        export_summary_csv(&path, &results).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        // Header plus two rows.
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.starts_with("seed,"));
    }

    #[test]
    fn stats_json_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        export_stats_json(&path, &empty_stats()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_requests"], 0);
    }
}
