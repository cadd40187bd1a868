//! Telemetry: records of scheduled services and vehicle arrivals, plus the
//! solution-evaluation aggregates.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::corpus::Corpus;
use crate::error::ScheduleError;
use crate::itinerary::{CustomerStats, VehicleStats};
use crate::scheduler::Scheduler;

/// One accepted request, recorded when its insertion is committed.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub passenger_id: String,
    pub vehicle_id: String,
    pub npass: u32,
    /// Minute the request was issued.
    pub issue_time: f64,
    /// Planned arrival at the pickup stop.
    pub pickup_at: f64,
    /// Planned arrival at the set-down stop.
    pub dropoff_at: f64,
    /// Cost increment of the committed insertion (km).
    pub cost_increment: f64,
}

/// One vehicle arrival at a plan stop.
#[derive(Debug, Clone, Serialize)]
pub struct StopArrivalRecord {
    pub vehicle_id: String,
    pub stop_id: String,
    /// Minute of arrival in simulation time.
    pub arrived_at: f64,
}

/// Collects dispatch telemetry. Insert as a resource to record services and
/// arrivals.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub services: Vec<ServiceRecord>,
    pub arrivals: Vec<StopArrivalRecord>,
}

/// Aggregate evaluation of a solved problem instance.
#[derive(Debug, Serialize)]
pub struct SimulationStats {
    pub total_requests: usize,
    pub scheduled_requests: usize,
    pub scheduled_percent: f64,
    pub rejected_requests: usize,
    pub rejected_percent: f64,
    pub num_vehicles: usize,
    pub total_cost: f64,
    pub total_kms: f64,
    pub vehicle_stats: Vec<VehicleEntry>,
}

#[derive(Debug, Serialize)]
pub struct VehicleEntry {
    pub vehicle_id: String,
    #[serde(flatten)]
    pub stats: VehicleStats,
    pub customer_stats: Vec<CustomerEntry>,
}

#[derive(Debug, Serialize)]
pub struct CustomerEntry {
    pub passenger_id: String,
    #[serde(flatten)]
    pub stats: CustomerStats,
}

/// Evaluate a solved instance: per-vehicle and per-customer metrics plus the
/// fleet-wide service quality and cost totals.
pub fn simulation_stats(
    scheduler: &Scheduler,
    corpus: &Corpus,
) -> Result<SimulationStats, ScheduleError> {
    let scheduled = scheduler.scheduled_requests.len();
    let rejected = scheduler.rejected_requests.len();
    let total = scheduled + rejected;
    let percent = |n: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64 * 100.0
        }
    };

    let mut total_cost = 0.0;
    let mut total_kms = 0.0;
    let mut vehicles = Vec::with_capacity(scheduler.itineraries.len());
    for itinerary in &scheduler.itineraries {
        let stats = itinerary.vehicle_stats(corpus)?;
        total_cost += stats.cost;
        total_kms += stats.itinerary_kms;
        let mut customers: Vec<CustomerEntry> = itinerary
            .customer_stats(corpus)?
            .into_iter()
            .map(|(passenger_id, stats)| CustomerEntry {
                passenger_id,
                stats,
            })
            .collect();
        customers.sort_by(|a, b| a.passenger_id.cmp(&b.passenger_id));
        vehicles.push(VehicleEntry {
            vehicle_id: itinerary.vehicle_id.clone(),
            stats,
            customer_stats: customers,
        });
    }

    Ok(SimulationStats {
        total_requests: total,
        scheduled_requests: scheduled,
        scheduled_percent: percent(scheduled),
        rejected_requests: rejected,
        rejected_percent: percent(rejected),
        num_vehicles: scheduler.itineraries.len(),
        total_cost,
        total_kms,
        vehicle_stats: vehicles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::Itinerary;
    use crate::request::Request;
    use crate::scheduler::{ByIssuanceOrder, OrderingPolicy};
    use crate::test_helpers::three_stop_corpus;

    #[test]
    fn stats_aggregate_scheduled_and_rejected() {
        let corpus = three_stop_corpus();
        let itinerary =
            Itinerary::new(&corpus, "bus1", 4, "depot", "depot", 0.0, 240.0).unwrap();
        let mut scheduler = Scheduler::new(vec![itinerary]);
        scheduler.pending_requests.push(
            Request::new(
                &corpus, "alice", "a", "b", 10.0, Some(30.0), 12.0, 40.0, 1, 0.0, 15.0, 1.0,
            )
            .unwrap(),
        );
        scheduler.pending_requests.push(
            // Set-down closes before the trip can physically finish.
            Request::new(
                &corpus, "carol", "a", "b", 10.0, Some(30.0), 11.0, 12.0, 1, 0.0, 15.0, 1.0,
            )
            .unwrap(),
        );
        ByIssuanceOrder.run(&mut scheduler, &corpus).unwrap();

        let stats = simulation_stats(&scheduler, &corpus).unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.scheduled_requests, 1);
        assert_eq!(stats.rejected_requests, 1);
        assert_eq!(stats.scheduled_percent, 50.0);
        assert_eq!(stats.num_vehicles, 1);
        assert!((stats.total_kms - 3.0).abs() < 1e-9);

        let vehicle = &stats.vehicle_stats[0];
        assert_eq!(vehicle.vehicle_id, "bus1");
        assert_eq!(vehicle.customer_stats.len(), 1);
        let alice = &vehicle.customer_stats[0];
        assert_eq!(alice.passenger_id, "alice");
        // Direct a -> b distance equals the carried segment here.
        assert!((alice.stats.trip_kms - alice.stats.min_kms).abs() < 1e-9);
        assert!(alice.stats.on_board > 0.0);
    }
}
