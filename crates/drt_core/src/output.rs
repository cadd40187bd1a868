//! Itinerary output files, refreshed after each scheduling cycle.
//!
//! `vehicle_itineraries.json` maps vehicle ids to their ordered stop lists;
//! `customer_itineraries.json` maps passenger ids to their served segment,
//! or an empty array when the request was rejected. Existing entries are
//! merged, not overwritten wholesale, so repeated cycles update only the
//! vehicles and customers they touched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::CorpusError;
use crate::itinerary::PlanStop;
use crate::scheduler::Scheduler;

fn load_map(path: &Path) -> Result<BTreeMap<String, Vec<PlanStop>>, CorpusError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&data)?)
}

fn store_map(path: &Path, map: &BTreeMap<String, Vec<PlanStop>>) -> Result<(), CorpusError> {
    let data = serde_json::to_string_pretty(map)?;
    fs::write(path, data)?;
    Ok(())
}

/// Merge the plans modified in the last cycle into `vehicle_itineraries.json`.
pub fn write_vehicle_itineraries(path: &Path, scheduler: &Scheduler) -> Result<(), CorpusError> {
    let mut data = load_map(path)?;
    for (vehicle_id, plan) in &scheduler.modified_itineraries {
        data.insert(vehicle_id.clone(), plan.clone());
    }
    store_map(path, &data)
}

/// Merge the customer segments touched by the last cycle into
/// `customer_itineraries.json`. Rejected customers get an empty segment.
pub fn write_customer_itineraries(path: &Path, scheduler: &Scheduler) -> Result<(), CorpusError> {
    let mut data = load_map(path)?;
    for request in &scheduler.scheduled_requests {
        let segment = scheduler.passenger_segment(&request.passenger_id);
        if !segment.is_empty() {
            data.insert(request.passenger_id.clone(), segment);
        }
    }
    for request in &scheduler.rejected_requests {
        data.insert(request.passenger_id.clone(), Vec::new());
    }
    store_map(path, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::Itinerary;
    use crate::request::Request;
    use crate::scheduler::{ByIssuanceOrder, OrderingPolicy};
    use crate::test_helpers::three_stop_corpus;

    #[test]
    fn outputs_cover_scheduled_and_rejected_customers() {
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
            Request::new(
                &corpus, "carol", "a", "b", 10.0, Some(30.0), 11.0, 12.0, 1, 0.0, 15.0, 1.0,
            )
            .unwrap(),
        );
        ByIssuanceOrder.run(&mut scheduler, &corpus).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let vehicles_path = dir.path().join("vehicle_itineraries.json");
        let customers_path = dir.path().join("customer_itineraries.json");
        write_vehicle_itineraries(&vehicles_path, &scheduler).unwrap();
        write_customer_itineraries(&customers_path, &scheduler).unwrap();

        let vehicles = load_map(&vehicles_path).unwrap();
        assert_eq!(vehicles["bus1"].len(), 4);

        let customers = load_map(&customers_path).unwrap();
        // Pickup and set-down, in itinerary order.
        assert_eq!(customers["alice"].len(), 2);
        assert_eq!(customers["alice"][0].stop_id, "a");
        assert_eq!(customers["alice"][1].stop_id, "b");
        // Rejected: empty segment.
        assert!(customers["carol"].is_empty());

        // A second write merges instead of clobbering.
        write_customer_itineraries(&customers_path, &scheduler).unwrap();
        let customers = load_map(&customers_path).unwrap();
        assert_eq!(customers.len(), 2);
    }
}
