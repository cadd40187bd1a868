//! Insertion-based scheduler: per-request search over every feasible
//! (pickup-position x set-down-position) pair across all itineraries,
//! committing the cheapest.
//!
//! The search always works on deep copies of the authoritative itineraries;
//! only [`Scheduler::insert_trip`] / [`Scheduler::remove_trip`] mutate them.
//! When a vehicle is travelling between stops at search time, a synthetic
//! zero-service stop at its reported position is spliced into the candidate
//! itinerary so the vehicle can be rerouted mid-leg.

pub mod policy;

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::error::ScheduleError;
use crate::geo::GeoPoint;
use crate::insertion::Insertion;
use crate::itinerary::{Feasibility, Itinerary, PlanStop, VehicleWhereabouts};
use crate::request::Request;
use crate::stop::Stop;

pub use policy::{ByIssuanceOrder, ByMinimalCost, OrderingPolicy};

/// ECS resource wrapping the scheduler.
#[derive(Resource)]
pub struct SchedulerResource(pub Scheduler);

/// The scheduler: request sets, authoritative itineraries, and the
/// per-cycle state of the online search.
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Unscheduled requests, ordered by issuance.
    pub pending_requests: Vec<Request>,
    pub scheduled_requests: Vec<Request>,
    pub rejected_requests: Vec<Request>,
    /// One authoritative itinerary per fleet vehicle.
    pub itineraries: Vec<Itinerary>,
    /// Committed insertions per vehicle.
    pub insertion_log: HashMap<String, Vec<Insertion>>,
    /// Vehicle positions reported for the current scheduling cycle.
    pub transport_positions: HashMap<String, GeoPoint>,
    /// Plans touched by the insertions of the current cycle.
    pub modified_itineraries: HashMap<String, Vec<PlanStop>>,
    /// Candidate bases the last search evaluated, including any synthetic
    /// current-position stop. Commits apply to these so that committed
    /// indices always refer to the searched snapshot.
    prepared: HashMap<String, Itinerary>,
}

impl Scheduler {
    pub fn new(itineraries: Vec<Itinerary>) -> Self {
        let insertion_log = itineraries
            .iter()
            .map(|i| (i.vehicle_id.clone(), Vec::new()))
            .collect();
        Self {
            itineraries,
            insertion_log,
            ..Default::default()
        }
    }

    pub fn itinerary(&self, vehicle_id: &str) -> Option<&Itinerary> {
        self.itineraries.iter().find(|i| i.vehicle_id == vehicle_id)
    }

    fn itinerary_index(&self, vehicle_id: &str) -> Result<usize, ScheduleError> {
        self.itineraries
            .iter()
            .position(|i| i.vehicle_id == vehicle_id)
            .ok_or_else(|| ScheduleError::UnknownVehicle(vehicle_id.to_string()))
    }

    pub fn delete_pending_request(&mut self, passenger_id: &str) {
        self.pending_requests
            .retain(|r| r.passenger_id != passenger_id);
    }

    pub fn set_transport_positions(&mut self, positions: HashMap<String, GeoPoint>) {
        self.transport_positions = positions;
    }

    /// All plans, keyed by vehicle.
    pub fn all_plans(&self) -> HashMap<String, Vec<PlanStop>> {
        self.itineraries
            .iter()
            .map(|i| (i.vehicle_id.clone(), i.as_plan_stops()))
            .collect()
    }

    /// The served segment of one passenger's plan, empty when unscheduled.
    pub fn passenger_segment(&self, passenger_id: &str) -> Vec<PlanStop> {
        for itinerary in &self.itineraries {
            let plan = itinerary.as_plan_stops();
            let indices: Vec<usize> = plan
                .iter()
                .enumerate()
                .filter(|(_, s)| s.passenger_id.as_deref() == Some(passenger_id))
                .map(|(i, _)| i)
                .collect();
            if indices.len() == 2 {
                return plan[indices[0]..=indices[1]].to_vec();
            }
        }
        Vec::new()
    }

    /// Synthetic zero-service stop at a vehicle's reported position, valid
    /// only at `time_now`.
    fn create_current_stop(
        &self,
        corpus: &mut Corpus,
        vehicle_id: &str,
        time_now: f64,
    ) -> Result<Stop, ScheduleError> {
        let coords = *self
            .transport_positions
            .get(vehicle_id)
            .ok_or_else(|| ScheduleError::UnknownVehicle(vehicle_id.to_string()))?;
        let stop_id = format!("{vehicle_id}-current-0");
        corpus
            .add_synthetic_stop(&stop_id, coords)
            .map_err(ScheduleError::Corpus)?;
        Ok(Stop::at(&stop_id, coords).with_window(time_now, time_now, 0.0, Some(vehicle_id)))
    }

    /// Fetch the routes needed to evaluate inserting `stop` before or after
    /// any of the given itinerary positions.
    fn prefetch_routes(
        &self,
        corpus: &mut Corpus,
        stop: &Stop,
        itinerary: &Itinerary,
        range: std::ops::Range<usize>,
    ) -> Result<(), ScheduleError> {
        for i in range {
            let other = itinerary.stops[i].coords;
            corpus.routes.ensure(stop.coords, other)?;
            corpus.routes.ensure(other, stop.coords)?;
        }
        Ok(())
    }

    /// First position in `[from, len)` whose EAT has passed `latest`. Used
    /// to scope route prefetching only: stops beyond it cannot legally
    /// precede the inserted stop, so no route to them will be consulted
    /// before the feasibility tests abandon the itinerary on their own.
    fn eat_window_end(itinerary: &Itinerary, from: usize, latest: f64) -> usize {
        itinerary.stops[from..]
            .iter()
            .position(|s| s.eat >= latest)
            .map(|p| from + p)
            .unwrap_or(itinerary.stops.len())
    }

    /// Core position search over one candidate itinerary. `base_cost` is the
    /// cost of the authoritative itinerary the deltas are measured against.
    #[allow(clippy::too_many_arguments)]
    fn search_itinerary(
        &self,
        candidate: &Itinerary,
        base_cost: f64,
        request: &Request,
        spu: &Stop,
        ssd: &Stop,
        index_current: usize,
        window_end: usize,
        corpus: &Corpus,
        min_delta: &mut f64,
        best: &mut Option<Insertion>,
        feasible: &mut Vec<Insertion>,
    ) -> Result<(), ScheduleError> {
        for r in index_current..window_end.saturating_sub(1) {
            let index_spu = r + 1;
            match candidate.pickup_feasibility(request, spu, r, corpus)? {
                Feasibility::Abandon => break,
                Feasibility::TryNext => continue,
                Feasibility::Ok => {}
            }

            let mut with_spu = candidate.clone();
            with_spu.insert_stop(spu.clone(), index_spu, 0, corpus)?;
            let delta_i = with_spu.cost - base_cost;
            if delta_i >= *min_delta {
                continue;
            }

            for r_j in index_spu..with_spu.len() - 1 {
                let index_ssd = r_j + 1;
                match with_spu.setdown_feasibility(request, index_spu, index_ssd, ssd, r_j, corpus)?
                {
                    Feasibility::Abandon => break,
                    Feasibility::TryNext => continue,
                    Feasibility::Ok => {}
                }

                let mut with_both = with_spu.clone();
                with_both.insert_stop(ssd.clone(), index_ssd, 0, corpus)?;
                let delta_ij = with_both.cost - base_cost;

                let found = Insertion {
                    vehicle_id: candidate.vehicle_id.clone(),
                    request: request.clone(),
                    index_spu,
                    index_ssd,
                    cost_increment: delta_ij,
                };
                feasible.push(found.clone());

                // Strictly less-than: the first-found minimum wins.
                if delta_ij < *min_delta {
                    *min_delta = delta_ij;
                    *best = Some(found);
                }
            }
        }
        Ok(())
    }

    /// Online search for the minimum-cost insertion of `request`, against the
    /// vehicle positions reported for this cycle. Returns the best insertion
    /// and every feasible one.
    pub fn schedule_request(
        &mut self,
        request: &Request,
        issue_time: f64,
        corpus: &mut Corpus,
    ) -> Result<(Option<Insertion>, Vec<Insertion>), ScheduleError> {
        self.modified_itineraries.clear();
        self.prepared.clear();
        corpus.purge_current_stops();

        let spu = request.spu.clone();
        let ssd = request.ssd.clone();
        corpus.ensure_route(&request.origin_id, &request.destination_id)?;

        let mut min_delta = f64::INFINITY;
        let mut best = None;
        let mut feasible = Vec::new();

        for idx in 0..self.itineraries.len() {
            // The pickup can only go after the stop the vehicle is at, or
            // after the stop it is currently driving towards.
            let (index_current, status) = if self.itineraries[idx].len() > 2 {
                self.itineraries[idx].position_at_time(issue_time)
            } else {
                (0, VehicleWhereabouts::AtStop)
            };
            debug!(
                vehicle = %self.itineraries[idx].vehicle_id,
                index_current,
                ?status,
                "search window for request {}",
                request.passenger_id
            );

            let mut candidate = self.itineraries[idx].clone();
            let vehicle_id = candidate.vehicle_id.clone();

            if index_current > 0 && status == VehicleWhereabouts::TravellingToStop {
                // Splice the vehicle's live position so it can be rerouted
                // while driving this leg.
                let current_stop = self.create_current_stop(corpus, &vehicle_id, issue_time)?;
                self.prefetch_routes(
                    corpus,
                    &current_stop,
                    &candidate,
                    index_current - 1..index_current + 1,
                )?;
                candidate.insert_stop(current_stop, index_current, 0, corpus)?;
            }

            let window_end_spu = Self::eat_window_end(&candidate, index_current, spu.latest);
            self.prefetch_routes(corpus, &spu, &candidate, index_current..window_end_spu)?;
            let window_end_ssd = Self::eat_window_end(&candidate, index_current, ssd.latest);
            self.prefetch_routes(corpus, &ssd, &candidate, index_current..window_end_ssd)?;

            // The search itself scans every remaining position; the
            // feasibility tests abandon the itinerary when EAT has
            // monotonically passed the candidate's window.
            let base_cost = self.itineraries[idx].cost;
            self.search_itinerary(
                &candidate,
                base_cost,
                request,
                &spu,
                &ssd,
                index_current,
                candidate.len(),
                corpus,
                &mut min_delta,
                &mut best,
                &mut feasible,
            )?;

            self.prepared.insert(vehicle_id, candidate);
        }

        Ok((best, feasible))
    }

    /// Offline search over the full fleet, from each vehicle's current
    /// location. No synthetic stops and no prefetching: the corpus must
    /// already hold every consulted route.
    pub fn exhaustive_search(
        &mut self,
        request: &Request,
        corpus: &Corpus,
    ) -> Result<(Option<Insertion>, Vec<Insertion>), ScheduleError> {
        let spu = request.spu.clone();
        let ssd = request.ssd.clone();

        let mut min_delta = f64::INFINITY;
        let mut best = None;
        let mut feasible = Vec::new();

        for idx in 0..self.itineraries.len() {
            let candidate = self.itineraries[idx].clone();
            let index_current = candidate.current_loc;
            self.search_itinerary(
                &candidate,
                candidate.cost,
                request,
                &spu,
                &ssd,
                index_current,
                candidate.len(),
                corpus,
                &mut min_delta,
                &mut best,
                &mut feasible,
            )?;
        }

        Ok((best, feasible))
    }

    /// The globally cheapest feasible insertion over all pending requests.
    pub fn minimal_cost_insertion(
        &mut self,
        corpus: &Corpus,
    ) -> Result<Option<Insertion>, ScheduleError> {
        let pending = self.pending_requests.clone();
        let mut found: Vec<Insertion> = Vec::new();
        for request in &pending {
            let (_, feasible) = self.exhaustive_search(request, corpus)?;
            debug!(
                "found {} feasible insertion(s) for request {}",
                feasible.len(),
                request.passenger_id
            );
            found.extend(feasible);
        }
        found.sort_by(|a, b| {
            a.cost_increment
                .partial_cmp(&b.cost_increment)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(found.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // Commit and its inverse
    // -----------------------------------------------------------------------

    /// Commit an insertion: place both trip stops, adjust the loads of the
    /// carrying segment, and replace the authoritative itinerary with the
    /// searched snapshot. Invariant violations abort the commit.
    pub fn insert_trip(
        &mut self,
        insertion: &Insertion,
        corpus: &Corpus,
    ) -> Result<(), ScheduleError> {
        debug!("committing: {insertion}");
        let idx = self.itinerary_index(&insertion.vehicle_id)?;
        let mut itinerary = self
            .prepared
            .remove(&insertion.vehicle_id)
            .unwrap_or_else(|| self.itineraries[idx].clone());

        let request = &insertion.request;
        itinerary.insert_stop(request.spu.clone(), insertion.index_spu, 0, corpus)?;
        itinerary.insert_stop(request.ssd.clone(), insertion.index_ssd, 0, corpus)?;

        // Both trip stops start from their predecessor's load, then the whole
        // carrying segment [index_spu, index_ssd) takes the new passengers.
        itinerary.stops[insertion.index_spu].npass =
            itinerary.stops[insertion.index_spu - 1].npass;
        itinerary.stops[insertion.index_spu].npres =
            itinerary.stops[insertion.index_spu - 1].npres;
        itinerary.stops[insertion.index_ssd].npass =
            itinerary.stops[insertion.index_ssd - 1].npass;
        itinerary.stops[insertion.index_ssd].npres =
            itinerary.stops[insertion.index_ssd - 1].npres;
        for i in insertion.index_spu..insertion.index_ssd {
            itinerary.stops[i].npass += request.npass;
            itinerary.stops[i].npres += request.npass;
        }

        itinerary.compute_cost(corpus)?;
        itinerary.validate(corpus)?;

        self.itineraries[idx] = itinerary;
        self.insertion_log
            .entry(insertion.vehicle_id.clone())
            .or_default()
            .push(insertion.clone());
        self.modified_itineraries.insert(
            insertion.vehicle_id.clone(),
            self.itineraries[idx].as_plan_stops(),
        );
        Ok(())
    }

    /// Undo a committed insertion: remove both trip stops and give the
    /// carried seats back to the segment between them.
    pub fn remove_trip(
        &mut self,
        insertion: &Insertion,
        corpus: &Corpus,
    ) -> Result<(), ScheduleError> {
        let idx = self.itinerary_index(&insertion.vehicle_id)?;
        let itinerary = &mut self.itineraries[idx];

        itinerary.remove_stop(insertion.index_ssd, corpus)?;
        itinerary.remove_stop(insertion.index_spu, corpus)?;

        // Former intermediates now sit at [index_spu, index_ssd - 1).
        for i in insertion.index_spu..insertion.index_ssd - 1 {
            itinerary.stops[i].npass -= insertion.request.npass;
            itinerary.stops[i].npres -= insertion.request.npass;
        }

        itinerary.compute_cost(corpus)?;
        itinerary.validate(corpus)?;

        if let Some(log) = self.insertion_log.get_mut(&insertion.vehicle_id) {
            log.retain(|i| i.request.passenger_id != insertion.request.passenger_id);
        }
        Ok(())
    }

    /// Schedule every pending request in issuance order against the current
    /// position snapshot. Returns the passengers rejected in this cycle.
    pub fn schedule_new_requests(
        &mut self,
        corpus: &mut Corpus,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut cycle_rejected = Vec::new();
        // Each per-request search clears `modified_itineraries`; the batch
        // keeps the union so every touched vehicle gets its updated plan.
        let mut touched: HashMap<String, Vec<PlanStop>> = HashMap::new();
        let pending = std::mem::take(&mut self.pending_requests);
        info!("scheduling {} new request(s)", pending.len());

        for request in pending {
            let (best, _) = self.schedule_request(&request, request.issue_time, corpus)?;
            match best {
                Some(insertion) => {
                    info!(
                        "request {} assigned to vehicle {} (+{:.2} km)",
                        request.passenger_id, insertion.vehicle_id, insertion.cost_increment
                    );
                    self.insert_trip(&insertion, corpus)?;
                    self.scheduled_requests.push(request);
                    touched.extend(self.modified_itineraries.drain());
                }
                None => {
                    info!("request {} cannot be scheduled", request.passenger_id);
                    cycle_rejected.push(request.passenger_id.clone());
                    self.rejected_requests.push(request);
                }
            }
        }
        self.modified_itineraries = touched;
        Ok(cycle_rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::GeodesicFetch;
    use crate::test_helpers::{set_route_km_min, three_stop_corpus};

    fn fleet_of_one(corpus: &Corpus, capacity: u32) -> Scheduler {
        let itinerary =
            Itinerary::new(corpus, "bus1", capacity, "depot", "depot", 0.0, 240.0).unwrap();
        Scheduler::new(vec![itinerary])
    }

    fn request(corpus: &Corpus, name: &str, windows: (f64, f64, f64, f64), npass: u32) -> Request {
        Request::new(
            corpus,
            name,
            "a",
            "b",
            windows.0,
            Some(windows.1),
            windows.2,
            windows.3,
            npass,
            5.0,
            15.0,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn trivial_request_is_accepted_at_the_cheapest_positions() {
        let corpus = three_stop_corpus();
        let mut scheduler = fleet_of_one(&corpus, 4);
        let r1 = request(&corpus, "alice", (10.0, 30.0, 12.0, 40.0), 1);

        let (best, feasible) = scheduler.exhaustive_search(&r1, &corpus).unwrap();
        let best = best.expect("r1 must fit an empty vehicle");
        assert_eq!(best.index_spu, 1);
        assert_eq!(best.index_ssd, 2);
        // depot -> a -> b -> depot over an empty round trip: +3 km.
        assert!((best.cost_increment - 3.0).abs() < 1e-9);
        assert!(!feasible.is_empty());

        scheduler.insert_trip(&best, &corpus).unwrap();
        let plan = &scheduler.itineraries[0];
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.stops[1].npass, 1);
        assert_eq!(plan.stops[2].npass, 0);
        plan.validate(&corpus).unwrap();
        assert!(scheduler.modified_itineraries.contains_key("bus1"));
    }

    #[test]
    fn impossible_dropoff_window_rejects_the_request() {
        let corpus = three_stop_corpus();
        let mut scheduler = fleet_of_one(&corpus, 4);
        // Pickup reachable at 10, but the set-down must end by minute 12:
        // arrival at b is earliest 10 + 1 + 2 = 13.
        let r3 = request(&corpus, "carol", (10.0, 30.0, 11.0, 12.0), 1);

        let (best, feasible) = scheduler.exhaustive_search(&r3, &corpus).unwrap();
        assert!(best.is_none());
        assert!(feasible.is_empty());
    }

    #[test]
    fn monotone_failure_stops_scanning_an_itinerary() {
        // Routes beyond the vehicle's current location are deliberately
        // missing: if the search did not abandon on the first monotone
        // failure it would fault on a missing route.
        let mut corpus = three_stop_corpus();
        corpus.stops.add("far", [-0.200, 39.700]).unwrap();
        set_route_km_min(&mut corpus, "depot", "far", 40.0, 60.0);
        set_route_km_min(&mut corpus, "far", "depot", 40.0, 60.0);

        let mut itinerary =
            Itinerary::new(&corpus, "bus1", 4, "depot", "depot", 0.0, 240.0).unwrap();
        let far_stop = Stop::detached(&corpus, "far")
            .unwrap()
            .with_window(50.0, 200.0, 1.0, Some("earlier"));
        itinerary.insert_stop(far_stop, 1, 1, &corpus).unwrap();
        // The vehicle has departed towards the far stop: EAT there is 60.
        itinerary.current_loc = 1;

        let mut scheduler = Scheduler::new(vec![itinerary]);
        // Pickup must happen by minute 26: every reachable predecessor from
        // the current location has eat > latest.
        let req = request(&corpus, "dave", (10.0, 30.0, 12.0, 40.0), 1);
        let (best, feasible) = scheduler.exhaustive_search(&req, &corpus).unwrap();
        assert!(best.is_none());
        assert!(feasible.is_empty());
    }

    #[test]
    fn positions_past_the_prefetch_window_are_still_searched() {
        // The plan visits a far stop whose EAT is long past the new pickup's
        // window. Route prefetching stops there, but the position search must
        // keep scanning: the only feasible pickup slot is right before that
        // far stop, and only the feasibility tests may abandon the itinerary.
        let mut corpus = three_stop_corpus();
        corpus.stops.add("far", [-0.200, 39.700]).unwrap();
        for other in ["depot", "a", "b"] {
            set_route_km_min(&mut corpus, other, "far", 40.0, 60.0);
            set_route_km_min(&mut corpus, "far", other, 40.0, 60.0);
        }

        let mut itinerary =
            Itinerary::new(&corpus, "bus1", 4, "depot", "depot", 0.0, 240.0).unwrap();
        // A set-down at `b` with a window too tight to admit a detour before
        // it, then a far-away pickup of another customer.
        let b_setdown = Stop::detached(&corpus, "b")
            .unwrap()
            .with_window(12.0, 13.5, 1.0, Some("earlier"));
        itinerary.insert_stop(b_setdown, 1, 0, &corpus).unwrap();
        let far_pickup = Stop::detached(&corpus, "far")
            .unwrap()
            .with_window(50.0, 200.0, 1.0, Some("later"));
        itinerary.insert_stop(far_pickup, 2, 1, &corpus).unwrap();

        let mut scheduler = Scheduler::new(vec![itinerary]);
        let req = Request::new(
            &corpus, "dave", "a", "b", 10.0, Some(28.0), 12.0, 90.0, 1, 0.0, 15.0, 1.0,
        )
        .unwrap();

        let (best, _) = scheduler.schedule_request(&req, 0.0, &mut corpus).unwrap();
        let best = best.expect("pickup after the tight set-down must be found");
        assert_eq!(best.index_spu, 2);
        assert_eq!(best.index_ssd, 3);
    }

    #[test]
    fn empty_fleet_finds_nothing() {
        let corpus = three_stop_corpus();
        let mut scheduler = Scheduler::new(Vec::new());
        let req = request(&corpus, "erin", (10.0, 30.0, 12.0, 40.0), 1);
        let (best, feasible) = scheduler.exhaustive_search(&req, &corpus).unwrap();
        assert!(best.is_none());
        assert!(feasible.is_empty());
    }

    #[test]
    fn issuance_order_is_deterministic_for_conflicting_requests() {
        let corpus = three_stop_corpus();
        let mut scheduler = fleet_of_one(&corpus, 1);

        // Both want the same tight a -> b ride; a single-seat vehicle can
        // serve only the first-issued one.
        let r_a = request(&corpus, "ana", (10.0, 12.0, 12.0, 14.0), 1);
        let r_b = request(&corpus, "ben", (10.0, 12.0, 12.0, 14.0), 1);

        let (best_a, _) = scheduler.exhaustive_search(&r_a, &corpus).unwrap();
        scheduler
            .insert_trip(&best_a.expect("first request fits"), &corpus)
            .unwrap();
        scheduler.scheduled_requests.push(r_a);

        let (best_b, feasible_b) = scheduler.exhaustive_search(&r_b, &corpus).unwrap();
        assert!(best_b.is_none(), "second request must be rejected");
        assert!(feasible_b.is_empty());
    }

    #[test]
    fn travelling_vehicle_gets_a_synthetic_current_stop() {
        let mut corpus = three_stop_corpus();
        corpus.routes = std::mem::take(&mut corpus.routes).with_fetch(Box::new(GeodesicFetch::new(30.0)));

        let mut scheduler = fleet_of_one(&corpus, 4);
        let r1 = request(&corpus, "alice", (10.0, 30.0, 12.0, 40.0), 1);
        let (best, _) = scheduler.schedule_request(&r1, 5.0, &mut corpus).unwrap();
        scheduler.insert_trip(&best.unwrap(), &corpus).unwrap();

        // Report the vehicle mid-leg between the depot and the pickup stop,
        // at a point that is not a corpus stop.
        let live = GeoPoint::new(39.5025, -0.3975).unwrap();
        scheduler
            .transport_positions
            .insert("bus1".to_string(), live);

        // A second customer appears while the vehicle is driving: the
        // departure towards `a` happens at minute 10 and arrival at 12, so
        // issue time 11 finds it travelling.
        let r2 = Request::new(
            &corpus, "bob", "b", "a", 13.0, Some(60.0), 14.0, 90.0, 1, 11.0, 15.0, 1.0,
        )
        .unwrap();
        let (best, _) = scheduler.schedule_request(&r2, 11.0, &mut corpus).unwrap();

        let prepared = scheduler.prepared.get("bus1").expect("candidate kept");
        assert!(
            prepared.stops.iter().any(|s| s.stop_id == "bus1-current-0"),
            "synthetic current-position stop must be spliced into the candidate"
        );
        // Any insertion found must go after the synthetic stop.
        if let Some(insertion) = best {
            let current_index = prepared
                .stops
                .iter()
                .position(|s| s.stop_id == "bus1-current-0")
                .unwrap();
            assert!(insertion.index_spu > current_index);
        }
    }

    #[test]
    fn insert_then_remove_trip_restores_the_plan() {
        let corpus = three_stop_corpus();
        let mut scheduler = fleet_of_one(&corpus, 4);
        let before = scheduler.itineraries[0].clone();
        let r1 = request(&corpus, "alice", (10.0, 30.0, 12.0, 40.0), 1);

        let (best, _) = scheduler.exhaustive_search(&r1, &corpus).unwrap();
        let insertion = best.unwrap();
        scheduler.insert_trip(&insertion, &corpus).unwrap();
        scheduler.remove_trip(&insertion, &corpus).unwrap();

        let after = &scheduler.itineraries[0];
        assert_eq!(after.len(), before.len());
        assert!((after.cost - before.cost).abs() < 1e-9);
        for (restored, original) in after.stops.iter().zip(before.stops.iter()) {
            assert_eq!(restored.stop_id, original.stop_id);
            assert_eq!(restored.npass, original.npass);
        }
        assert!(scheduler.insertion_log["bus1"].is_empty());
    }
}
