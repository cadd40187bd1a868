//! Ordering policies: pluggable strategies for draining the pending-request
//! set in an offline (one-shot) solve. Exactly one policy runs per problem
//! instance.

use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::error::ScheduleError;
use crate::scheduler::Scheduler;

/// Default multiplier for the minimal-cost iteration budget.
pub const DEFAULT_COST_POLICY_CAP_FACTOR: usize = 5;

/// A strategy that schedules every pending request of a problem instance.
pub trait OrderingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Drain `scheduler.pending_requests`, committing or rejecting each.
    fn run(&self, scheduler: &mut Scheduler, corpus: &Corpus) -> Result<(), ScheduleError>;
}

/// Default policy: drain requests first-in first-out by issuance time.
/// Deterministic and stable.
#[derive(Debug, Default)]
pub struct ByIssuanceOrder;

impl OrderingPolicy for ByIssuanceOrder {
    fn name(&self) -> &'static str {
        "by-issuance-order"
    }

    fn run(&self, scheduler: &mut Scheduler, corpus: &Corpus) -> Result<(), ScheduleError> {
        while !scheduler.pending_requests.is_empty() {
            let request = scheduler.pending_requests.remove(0);
            let (best, _) = scheduler.exhaustive_search(&request, corpus)?;
            match best {
                Some(insertion) => {
                    scheduler.insert_trip(&insertion, corpus)?;
                    info!(
                        "request {} scheduled on vehicle {} (+{:.2} km)",
                        request.passenger_id, insertion.vehicle_id, insertion.cost_increment
                    );
                    scheduler.scheduled_requests.push(request);
                }
                None => {
                    debug!("request {} cannot be scheduled", request.passenger_id);
                    scheduler.rejected_requests.push(request);
                }
            }
        }
        for itinerary in &mut scheduler.itineraries {
            itinerary.compute_dispatching();
        }
        Ok(())
    }
}

/// At each step, commit the globally cheapest insertion over every pending
/// request; stop when the pending set is empty or the iteration budget
/// (`cap_factor x |initial pending|`) is exhausted.
#[derive(Debug)]
pub struct ByMinimalCost {
    pub cap_factor: usize,
}

impl Default for ByMinimalCost {
    fn default() -> Self {
        Self {
            cap_factor: DEFAULT_COST_POLICY_CAP_FACTOR,
        }
    }
}

impl OrderingPolicy for ByMinimalCost {
    fn name(&self) -> &'static str {
        "by-minimal-cost"
    }

    fn run(&self, scheduler: &mut Scheduler, corpus: &Corpus) -> Result<(), ScheduleError> {
        let max_tries = scheduler.pending_requests.len() * self.cap_factor;
        let mut counter = 0;
        while !scheduler.pending_requests.is_empty() && counter < max_tries {
            match scheduler.minimal_cost_insertion(corpus)? {
                Some(insertion) => {
                    let passenger_id = insertion.request.passenger_id.clone();
                    scheduler.insert_trip(&insertion, corpus)?;
                    info!(
                        "request {} scheduled on vehicle {} (+{:.2} km)",
                        passenger_id, insertion.vehicle_id, insertion.cost_increment
                    );
                    scheduler.delete_pending_request(&passenger_id);
                    scheduler.scheduled_requests.push(insertion.request);
                }
                None => break,
            }
            counter += 1;
        }
        // Whatever could not be placed within the budget is rejected.
        let leftover = std::mem::take(&mut scheduler.pending_requests);
        for request in leftover {
            debug!("request {} cannot be scheduled", request.passenger_id);
            scheduler.rejected_requests.push(request);
        }
        for itinerary in &mut scheduler.itineraries {
            itinerary.compute_dispatching();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::Itinerary;
    use crate::request::Request;
    use crate::test_helpers::three_stop_corpus;

    fn scheduler_with_one_vehicle(corpus: &Corpus, capacity: u32) -> Scheduler {
        let itinerary =
            Itinerary::new(corpus, "bus1", capacity, "depot", "depot", 0.0, 240.0).unwrap();
        Scheduler::new(vec![itinerary])
    }

    fn ride(corpus: &Corpus, name: &str, windows: (f64, f64, f64, f64)) -> Request {
        Request::new(
            corpus,
            name,
            "a",
            "b",
            windows.0,
            Some(windows.1),
            windows.2,
            windows.3,
            1,
            0.0,
            15.0,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn issuance_order_accepts_first_of_two_conflicting_requests() {
        let corpus = three_stop_corpus();
        let mut scheduler = scheduler_with_one_vehicle(&corpus, 1);
        scheduler
            .pending_requests
            .push(ride(&corpus, "ana", (10.0, 12.0, 12.0, 14.0)));
        scheduler
            .pending_requests
            .push(ride(&corpus, "ben", (10.0, 12.0, 12.0, 14.0)));

        ByIssuanceOrder.run(&mut scheduler, &corpus).unwrap();

        assert_eq!(scheduler.scheduled_requests.len(), 1);
        assert_eq!(scheduler.scheduled_requests[0].passenger_id, "ana");
        assert_eq!(scheduler.rejected_requests.len(), 1);
        assert_eq!(scheduler.rejected_requests[0].passenger_id, "ben");
        assert!(scheduler.pending_requests.is_empty());
    }

    #[test]
    fn minimal_cost_schedules_one_of_two_conflicting_requests() {
        let corpus = three_stop_corpus();
        let mut scheduler = scheduler_with_one_vehicle(&corpus, 1);
        scheduler
            .pending_requests
            .push(ride(&corpus, "ana", (10.0, 12.0, 12.0, 14.0)));
        scheduler
            .pending_requests
            .push(ride(&corpus, "ben", (10.0, 12.0, 12.0, 14.0)));

        ByMinimalCost::default().run(&mut scheduler, &corpus).unwrap();

        assert_eq!(scheduler.scheduled_requests.len(), 1);
        assert_eq!(scheduler.rejected_requests.len(), 1);
        assert!(scheduler.pending_requests.is_empty());
    }

    #[test]
    fn compatible_requests_are_all_scheduled() {
        let corpus = three_stop_corpus();
        let mut scheduler = scheduler_with_one_vehicle(&corpus, 4);
        scheduler
            .pending_requests
            .push(ride(&corpus, "ana", (10.0, 30.0, 12.0, 40.0)));
        scheduler
            .pending_requests
            .push(ride(&corpus, "ben", (10.0, 30.0, 12.0, 40.0)));

        ByIssuanceOrder.run(&mut scheduler, &corpus).unwrap();

        assert_eq!(scheduler.scheduled_requests.len(), 2);
        assert!(scheduler.rejected_requests.is_empty());
        scheduler.itineraries[0].validate(&corpus).unwrap();
    }
}
