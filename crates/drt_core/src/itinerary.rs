//! Vehicle itineraries: an ordered stop sequence with propagated temporal
//! state, insertion/removal, feasibility tests, and cost.
//!
//! Stops live in a contiguous `Vec`; neighbour links are indices into that
//! vector, so a deep copy for candidate evaluation is a plain `clone()` and
//! copies never alias the original. Temporal attributes are refreshed in the
//! fixed order `leg_time -> EAT -> LDT -> slack -> arrival/departure`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::error::{CorpusError, ScheduleError};
use crate::geo::lonlat_from_point;
use crate::request::Request;
use crate::stop::Stop;

/// Float tolerance for invariant checks over propagated times and summed
/// distances.
const EPSILON: f64 = 1e-6;

/// Outcome of a feasibility test for one candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    /// The insertion preserves every window and capacity constraint.
    Ok,
    /// Local failure: a later position in the same itinerary may still work.
    TryNext,
    /// Monotone failure: EAT only grows downstream, so every later position
    /// in this itinerary fails too.
    Abandon,
}

/// Where a vehicle is relative to its plan at a queried time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleWhereabouts {
    AtStop,
    TravellingToStop,
}

/// One stop of a dispatched plan as exchanged with vehicles and written to
/// the itinerary output files. `coords` are `[lon, lat]` on the wire;
/// `departure_time` is absent at the terminus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStop {
    pub stop_id: String,
    pub coords: [f64; 2],
    pub arrival_time: f64,
    pub service_time: f64,
    pub departure_time: Option<f64>,
    pub passenger_id: Option<String>,
}

impl PlanStop {
    /// True when both describe the same visit (id, place, served passenger).
    pub fn same_visit(&self, other: &PlanStop) -> bool {
        self.stop_id == other.stop_id
            && self.coords == other.coords
            && self.passenger_id == other.passenger_id
    }
}

/// Per-customer service metrics for one itinerary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerStats {
    /// Minutes between the pickup window opening and the vehicle's arrival.
    pub wait: f64,
    /// Minutes spent on board.
    pub on_board: f64,
    /// Kilometres driven over the carrying segment.
    pub trip_kms: f64,
    /// Direct driving distance pickup -> set-down.
    pub min_kms: f64,
}

/// Per-vehicle metrics for one itinerary.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleStats {
    pub num_stops: usize,
    pub begin_time: f64,
    pub end_time: f64,
    pub total_time: f64,
    pub busy_time: f64,
    pub wait_time: f64,
    pub busy_percent: f64,
    pub wait_percent: f64,
    pub usage_percent: f64,
    pub itinerary_kms: f64,
    pub cost: f64,
    pub total_requests: usize,
    pub total_wait: f64,
    pub avg_wait: f64,
    pub std_wait: f64,
}

/// An itinerary: the stop sequence a vehicle serves during its shift,
/// bracketed by the shift origin and terminus.
#[derive(Debug, Clone)]
pub struct Itinerary {
    pub vehicle_id: String,
    pub capacity: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub stops: Vec<Stop>,
    /// Index of the stop the vehicle last departed or is currently serving.
    pub current_loc: usize,
    pub traveled_km: f64,
    /// Optimisation objective; kilometres driven.
    pub cost: f64,
}

impl Itinerary {
    /// Build the initial two-stop itinerary of a vehicle shift.
    pub fn new(
        corpus: &Corpus,
        vehicle_id: &str,
        capacity: u32,
        start_stop_id: &str,
        end_stop_id: &str,
        start_time: f64,
        end_time: f64,
    ) -> Result<Self, CorpusError> {
        let start_stop = Stop::detached(corpus, start_stop_id)?.with_window(
            start_time,
            f64::INFINITY,
            0.0,
            None,
        );
        let end_stop =
            Stop::detached(corpus, end_stop_id)?.with_window(start_time, end_time, 0.0, None);

        let mut itinerary = Self {
            vehicle_id: vehicle_id.to_string(),
            capacity,
            start_time,
            end_time,
            stops: vec![start_stop, end_stop],
            current_loc: 0,
            traveled_km: 0.0,
            cost: 0.0,
        };
        itinerary.relink();

        itinerary.set_leg_time(0, corpus)?;
        itinerary.set_eat(0);
        itinerary.set_leg_time(1, corpus)?;
        itinerary.set_ldt(1);

        itinerary.set_eat(1);
        itinerary.set_ldt(0);
        itinerary.set_slack(0);
        itinerary.set_slack(1);
        itinerary.set_arrival_departure(0);
        itinerary.set_arrival_departure(1);

        itinerary.compute_cost(corpus)?;
        Ok(itinerary)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    // -----------------------------------------------------------------------
    // Temporal propagation
    // -----------------------------------------------------------------------

    /// Rebuild the index links after a structural change of `stops`.
    fn relink(&mut self) {
        let len = self.stops.len();
        for (i, stop) in self.stops.iter_mut().enumerate() {
            stop.sprev = i.checked_sub(1);
            stop.snext = if i + 1 < len { Some(i + 1) } else { None };
        }
    }

    fn set_leg_time(&mut self, i: usize, corpus: &Corpus) -> Result<(), CorpusError> {
        let leg_time = match self.stops[i].snext {
            None => 0.0,
            Some(next) => corpus
                .routes
                .route(self.stops[i].coords, self.stops[next].coords)?
                .duration_min(),
        };
        self.stops[i].leg_time = leg_time;
        Ok(())
    }

    fn set_eat(&mut self, i: usize) {
        match self.stops[i].sprev {
            None => {
                // First stop of the itinerary: the vehicle departure.
                self.stops[i].eat = self.stops[i].start_time;
                self.stops[i].eat_f = self.stops[i].start_time;
            }
            Some(prev) => {
                let r = &self.stops[prev];
                let eat = r.start_time.max(r.eat) + r.service_time + r.leg_time;
                self.stops[i].eat = eat;
                self.stops[i].eat_f = self.stops[i].start_time.max(eat);
            }
        }
    }

    fn set_ldt(&mut self, i: usize) {
        match self.stops[i].snext {
            None => {
                // Last stop of the itinerary: the vehicle destination.
                self.stops[i].ldt = self.stops[i].end_time;
                self.stops[i].ldt_f = self.stops[i].end_time;
            }
            Some(next) => {
                let t = &self.stops[next];
                let ldt = t.end_time.min(t.ldt) - t.service_time - self.stops[i].leg_time;
                self.stops[i].ldt = ldt;
                self.stops[i].ldt_f = self.stops[i].end_time.min(ldt);
            }
        }
    }

    fn set_slack(&mut self, i: usize) {
        let stop = &mut self.stops[i];
        stop.slack = stop.ldt - stop.eat - stop.service_time;
    }

    fn set_arrival_departure(&mut self, i: usize) {
        let arrival = match self.stops[i].sprev {
            None => self.stops[i].start_time,
            Some(prev) => {
                let prev_leg = self.stops[prev].leg_time;
                (self.stops[i].start_time + prev_leg).max(self.stops[i].eat_f)
            }
        };
        let departure = match self.stops[i].snext {
            Some(next) => {
                let t = &self.stops[next];
                t.start_time.max(t.eat_f - self.stops[i].leg_time)
            }
            None => f64::INFINITY,
        };
        self.stops[i].arrival_time = arrival;
        self.stops[i].departure_time = departure;
    }

    /// Full refresh of one stop from its neighbours, in propagation order.
    fn refresh_stop(&mut self, i: usize, corpus: &Corpus) -> Result<(), CorpusError> {
        self.set_leg_time(i, corpus)?;
        self.set_eat(i);
        self.set_ldt(i);
        self.set_slack(i);
        self.set_arrival_departure(i);
        Ok(())
    }

    /// Refresh the dispatched arrival/departure times of every stop.
    pub fn compute_dispatching(&mut self) {
        for i in 0..self.stops.len() {
            self.set_arrival_departure(i);
        }
    }

    // -----------------------------------------------------------------------
    // Structural operations
    // -----------------------------------------------------------------------

    /// Insert `stop` at `index`, turning leg (R -> T) into (R -> S) and
    /// (S -> T), then propagate EAT forward and LDT backward.
    pub fn insert_stop(
        &mut self,
        stop: Stop,
        index: usize,
        npass: u32,
        corpus: &Corpus,
    ) -> Result<(), CorpusError> {
        debug_assert!(index >= 1 && index < self.stops.len());
        self.stops.insert(index, stop);
        self.relink();

        let r = index - 1;
        let t = index + 1;
        self.set_leg_time(r, corpus)?;
        self.set_leg_time(index, corpus)?;

        self.set_eat(index);
        self.set_ldt(index);
        self.set_slack(index);

        // EAT can only be delayed downstream of the insertion.
        for j in index + 1..self.stops.len() {
            self.refresh_stop(j, corpus)?;
        }
        // LDT can only be advanced upstream of it.
        for j in (0..index).rev() {
            self.refresh_stop(j, corpus)?;
        }

        self.set_arrival_departure(r);
        self.set_slack(r);
        self.set_arrival_departure(index);
        self.set_arrival_departure(t);
        self.set_slack(t);

        self.stops[index].npass = self.stops[r].npass + npass;
        self.stops[index].npres = self.stops[r].npres + npass;

        self.compute_cost(corpus)?;
        Ok(())
    }

    /// Remove the stop at `index`, restoring leg (R -> T), and propagate.
    pub fn remove_stop(&mut self, index: usize, corpus: &Corpus) -> Result<Stop, CorpusError> {
        debug_assert!(index >= 1 && index + 1 < self.stops.len());
        let removed = self.stops.remove(index);
        self.relink();

        self.set_leg_time(index - 1, corpus)?;

        // `index` is now the position of the old successor T.
        for j in index..self.stops.len() {
            self.refresh_stop(j, corpus)?;
        }
        for j in (0..index).rev() {
            self.refresh_stop(j, corpus)?;
        }

        self.compute_cost(corpus)?;
        Ok(removed)
    }

    pub fn compute_traveled_km(&mut self, corpus: &Corpus) -> Result<f64, CorpusError> {
        let mut km = 0.0;
        for pair in self.stops.windows(2) {
            km += corpus
                .routes
                .route(pair[0].coords, pair[1].coords)?
                .distance_km();
        }
        self.traveled_km = km;
        Ok(km)
    }

    pub fn compute_cost(&mut self, corpus: &Corpus) -> Result<f64, CorpusError> {
        self.cost = self.compute_traveled_km(corpus)?;
        Ok(self.cost)
    }

    // -----------------------------------------------------------------------
    // Feasibility tests
    // -----------------------------------------------------------------------

    /// Test inserting pickup stop `spu` between position `r` and its
    /// successor.
    pub fn pickup_feasibility(
        &self,
        request: &Request,
        spu: &Stop,
        r: usize,
        corpus: &Corpus,
    ) -> Result<Feasibility, CorpusError> {
        let pred = &self.stops[r];
        let succ = &self.stops[r + 1];

        // EAT is non-decreasing along the chain: once the predecessor's EAT
        // passes the latest feasible arrival at Spu, no later position works.
        if pred.eat > spu.latest {
            return Ok(Feasibility::Abandon);
        }

        let available_seats = self.capacity - pred.npass;
        if request.npass > available_seats {
            return Ok(Feasibility::TryNext);
        }

        let spu_eat = pred.start_time.max(pred.eat)
            + pred.service_time
            + corpus.routes.route(pred.coords, spu.coords)?.duration_min();
        let spu_eat_f = spu.start_time.max(spu_eat);
        if spu_eat > spu.latest {
            return Ok(Feasibility::TryNext);
        }

        let spu_ldt = succ.end_time.min(succ.ldt)
            - succ.service_time
            - corpus.routes.route(spu.coords, succ.coords)?.duration_min();
        if spu_ldt < spu_eat_f + spu.service_time {
            return Ok(Feasibility::TryNext);
        }

        Ok(Feasibility::Ok)
    }

    /// Test inserting set-down stop `ssd` between position `r` and its
    /// successor, after a tentative pickup has been placed at `index_spu`.
    pub fn setdown_feasibility(
        &self,
        request: &Request,
        index_spu: usize,
        index_ssd: usize,
        ssd: &Stop,
        r: usize,
        corpus: &Corpus,
    ) -> Result<Feasibility, CorpusError> {
        let pred = &self.stops[r];
        let succ = &self.stops[r + 1];

        if pred.eat > ssd.latest {
            return Ok(Feasibility::Abandon);
        }

        // The vehicle must be able to carry the passengers over the whole
        // segment without exceeding capacity at any departure.
        for k in index_spu..index_ssd {
            if self.stops[k].npass + request.npass > self.capacity {
                return Ok(Feasibility::TryNext);
            }
        }

        let ssd_eat = pred.start_time.max(pred.eat)
            + pred.service_time
            + corpus.routes.route(pred.coords, ssd.coords)?.duration_min();
        let ssd_eat_f = ssd.start_time.max(ssd_eat);
        if ssd_eat > ssd.latest {
            return Ok(Feasibility::TryNext);
        }

        let ssd_ldt = succ.end_time.min(succ.ldt)
            - succ.service_time
            - corpus.routes.route(ssd.coords, succ.coords)?.duration_min();
        if ssd_ldt < ssd_eat_f + ssd.service_time {
            return Ok(Feasibility::TryNext);
        }

        Ok(Feasibility::Ok)
    }

    // -----------------------------------------------------------------------
    // Vehicle position
    // -----------------------------------------------------------------------

    /// Locate the vehicle within its plan at time `t`. When the vehicle is
    /// between stops, the returned index is that of the next visited stop.
    pub fn position_at_time(&mut self, t: f64) -> (usize, VehicleWhereabouts) {
        let last = self.stops.len() - 1;
        if t >= self.end_time {
            self.current_loc = last;
            return (last, VehicleWhereabouts::AtStop);
        }
        for i in 0..self.stops.len() {
            let stop = &self.stops[i];
            if stop.arrival_time <= t && t <= stop.departure_time {
                self.current_loc = i;
                return (i, VehicleWhereabouts::AtStop);
            }
            if i + 1 < self.stops.len() && self.stops[i + 1].arrival_time > t {
                self.current_loc = i + 1;
                return (i + 1, VehicleWhereabouts::TravellingToStop);
            }
        }
        self.current_loc = last;
        (last, VehicleWhereabouts::AtStop)
    }

    // -----------------------------------------------------------------------
    // Serialisation and statistics
    // -----------------------------------------------------------------------

    /// The plan as exchanged with vehicles and written to the output files.
    pub fn as_plan_stops(&self) -> Vec<PlanStop> {
        self.stops
            .iter()
            .map(|stop| PlanStop {
                stop_id: stop.stop_id.clone(),
                coords: lonlat_from_point(stop.coords),
                arrival_time: stop.arrival_time,
                service_time: stop.service_time,
                departure_time: stop.departure_time.is_finite().then_some(stop.departure_time),
                passenger_id: stop.passenger_id.clone(),
            })
            .collect()
    }

    /// Total shift time, busy time (travelling + servicing), and waiting time.
    pub fn busy_time(&self) -> (f64, f64, f64) {
        let total = self.end_time - self.start_time;
        let travelling: f64 = self.stops.iter().map(|s| s.leg_time).sum();
        let servicing: f64 = self.stops.iter().map(|s| s.service_time).sum();
        let waiting: f64 = self
            .stops
            .iter()
            .filter(|s| s.departure_time.is_finite())
            .map(|s| s.departure_time - s.arrival_time - s.service_time)
            .sum();
        (total, travelling + servicing, waiting)
    }

    /// Service metrics for every customer carried by this itinerary.
    pub fn customer_stats(
        &self,
        corpus: &Corpus,
    ) -> Result<HashMap<String, CustomerStats>, ScheduleError> {
        let mut stats = HashMap::new();
        for i in 1..self.stops.len().saturating_sub(1) {
            // A stop where the on-board count grows is a pickup.
            if self.stops[i].npass <= self.stops[i - 1].npass {
                continue;
            }
            let Some(customer) = self.stops[i].passenger_id.clone() else {
                continue;
            };

            let indices: Vec<usize> = self
                .stops
                .iter()
                .enumerate()
                .filter(|(_, s)| s.passenger_id.as_deref() == Some(customer.as_str()))
                .map(|(j, _)| j)
                .collect();
            if indices.len() != 2 {
                return Err(ScheduleError::InconsistentItinerary {
                    vehicle_id: self.vehicle_id.clone(),
                    detail: format!(
                        "customer {customer} appears in {} stops",
                        indices.len()
                    ),
                });
            }
            let spu = &self.stops[indices[0]];
            let ssd = &self.stops[indices[1]];

            let wait = spu.arrival_time - spu.start_time;
            let pickup_time = spu.arrival_time + spu.service_time;
            let dropoff_time = ssd.arrival_time + ssd.service_time;
            if pickup_time > dropoff_time {
                return Err(ScheduleError::InconsistentItinerary {
                    vehicle_id: self.vehicle_id.clone(),
                    detail: format!(
                        "customer {customer} picked up at {pickup_time:.2} after set-down at {dropoff_time:.2}"
                    ),
                });
            }

            let mut trip_kms = 0.0;
            for pair in self.stops[indices[0]..=indices[1]].windows(2) {
                trip_kms += corpus
                    .routes
                    .route(pair[0].coords, pair[1].coords)
                    .map_err(ScheduleError::Corpus)?
                    .distance_km();
            }
            let min_kms = corpus
                .routes
                .route(spu.coords, ssd.coords)
                .map_err(ScheduleError::Corpus)?
                .distance_km();

            stats.insert(
                customer,
                CustomerStats {
                    wait,
                    on_board: dropoff_time - pickup_time,
                    trip_kms,
                    min_kms,
                },
            );
        }
        Ok(stats)
    }

    /// Aggregate metrics for the vehicle serving this itinerary.
    pub fn vehicle_stats(&self, corpus: &Corpus) -> Result<VehicleStats, ScheduleError> {
        let customers = self.customer_stats(corpus)?;
        let (total_time, busy_time, wait_time) = self.busy_time();
        let waits: Vec<f64> = customers.values().map(|c| c.wait).collect();
        let total_wait: f64 = waits.iter().sum();
        let avg_wait = if waits.is_empty() {
            0.0
        } else {
            total_wait / waits.len() as f64
        };
        let std_wait = if waits.is_empty() {
            0.0
        } else {
            let variance =
                waits.iter().map(|w| (w - avg_wait) * (w - avg_wait)).sum::<f64>() / waits.len() as f64;
            variance.sqrt()
        };

        Ok(VehicleStats {
            num_stops: self.stops.len(),
            begin_time: self.stops[0].departure_time,
            end_time: self.stops[self.stops.len() - 1].arrival_time,
            total_time,
            busy_time,
            wait_time,
            busy_percent: busy_time / total_time * 100.0,
            wait_percent: wait_time / total_time * 100.0,
            usage_percent: (busy_time + wait_time) / total_time * 100.0,
            itinerary_kms: self.traveled_km,
            cost: self.cost,
            total_requests: customers.len(),
            total_wait,
            avg_wait,
            std_wait,
        })
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Check every itinerary invariant. A violation after a commit means the
    /// plan is broken and the instance must stop.
    pub fn validate(&self, corpus: &Corpus) -> Result<(), ScheduleError> {
        let fail = |detail: String| {
            Err(ScheduleError::InconsistentItinerary {
                vehicle_id: self.vehicle_id.clone(),
                detail,
            })
        };

        for (i, stop) in self.stops.iter().enumerate() {
            let expected_prev = i.checked_sub(1);
            let expected_next = (i + 1 < self.stops.len()).then_some(i + 1);
            if stop.sprev != expected_prev || stop.snext != expected_next {
                return fail(format!("broken neighbour links at position {i}"));
            }
            if stop.eat > stop.latest + EPSILON {
                return fail(format!(
                    "stop {} unreachable in its window: eat {:.3} > latest {:.3}",
                    stop.stop_id, stop.eat, stop.latest
                ));
            }
            if stop.ldt + EPSILON < stop.eat + stop.service_time {
                return fail(format!(
                    "stop {} cannot be serviced: ldt {:.3} < eat {:.3} + service {:.3}",
                    stop.stop_id, stop.ldt, stop.eat, stop.service_time
                ));
            }
            if stop.npass > self.capacity {
                return fail(format!(
                    "stop {} overloads the vehicle: {} > {}",
                    stop.stop_id, stop.npass, self.capacity
                ));
            }
        }

        let mut km = 0.0;
        for pair in self.stops.windows(2) {
            match corpus.routes.route(pair[0].coords, pair[1].coords) {
                Ok(route) => km += route.distance_km(),
                Err(e) => return Err(ScheduleError::Corpus(e)),
            }
        }
        if (km - self.cost).abs() > EPSILON {
            return fail(format!(
                "cost {:.6} diverges from summed leg distance {:.6}",
                self.cost, km
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{set_route_km_min, three_stop_corpus};

    /// Shift [0, 240] out of the depot and back; depot at index 0 and 2.
    fn base_itinerary(corpus: &Corpus) -> Itinerary {
        Itinerary::new(corpus, "bus1", 4, "depot", "depot", 0.0, 240.0).unwrap()
    }

    fn pickup(corpus: &Corpus, start: f64, end: f64) -> Stop {
        Stop::detached(corpus, "a")
            .unwrap()
            .with_window(start, end, 1.0, Some("alice"))
    }

    fn setdown(corpus: &Corpus, start: f64, end: f64) -> Stop {
        Stop::detached(corpus, "b")
            .unwrap()
            .with_window(start, end, 1.0, Some("alice"))
    }

    fn request(corpus: &Corpus) -> Request {
        Request::new(
            corpus, "alice", "a", "b", 10.0, Some(30.0), 12.0, 40.0, 1, 5.0, 15.0, 1.0,
        )
        .unwrap()
    }

    #[test]
    fn initial_itinerary_brackets_the_shift() {
        let corpus = three_stop_corpus();
        let itinerary = base_itinerary(&corpus);
        assert_eq!(itinerary.stops.len(), 2);
        // Start and end are the same depot: zero-length round trip.
        assert_eq!(itinerary.cost, 0.0);
        assert_eq!(itinerary.stops[0].eat, 0.0);
        assert_eq!(itinerary.stops[1].ldt, 240.0);
        assert_eq!(itinerary.stops[1].departure_time, f64::INFINITY);
        itinerary.validate(&corpus).unwrap();
    }

    #[test]
    fn insertion_propagates_times_and_links() {
        let corpus = three_stop_corpus();
        let mut itinerary = base_itinerary(&corpus);

        itinerary
            .insert_stop(pickup(&corpus, 10.0, 30.0), 1, 1, &corpus)
            .unwrap();
        itinerary
            .insert_stop(setdown(&corpus, 12.0, 40.0), 2, 0, &corpus)
            .unwrap();

        // depot -> a is 2 min, a -> b another 2 min with 1 min of service.
        let a = &itinerary.stops[1];
        assert_eq!(a.eat, 2.0);
        assert_eq!(a.eat_f, 10.0);
        let b = &itinerary.stops[2];
        assert_eq!(b.eat, 13.0);
        assert_eq!(b.eat_f, 13.0);

        // Links are the positional neighbours (invariant 1).
        for (i, stop) in itinerary.stops.iter().enumerate() {
            assert_eq!(stop.sprev, i.checked_sub(1));
            assert_eq!(
                stop.snext,
                (i + 1 < itinerary.stops.len()).then_some(i + 1)
            );
        }

        // Load profile along the plan: 0 -> 1 -> 1 -> 0 (set-down stop keeps
        // the predecessor's count until the commit adjusts the segment).
        assert_eq!(itinerary.stops[0].npass, 0);
        assert_eq!(itinerary.stops[1].npass, 1);

        // depot -> a -> b -> depot is 1 + 1 + 1 km.
        assert!((itinerary.cost - 3.0).abs() < EPSILON);
        itinerary.validate(&corpus).unwrap();
    }

    #[test]
    fn insert_then_remove_restores_the_itinerary() {
        let corpus = three_stop_corpus();
        let mut itinerary = base_itinerary(&corpus);
        let before = itinerary.clone();

        itinerary
            .insert_stop(pickup(&corpus, 10.0, 30.0), 1, 1, &corpus)
            .unwrap();
        let removed = itinerary.remove_stop(1, &corpus).unwrap();
        assert_eq!(removed.stop_id, "a");

        assert_eq!(itinerary.stops.len(), before.stops.len());
        for (restored, original) in itinerary.stops.iter().zip(before.stops.iter()) {
            assert_eq!(restored.stop_id, original.stop_id);
            assert_eq!(restored.sprev, original.sprev);
            assert_eq!(restored.snext, original.snext);
            assert_eq!(restored.npass, original.npass);
            assert_eq!(restored.npres, original.npres);
            assert!((restored.leg_time - original.leg_time).abs() < EPSILON);
            assert!((restored.eat - original.eat).abs() < EPSILON);
            assert!((restored.ldt - original.ldt).abs() < EPSILON);
            assert!((restored.slack - original.slack).abs() < EPSILON);
            assert!((restored.arrival_time - original.arrival_time).abs() < EPSILON);
            assert!(
                restored.departure_time == original.departure_time
                    || (restored.departure_time - original.departure_time).abs() < EPSILON
            );
        }
        assert!((itinerary.cost - before.cost).abs() < EPSILON);
    }

    #[test]
    fn pickup_feasibility_distinguishes_monotone_and_local_failures() {
        let corpus = three_stop_corpus();
        let mut itinerary = base_itinerary(&corpus);
        let req = request(&corpus);

        // Feasible between the depot stops.
        assert_eq!(
            itinerary
                .pickup_feasibility(&req, &req.spu, 0, &corpus)
                .unwrap(),
            Feasibility::Ok
        );

        // A predecessor whose EAT is already past the pickup's latest arrival
        // aborts the whole itinerary.
        itinerary.stops[0].eat = 100.0;
        assert_eq!(
            itinerary
                .pickup_feasibility(&req, &req.spu, 0, &corpus)
                .unwrap(),
            Feasibility::Abandon
        );
        itinerary.stops[0].eat = 0.0;

        // A full vehicle fails locally: a later position may have seats free.
        itinerary.stops[0].npass = 4;
        assert_eq!(
            itinerary
                .pickup_feasibility(&req, &req.spu, 0, &corpus)
                .unwrap(),
            Feasibility::TryNext
        );
    }

    #[test]
    fn degenerate_trip_fails_pickup_window() {
        let corpus = three_stop_corpus();
        let itinerary = base_itinerary(&corpus);
        // Same origin and destination with a window too small for the
        // service time: latest < any reachable arrival.
        let req = Request::new(
            &corpus, "carol", "a", "a", 0.0, Some(1.5), 0.0, 1.5, 1, 0.0, 15.0, 1.0,
        )
        .unwrap();
        assert_eq!(
            itinerary
                .pickup_feasibility(&req, &req.spu, 0, &corpus)
                .unwrap(),
            Feasibility::TryNext
        );
    }

    #[test]
    fn setdown_capacity_scan_rejects_overloaded_segment() {
        let mut corpus = three_stop_corpus();
        set_route_km_min(&mut corpus, "b", "a", 1.0, 2.0);
        let mut itinerary = Itinerary::new(&corpus, "bus1", 2, "depot", "depot", 0.0, 240.0)
            .unwrap();

        // One passenger already seated over a -> b.
        itinerary
            .insert_stop(pickup(&corpus, 10.0, 60.0), 1, 1, &corpus)
            .unwrap();
        itinerary
            .insert_stop(setdown(&corpus, 12.0, 80.0), 2, 0, &corpus)
            .unwrap();

        // A two-passenger trip whose carrying segment overlaps cannot fit a
        // capacity-2 vehicle.
        let req = Request::new(
            &corpus, "dave", "a", "b", 10.0, Some(60.0), 12.0, 90.0, 2, 5.0, 15.0, 1.0,
        )
        .unwrap();
        assert_eq!(
            itinerary
                .setdown_feasibility(&req, 1, 2, &req.ssd, 1, &corpus)
                .unwrap(),
            Feasibility::TryNext
        );
    }

    #[test]
    fn position_lookup_covers_all_cases() {
        let corpus = three_stop_corpus();
        let mut itinerary = base_itinerary(&corpus);
        itinerary
            .insert_stop(pickup(&corpus, 10.0, 30.0), 1, 1, &corpus)
            .unwrap();
        itinerary
            .insert_stop(setdown(&corpus, 12.0, 40.0), 2, 0, &corpus)
            .unwrap();

        // Past the end of the shift: parked at the terminus.
        let (index, status) = itinerary.position_at_time(500.0);
        assert_eq!(index, itinerary.stops.len() - 1);
        assert_eq!(status, VehicleWhereabouts::AtStop);

        // Serving the pickup stop inside its visit interval.
        let a_arrival = itinerary.stops[1].arrival_time;
        let (index, status) = itinerary.position_at_time(a_arrival);
        assert_eq!(index, 1);
        assert_eq!(status, VehicleWhereabouts::AtStop);
        assert_eq!(itinerary.current_loc, 1);

        // Before the pickup's arrival but after the depot departure: on the
        // road towards it.
        let depot_departure = itinerary.stops[0].departure_time;
        if a_arrival > depot_departure {
            let t = (depot_departure + a_arrival) / 2.0;
            let (index, status) = itinerary.position_at_time(t);
            assert_eq!(index, 1);
            assert_eq!(status, VehicleWhereabouts::TravellingToStop);
        }
    }

    #[test]
    fn plan_stops_use_wire_coordinates() {
        let corpus = three_stop_corpus();
        let itinerary = base_itinerary(&corpus);
        let plan = itinerary.as_plan_stops();
        assert_eq!(plan.len(), 2);
        // [lon, lat] on the wire.
        assert_eq!(plan[0].coords, [-0.400, 39.500]);
        assert_eq!(plan[1].departure_time, None);
        assert!(plan[0].same_visit(&plan[1]));
    }
}
