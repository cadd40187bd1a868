//! Insertion candidates: a feasible assignment of a request to a vehicle
//! itinerary at concrete pickup / set-down positions.

use std::fmt;

use crate::request::Request;

/// A feasible insertion found by the search. Transient: produced by the
/// search, consumed by the commit.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub vehicle_id: String,
    pub request: Request,
    /// Position of the pickup stop within the itinerary.
    pub index_spu: usize,
    /// Position of the set-down stop within the itinerary (after the pickup
    /// shift), always greater than `index_spu`.
    pub index_ssd: usize,
    /// Net additional cost (kilometres) of implementing the insertion.
    pub cost_increment: f64,
}

impl fmt::Display for Insertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insert pickup {} at {} and set-down {} at {} of itinerary {} (+{:.2} km)",
            self.request.origin_id,
            self.index_spu,
            self.request.destination_id,
            self.index_ssd,
            self.vehicle_id,
            self.cost_increment,
        )
    }
}
