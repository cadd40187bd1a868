//! Stops: a point in space with a service time-window, plus the temporal
//! attributes an itinerary propagates through it.
//!
//! A stop is created detached (window only). Embedding it in an itinerary
//! fills the itinerary-dependent attributes; neighbour links are indices into
//! the owning itinerary's stop sequence, never owning references, so a deep
//! copy of an itinerary is a plain clone of the sequence.

use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::geo::GeoPoint;

/// One stop. Times are minutes since the fleet-wide zero; `f64::INFINITY` is
/// a legal `end_time` / `departure_time`.
#[derive(Debug, Clone)]
pub struct Stop {
    pub stop_id: String,
    pub coords: GeoPoint,

    // Window attributes, set when the stop is instantiated from a trip.
    pub start_time: f64,
    pub end_time: f64,
    pub service_time: f64,
    /// Latest feasible arrival: `end_time - service_time`.
    pub latest: f64,
    pub passenger_id: Option<String>,

    // Itinerary-dependent attributes, valid only while embedded.
    /// Predecessor index in the owning itinerary.
    pub sprev: Option<usize>,
    /// Successor index in the owning itinerary.
    pub snext: Option<usize>,
    /// Passengers on board on departure from this stop.
    pub npass: u32,
    /// Seats reserved on departure from this stop.
    pub npres: u32,
    /// Driving minutes from this stop to its successor.
    pub leg_time: f64,
    /// Earliest arrival time.
    pub eat: f64,
    /// Earliest feasible service start: `max(start_time, eat)`.
    pub eat_f: f64,
    /// Latest departure time.
    pub ldt: f64,
    /// Latest feasible service end: `min(end_time, ldt)`.
    pub ldt_f: f64,
    /// `ldt - eat - service_time`.
    pub slack: f64,

    // Dispatched schedule.
    pub arrival_time: f64,
    pub departure_time: f64,
}

impl Stop {
    /// A detached stop with no window: coordinates resolved from the corpus.
    pub fn detached(corpus: &Corpus, stop_id: &str) -> Result<Self, CorpusError> {
        let coords = corpus.stop_coords(stop_id)?;
        Ok(Self::at(stop_id, coords))
    }

    /// A detached stop at known coordinates.
    pub fn at(stop_id: &str, coords: GeoPoint) -> Self {
        Self {
            stop_id: stop_id.to_string(),
            coords,
            start_time: 0.0,
            end_time: 0.0,
            service_time: 0.0,
            latest: 0.0,
            passenger_id: None,
            sprev: None,
            snext: None,
            npass: 0,
            npres: 0,
            leg_time: 0.0,
            eat: 0.0,
            eat_f: 0.0,
            ldt: 0.0,
            ldt_f: 0.0,
            slack: 0.0,
            arrival_time: 0.0,
            departure_time: 0.0,
        }
    }

    /// Set the service window of a trip stop: `[start_time, end_time]` with
    /// `service_time` minutes of loading/unloading.
    pub fn with_window(
        mut self,
        start_time: f64,
        end_time: f64,
        service_time: f64,
        passenger_id: Option<&str>,
    ) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self.service_time = service_time;
        self.latest = end_time - service_time;
        self.passenger_id = passenger_id.map(str::to_string);
        self
    }

    /// True when this and `other` describe the same visit (id, place, and
    /// served passenger).
    pub fn same_visit(&self, other: &Stop) -> bool {
        self.stop_id == other.stop_id
            && self.coords.lat() == other.coords.lat()
            && self.coords.lng() == other.coords.lng()
            && self.passenger_id == other.passenger_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_sets_latest() {
        let coords = GeoPoint::new(39.5, -0.4).unwrap();
        let stop = Stop::at("s1", coords).with_window(10.0, 30.0, 2.0, Some("alice"));
        assert_eq!(stop.latest, 28.0);
        assert_eq!(stop.passenger_id.as_deref(), Some("alice"));
        assert_eq!(stop.npass, 0);
        assert!(stop.sprev.is_none() && stop.snext.is_none());
    }

    #[test]
    fn unbounded_window_has_infinite_latest() {
        let coords = GeoPoint::new(39.5, -0.4).unwrap();
        let stop = Stop::at("depot", coords).with_window(0.0, f64::INFINITY, 0.0, None);
        assert_eq!(stop.latest, f64::INFINITY);
    }
}
