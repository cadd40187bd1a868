//! Customer requests: a trip of `npass` passengers between two stops, each
//! visit constrained by a time window.

use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::stop::Stop;

/// A customer request. The pickup window end is tightened by the system-wide
/// maximum-wait policy when the request is created; both stops carry
/// `service_minutes_per_passenger x npass` minutes of service time.
#[derive(Debug, Clone)]
pub struct Request {
    pub passenger_id: String,
    pub origin_id: String,
    pub destination_id: String,
    pub origin_time_ini: f64,
    pub origin_time_end: f64,
    pub destination_time_ini: f64,
    pub destination_time_end: f64,
    pub npass: u32,
    pub service_time: f64,
    /// Time at which the request becomes known to the system.
    pub issue_time: f64,
    /// Pickup stop, window applied.
    pub spu: Stop,
    /// Set-down stop, window applied.
    pub ssd: Stop,
}

#[allow(clippy::too_many_arguments)]
impl Request {
    pub fn new(
        corpus: &Corpus,
        passenger_id: &str,
        origin_id: &str,
        destination_id: &str,
        origin_time_ini: f64,
        origin_time_end: Option<f64>,
        destination_time_ini: f64,
        destination_time_end: f64,
        npass: u32,
        issue_time: f64,
        max_wait_minutes: f64,
        service_minutes_per_passenger: f64,
    ) -> Result<Self, CorpusError> {
        let service_time = service_minutes_per_passenger * npass as f64;

        // Pickup window end bounded by the maximum waiting time; keep the
        // customer's own bound when it is tighter.
        let mut spu_end_time = origin_time_ini + service_time + max_wait_minutes;
        if let Some(end) = origin_time_end {
            spu_end_time = end.min(spu_end_time);
        }

        let spu = Stop::detached(corpus, origin_id)?.with_window(
            origin_time_ini,
            spu_end_time,
            service_time,
            Some(passenger_id),
        );
        let ssd = Stop::detached(corpus, destination_id)?.with_window(
            destination_time_ini,
            destination_time_end,
            service_time,
            Some(passenger_id),
        );

        Ok(Self {
            passenger_id: passenger_id.to_string(),
            origin_id: origin_id.to_string(),
            destination_id: destination_id.to_string(),
            origin_time_ini,
            origin_time_end: spu_end_time,
            destination_time_ini,
            destination_time_end,
            npass,
            service_time,
            issue_time,
            spu,
            ssd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::StopsCorpus;
    use crate::routing::RouteOracle;

    fn two_stop_corpus() -> Corpus {
        let mut stops = StopsCorpus::default();
        stops.add("a", [-0.40, 39.50]).unwrap();
        stops.add("b", [-0.30, 39.60]).unwrap();
        Corpus::new(stops, RouteOracle::default())
    }

    #[test]
    fn max_wait_tightens_pickup_window() {
        let corpus = two_stop_corpus();
        let req = Request::new(
            &corpus, "alice", "a", "b", 10.0, None, 12.0, 40.0, 1, 5.0, 15.0, 1.0,
        )
        .unwrap();
        // origin_time_ini + service_time + max_wait = 10 + 1 + 15
        assert_eq!(req.origin_time_end, 26.0);
        assert_eq!(req.spu.end_time, 26.0);
        assert_eq!(req.spu.latest, 25.0);
        assert_eq!(req.service_time, 1.0);
    }

    #[test]
    fn customer_bound_wins_when_tighter() {
        let corpus = two_stop_corpus();
        let req = Request::new(
            &corpus,
            "bob",
            "a",
            "b",
            10.0,
            Some(18.0),
            12.0,
            40.0,
            2,
            5.0,
            15.0,
            1.0,
        )
        .unwrap();
        assert_eq!(req.origin_time_end, 18.0);
        // Two passengers double the service time.
        assert_eq!(req.service_time, 2.0);
        assert_eq!(req.ssd.service_time, 2.0);
        assert_eq!(req.ssd.latest, 38.0);
    }
}
