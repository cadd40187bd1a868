//! Error taxonomy for corpus access and scheduling.

use thiserror::Error;

/// Errors raised while consulting or loading the stops / routes corpora.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A coordinate pair has no matching stop in the stops corpus.
    #[error("no stop at coordinates [{lon}, {lat}] in the stops corpus")]
    MissingStop { lon: f64, lat: f64 },

    /// A stop id is unknown to the stops corpus.
    #[error("unknown stop id {0}")]
    UnknownStopId(String),

    /// The routes corpus has no entry for a required pair and no upstream fetch.
    #[error("no route from {from} to {to} in the routes corpus")]
    MissingRoute { from: String, to: String },

    #[error("invalid coordinates [{lon}, {lat}]")]
    InvalidCoords { lon: f64, lat: f64 },

    #[error("corpus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The upstream routing service failed or returned no route.
    #[error("route fetch failed: {0}")]
    Fetch(String),
}

/// Errors raised by the scheduler while searching or committing insertions.
///
/// Infeasible insertions are a domain outcome, not an error; they surface
/// through the `(ok, code)` feasibility returns and never through this type.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// A commit would violate an itinerary invariant (capacity, ordering,
    /// temporal monotonicity). The instance must not keep running on a
    /// known-broken plan.
    #[error("inconsistent itinerary for vehicle {vehicle_id}: {detail}")]
    InconsistentItinerary { vehicle_id: String, detail: String },

    #[error("unknown vehicle {0}")]
    UnknownVehicle(String),
}
