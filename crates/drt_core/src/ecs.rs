//! Components and state enums for vehicles, customers, and the fleet
//! manager.
//!
//! Vehicles and customers are entities; the fleet manager is a singleton
//! resource. Systems query and mutate these based on the current event.

use std::collections::HashMap;

use bevy_ecs::prelude::{Component, Entity, Resource};

use crate::geo::GeoPoint;
use crate::itinerary::PlanStop;
use crate::scenario::CustomerConfig;

/// Vehicle-side state machine: waiting at a stop, choosing the next stop,
/// or driving towards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    Waiting,
    SelectDest,
    MovingToDestination,
}

#[derive(Debug, Component)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub capacity: u32,
    /// Nominal speed from the fleet configuration (km/h). Leg timings come
    /// from the routing oracle; the speed is kept for synthetic routes.
    pub speed_kmh: f64,
    pub state: VehicleState,
    /// Progress pointer into the plan: the stop last arrived at.
    pub index_current_stop: usize,
    /// Set when an itinerary update changed the immediate next stop; the
    /// vehicle must re-select its destination, aborting any in-flight move.
    pub rerouting: bool,
}

/// Precise vehicle location, updated waypoint-by-waypoint while moving.
#[derive(Debug, Clone, Copy, Component)]
pub struct GeoPosition(pub GeoPoint);

/// The plan a vehicle currently holds. `None` until the manager has pushed
/// the initial itinerary.
#[derive(Debug, Default, Component)]
pub struct VehiclePlan {
    pub stops: Option<Vec<PlanStop>>,
}

impl VehiclePlan {
    /// The stop after the vehicle's progress pointer, if any.
    pub fn next_stop(&self, index_current: usize) -> Option<&PlanStop> {
        self.stops.as_ref().and_then(|s| s.get(index_current + 1))
    }
}

/// The in-flight route of a moving vehicle: waypoints with per-segment
/// travel times. Removed on arrival or on a rerouting abort.
#[derive(Debug, Component)]
pub struct VehicleRoute {
    pub waypoints: Vec<GeoPoint>,
    pub segment_times_ms: Vec<u64>,
    /// Next waypoint to reach.
    pub next_index: usize,
    /// Plan index of the stop this route leads to.
    pub target_stop_index: usize,
    /// Timestamp of the pending `MoveStep`; a mismatching event is stale
    /// (the move it belonged to was aborted) and must be ignored.
    pub next_step_due: Option<u64>,
}

/// Customer lifecycle around the dispatcher: spawned silent, issues a
/// request, then ends scheduled or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerState {
    WaitingToIssue,
    Pending,
    Scheduled,
    Rejected,
}

#[derive(Debug, Component)]
pub struct Customer {
    pub config: CustomerConfig,
    pub state: CustomerState,
    /// Corpus stop ids the customer's coordinates resolved to, filled when
    /// the request is issued.
    pub origin_stop_id: Option<String>,
    pub destination_stop_id: Option<String>,
}

impl Customer {
    pub fn new(config: CustomerConfig) -> Self {
        Self {
            config,
            state: CustomerState::WaitingToIssue,
            origin_stop_id: None,
            destination_stop_id: None,
        }
    }
}

/// Manager-side state machine of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Waiting,
    RequestPositions,
    Update,
}

/// The fleet manager: singleton driving request detection, position
/// collection, and plan broadcasting.
#[derive(Debug, Resource)]
pub struct FleetManager {
    pub state: ManagerState,
    pub expected_transports: usize,
    pub initial_itineraries_sent: bool,
    /// Position snapshot being collected for the current cycle.
    pub transport_positions: HashMap<String, GeoPoint>,
    /// Replies still missing in the current collection round.
    pub n_pending: usize,
    /// Customers that issued a request since the last scheduling cycle.
    pub new_customers: Vec<Entity>,
}

impl FleetManager {
    pub fn new(expected_transports: usize) -> Self {
        Self {
            state: ManagerState::Waiting,
            expected_transports,
            initial_itineraries_sent: false,
            transport_positions: HashMap::new(),
            n_pending: 0,
            new_customers: Vec::new(),
        }
    }

    pub fn clear_positions(&mut self) {
        self.transport_positions.clear();
    }
}
