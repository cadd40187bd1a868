use std::path::PathBuf;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::scheduler::policy::DEFAULT_COST_POLICY_CAP_FACTOR;

/// Default pickup max-wait bound (minutes).
const DEFAULT_MAX_WAIT_MINUTES: f64 = 15.0;
/// Default per-passenger loading/unloading time (minutes).
const DEFAULT_SERVICE_MINUTES_PER_PASSENGER: f64 = 1.0;
/// Default manager poll period between request checks (seconds).
const DEFAULT_MANAGER_POLL_SECS: u64 = 30;
/// Default per-iteration wait for vehicle position replies (seconds).
const DEFAULT_POSITION_REPLY_TIMEOUT_SECS: u64 = 10;

/// Which ordering policy solves the instance. Exactly one is invoked per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderingPolicyKind {
    #[default]
    ByIssuanceOrder,
    ByMinimalCost,
}

/// Simulation end time in milliseconds. When set, the runner stops once the
/// next event would be at or past this timestamp.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationEndTimeMs(pub u64);

/// One fleet vehicle as configured on disk. Positions are `[lon, lat]` and
/// must resolve to stops of the stops corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub name: String,
    pub position: [f64; 2],
    pub destination: [f64; 2],
    pub capacity: u32,
    pub speed: f64,
    pub start_time: f64,
    pub end_time: f64,
}

/// One customer as configured on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerConfig {
    pub name: String,
    pub position: [f64; 2],
    pub destination: [f64; 2],
    pub npass: u32,
    pub issue_time: f64,
    pub origin_time_ini: f64,
    #[serde(default)]
    pub origin_time_end: Option<f64>,
    pub destination_time_ini: f64,
    pub destination_time_end: f64,
}

/// The fleet and demand of one problem instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub transports: Vec<TransportConfig>,
    pub customers: Vec<CustomerConfig>,
}

impl FleetConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::CorpusError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Paths of the per-cycle itinerary output files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub vehicle_itineraries: PathBuf,
    pub customer_itineraries: PathBuf,
}

/// Immutable run parameters, injected at construction.
#[derive(Debug, Clone, Resource)]
pub struct ScenarioParams {
    /// System-wide bound on how long a customer may wait at the pickup stop.
    pub max_wait_minutes: f64,
    pub service_minutes_per_passenger: f64,
    pub ordering_policy: OrderingPolicyKind,
    /// Iteration budget multiplier of the minimal-cost policy.
    pub cost_policy_cap_factor: usize,
    /// Manager sleep between request checks.
    pub manager_poll_secs: u64,
    /// Per-iteration wait for position replies.
    pub position_reply_timeout_secs: u64,
    /// Stop the event loop at this fleet minute, if set.
    pub simulation_end_minutes: Option<f64>,
    /// Write itinerary files after each cycle, if set.
    pub output: Option<OutputPaths>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            max_wait_minutes: DEFAULT_MAX_WAIT_MINUTES,
            service_minutes_per_passenger: DEFAULT_SERVICE_MINUTES_PER_PASSENGER,
            ordering_policy: OrderingPolicyKind::default(),
            cost_policy_cap_factor: DEFAULT_COST_POLICY_CAP_FACTOR,
            manager_poll_secs: DEFAULT_MANAGER_POLL_SECS,
            position_reply_timeout_secs: DEFAULT_POSITION_REPLY_TIMEOUT_SECS,
            simulation_end_minutes: None,
            output: None,
        }
    }
}

impl ScenarioParams {
    pub fn with_poll_secs(mut self, secs: u64) -> Self {
        self.manager_poll_secs = secs;
        self
    }

    pub fn with_end_minutes(mut self, minutes: f64) -> Self {
        self.simulation_end_minutes = Some(minutes);
        self
    }

    pub fn with_output(mut self, output: OutputPaths) -> Self {
        self.output = Some(output);
        self
    }
}
