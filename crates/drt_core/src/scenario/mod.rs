//! Scenario setup: run parameters, fleet/demand configuration, and world
//! wiring for the online dispatch loop.

mod build;
mod params;

pub use build::{build_scenario, create_ordering_policy, itineraries_from_config};
pub use params::{
    CustomerConfig, FleetConfig, OrderingPolicyKind, OutputPaths, ScenarioParams,
    SimulationEndTimeMs, TransportConfig,
};
