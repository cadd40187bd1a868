//! # Demand-Responsive Transport Scheduling Core
//!
//! An online insertion-based scheduler for demand-responsive transport: as
//! customer ride requests arrive over time, each request's pickup and
//! set-down stops are placed into a vehicle itinerary subject to capacity
//! and time-window constraints, or the request is rejected. The objective
//! is fleet-wide driven kilometres.
//!
//! ## Overview
//!
//! - **Itinerary model**: per-vehicle stop sequences with propagated
//!   earliest-arrival / latest-departure times, loads, and slack
//! - **Insertion search**: every feasible (pickup x set-down) position pair
//!   across the fleet, cheapest committed
//! - **Dispatch loop**: a discrete-event state machine that detects new
//!   requests, snapshots vehicle positions, reruns the search, and pushes
//!   revised plans, rerouting vehicles mid-leg
//! - **Corpora**: stops and routes loaded from disk, optionally completed
//!   by an OSRM fetch (`osrm` feature)
//!
//! Deterministic by construction: a fixed input and fixed oracle responses
//! give an identical event order and identical scheduling decisions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bevy_ecs::prelude::World;
//! use drt_core::corpus::Corpus;
//! use drt_core::runner::{run_until_empty, simulation_schedule};
//! use drt_core::scenario::{build_scenario, FleetConfig, ScenarioParams};
//!
//! let corpus = Corpus::load("stops.json", "routes.json").unwrap();
//! let config = FleetConfig::load("config.json".as_ref()).unwrap();
//!
//! let mut world = World::new();
//! build_scenario(&mut world, corpus, config, ScenarioParams::default()).unwrap();
//! let mut schedule = simulation_schedule();
//! run_until_empty(&mut world, &mut schedule, 1_000_000);
//! ```

pub mod clock;
pub mod corpus;
pub mod ecs;
pub mod error;
pub mod geo;
pub mod insertion;
pub mod itinerary;
pub mod output;
pub mod protocol;
pub mod request;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod scheduler;
pub mod stop;
pub mod systems;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(test)]
pub mod test_helpers;
