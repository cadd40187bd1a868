//! Event-driven systems: the fleet-manager and vehicle state machines.
//!
//! Systems are functions that query and mutate the ECS world based on the
//! current event. The manager cycles WAITING -> REQUEST_POSITIONS -> UPDATE;
//! vehicles cycle WAITING -> SELECT_DEST -> MOVING_TO_DESTINATION, with
//! MOVING -> SELECT_DEST on a rerouting abort. Systems react to the
//! `CurrentEvent` resource inserted by the runner before each schedule
//! execution.

pub mod arrival;
pub mod depart_stop;
pub mod dispatch_update;
pub mod itinerary_update;
pub mod manager_poll;
pub mod movement;
pub mod position_query;
pub mod position_reply;
pub mod position_timeout;
pub mod request_issued;
pub mod select_dest;
pub mod simulation_started;
