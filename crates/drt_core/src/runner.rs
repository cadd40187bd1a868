//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each
//! step pops the next event from [`SimulationClock`], inserts it as
//! [`CurrentEvent`], then runs the schedule.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::scenario::SimulationEndTimeMs;
use crate::systems::{
    arrival::arrival_system, depart_stop::depart_stop_system,
    dispatch_update::dispatch_update_system, itinerary_update::itinerary_update_system,
    manager_poll::manager_poll_system, movement::movement_system,
    position_query::position_query_system, position_reply::position_reply_system,
    position_timeout::position_timeout_system, request_issued::request_issued_system,
    select_dest::select_dest_system, simulation_started::simulation_started_system,
};

// Condition functions for each event kind
fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SimulationStarted)
        .unwrap_or(false)
}

fn is_request_issued(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::RequestIssued)
        .unwrap_or(false)
}

fn is_manager_poll(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ManagerPoll)
        .unwrap_or(false)
}

fn is_position_query(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PositionQuery)
        .unwrap_or(false)
}

fn is_position_reply(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PositionReply)
        .unwrap_or(false)
}

fn is_position_timeout(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PositionTimeout)
        .unwrap_or(false)
}

fn is_dispatch_update(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::DispatchUpdate)
        .unwrap_or(false)
}

fn is_itinerary_update(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ItineraryUpdate)
        .unwrap_or(false)
}

fn is_depart_stop(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::DepartStop)
        .unwrap_or(false)
}

fn is_select_dest(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SelectDest)
        .unwrap_or(false)
}

fn is_move_step(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::MoveStep)
        .unwrap_or(false)
}

fn is_arrived_at_stop(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ArrivedAtStop)
        .unwrap_or(false)
}

/// Runs one simulation step: pops the next event, inserts it as
/// [`CurrentEvent`], then runs the schedule. Returns `false` when the clock
/// is empty or the next event is at or past [`SimulationEndTimeMs`].
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let stop_at = world.get_resource::<SimulationEndTimeMs>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end_ms), Some(ts)) = (stop_at, next_ts) {
        if ts >= end_ms {
            return false;
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Runs one simulation step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(world: &mut World, schedule: &mut Schedule, mut hook: F) -> bool
where
    F: FnMut(&World, &Event),
{
    let stop_at = world.get_resource::<SimulationEndTimeMs>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end_ms), Some(ts)) = (stop_at, next_ts) {
        if ts >= end_ms {
            return false;
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    hook(world, &event);
    true
}

/// Runs simulation steps until the event queue is empty or `max_steps` is
/// reached. Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Builds the dispatch schedule: every event-reacting system, gated by event
/// kind, plus [`apply_deferred`] so spawned/removed components apply before
/// the next step.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        simulation_started_system.run_if(is_simulation_started),
        request_issued_system.run_if(is_request_issued),
        manager_poll_system.run_if(is_manager_poll),
        position_query_system.run_if(is_position_query),
        position_reply_system.run_if(is_position_reply),
        position_timeout_system.run_if(is_position_timeout),
        dispatch_update_system.run_if(is_dispatch_update),
        itinerary_update_system.run_if(is_itinerary_update),
        depart_stop_system.run_if(is_depart_stop),
        select_dest_system.run_if(is_select_dest),
        movement_system.run_if(is_move_step),
        arrival_system.run_if(is_arrived_at_stop),
        apply_deferred,
    ));
    schedule
}
