//! Movement system: advances a vehicle waypoint-by-waypoint along its route.
//!
//! Each `MoveStep` carries the vehicle to the next waypoint and schedules
//! the following one. A `MoveStep` whose timestamp does not match the
//! route's pending step belongs to an aborted move and is ignored.

use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{GeoPosition, Vehicle, VehicleRoute, VehicleState};

pub fn movement_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut vehicles: Query<(
        &Vehicle,
        &mut GeoPosition,
        Option<&mut VehicleRoute>,
    )>,
) {
    if event.0.kind != EventKind::MoveStep {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((vehicle, mut position, route)) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::MovingToDestination {
        return;
    }
    let Some(mut route) = route else {
        return;
    };
    match route.next_step_due {
        Some(due) if due == clock.now() => {}
        _ => return,
    }

    position.0 = route.waypoints[route.next_index];

    if route.next_index + 1 >= route.waypoints.len() {
        route.next_step_due = None;
        clock.schedule_in(
            0,
            EventKind::ArrivedAtStop,
            Some(EventSubject::Vehicle(entity)),
        );
    } else {
        let dt = route.segment_times_ms[route.next_index];
        route.next_index += 1;
        route.next_step_due = Some(clock.now() + dt);
        clock.schedule_in(dt, EventKind::MoveStep, Some(EventSubject::Vehicle(entity)));
    }
}
