use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{Vehicle, VehiclePlan, VehicleState};

/// WAITING state of a vehicle: stay at the current stop until its scheduled
/// departure (or until a rerouting makes the wait moot), then select the
/// next destination. A vehicle whose next stop is the shift terminus keeps
/// waiting where it is.
pub fn depart_stop_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut vehicles: Query<(&mut Vehicle, &VehiclePlan)>,
) {
    if event.0.kind != EventKind::DepartStop {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut vehicle, plan)) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::Waiting {
        return;
    }
    let Some(stops) = plan.stops.as_ref() else {
        return;
    };
    if vehicle.index_current_stop + 1 >= stops.len() {
        debug!("vehicle {} is at its last stop", vehicle.vehicle_id);
        return;
    }

    if vehicle.rerouting {
        vehicle.state = VehicleState::SelectDest;
        clock.schedule_in(0, EventKind::SelectDest, Some(EventSubject::Vehicle(entity)));
        return;
    }

    if vehicle.index_current_stop + 2 == stops.len() {
        debug!(
            "vehicle {} waiting at its penultimate stop",
            vehicle.vehicle_id
        );
        return;
    }

    let Some(departure) = stops[vehicle.index_current_stop].departure_time else {
        return;
    };
    if clock.now_minutes() >= departure {
        vehicle.state = VehicleState::SelectDest;
        clock.schedule_in(0, EventKind::SelectDest, Some(EventSubject::Vehicle(entity)));
    } else {
        debug!(
            "vehicle {} waiting for departure at minute {departure:.2}",
            vehicle.vehicle_id
        );
        clock.schedule_at_minutes(departure, EventKind::DepartStop, Some(EventSubject::Vehicle(entity)));
    }
}
