use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::info;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{GeoPosition, Vehicle, VehiclePlan, VehicleRoute, VehicleState};
use crate::geo::point_from_lonlat;
use crate::telemetry::{SimTelemetry, StopArrivalRecord};

/// The vehicle reached the stop it was driving to: advance the progress
/// pointer, snap to the stop, and go back to waiting. Idempotent with the
/// rerouting abort: an arrival for a discarded move finds the vehicle no
/// longer moving and does nothing.
pub fn arrival_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut telemetry: ResMut<SimTelemetry>,
    mut vehicles: Query<(
        &mut Vehicle,
        &VehiclePlan,
        &mut GeoPosition,
        Option<&VehicleRoute>,
    )>,
) {
    if event.0.kind != EventKind::ArrivedAtStop {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut vehicle, plan, mut position, route)) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::MovingToDestination {
        return;
    }
    let Some(route) = route else {
        return;
    };

    vehicle.index_current_stop = route.target_stop_index;
    if let Some(stop) = plan
        .stops
        .as_ref()
        .and_then(|s| s.get(vehicle.index_current_stop))
    {
        if let Ok(coords) = point_from_lonlat(stop.coords) {
            position.0 = coords;
        }
        info!(
            "vehicle {} arrived at stop {} (minute {:.2})",
            vehicle.vehicle_id,
            stop.stop_id,
            clock.now_minutes()
        );
        telemetry.arrivals.push(StopArrivalRecord {
            vehicle_id: vehicle.vehicle_id.clone(),
            stop_id: stop.stop_id.clone(),
            arrived_at: clock.now_minutes(),
        });
    }

    commands.entity(entity).remove::<VehicleRoute>();
    vehicle.state = VehicleState::Waiting;
    clock.schedule_in(0, EventKind::DepartStop, Some(EventSubject::Vehicle(entity)));
}
