use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::{info, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{Vehicle, VehiclePlan, VehicleRoute, VehicleState};
use crate::protocol::{AgentMessage, Mailbox};

/// Vehicle side of a plan push. The stop that was next before the update is
/// compared with the stop now scheduled next: when they differ the vehicle
/// flags a rerouting and, if it is driving, aborts the in-flight move.
pub fn itinerary_update_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut vehicles: Query<(&mut Vehicle, &mut VehiclePlan, &mut Mailbox)>,
) {
    if event.0.kind != EventKind::ItineraryUpdate {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut vehicle, mut plan, mut mailbox)) = vehicles.get_mut(entity) else {
        return;
    };
    let Some(AgentMessage::NewItinerary { stops }) =
        mailbox.pop_where(|m| matches!(m, AgentMessage::NewItinerary { .. }))
    else {
        return;
    };

    if plan.stops.is_none() {
        info!(
            "vehicle {} received its first itinerary ({} stops)",
            vehicle.vehicle_id,
            stops.len()
        );
        plan.stops = Some(stops);
        clock.schedule_in(0, EventKind::DepartStop, Some(EventSubject::Vehicle(entity)));
        return;
    }

    let prev_next = plan.next_stop(vehicle.index_current_stop).cloned();
    plan.stops = Some(stops);
    let new_next = plan.next_stop(vehicle.index_current_stop);

    let next_changed = match (&prev_next, new_next) {
        (Some(prev), Some(new)) => !prev.same_visit(new),
        (None, Some(_)) => true,
        _ => false,
    };

    // A changed next stop only preempts a vehicle that is choosing its
    // destination or already driving; a waiting vehicle picks the new plan
    // up through its departure checks.
    if next_changed {
        match vehicle.state {
            VehicleState::MovingToDestination => {
                warn!("vehicle {} requires rerouting", vehicle.vehicle_id);
                vehicle.rerouting = true;
                // One-shot abort of the in-flight move; the pending MoveStep
                // becomes stale once the route is gone.
                commands.entity(entity).remove::<VehicleRoute>();
                vehicle.state = VehicleState::SelectDest;
                clock.schedule_in(0, EventKind::SelectDest, Some(EventSubject::Vehicle(entity)));
            }
            VehicleState::SelectDest => {
                warn!("vehicle {} requires rerouting", vehicle.vehicle_id);
                vehicle.rerouting = true;
            }
            VehicleState::Waiting => {
                clock.schedule_in(0, EventKind::DepartStop, Some(EventSubject::Vehicle(entity)));
            }
        }
    } else if vehicle.state == VehicleState::Waiting {
        // Departure times may have moved; re-evaluate.
        clock.schedule_in(0, EventKind::DepartStop, Some(EventSubject::Vehicle(entity)));
    }
}
