use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{GeoPosition, Vehicle};
use crate::geo::lonlat_from_point;
use crate::protocol::{AgentMessage, Mailbox, ManagerInbox};

/// Vehicle side of the position poll: answer with the current position.
pub fn position_query_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut inbox: ResMut<ManagerInbox>,
    mut vehicles: Query<(&Vehicle, &GeoPosition, &mut Mailbox)>,
) {
    if event.0.kind != EventKind::PositionQuery {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((vehicle, position, mut mailbox)) = vehicles.get_mut(entity) else {
        return;
    };
    if mailbox
        .pop_where(|m| matches!(m, AgentMessage::PositionQuery))
        .is_none()
    {
        return;
    }

    debug!("vehicle {} reporting its position", vehicle.vehicle_id);
    inbox.push(AgentMessage::PositionReply {
        vehicle_id: vehicle.vehicle_id.clone(),
        current_pos: lonlat_from_point(position.0),
    });
    clock.schedule_in(
        0,
        EventKind::PositionReply,
        Some(EventSubject::Vehicle(entity)),
    );
}
