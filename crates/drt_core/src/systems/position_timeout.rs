use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use tracing::warn;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{FleetManager, ManagerState, Vehicle};
use crate::protocol::{AgentMessage, Mailbox};
use crate::scenario::ScenarioParams;

/// The position-collection wait expired with replies missing: log, re-poll
/// the silent vehicles, and loop rather than block the cycle forever.
pub fn position_timeout_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    params: Res<ScenarioParams>,
    manager: Res<FleetManager>,
    mut vehicles: Query<(Entity, &Vehicle, &mut Mailbox)>,
) {
    if event.0.kind != EventKind::PositionTimeout {
        return;
    }
    if manager.state != ManagerState::RequestPositions || manager.n_pending == 0 {
        return;
    }

    let mut missing = 0;
    for (entity, vehicle, mut mailbox) in vehicles.iter_mut() {
        if manager.transport_positions.contains_key(&vehicle.vehicle_id) {
            continue;
        }
        missing += 1;
        mailbox.push(AgentMessage::PositionQuery);
        clock.schedule_in(
            0,
            EventKind::PositionQuery,
            Some(EventSubject::Vehicle(entity)),
        );
    }
    if missing > 0 {
        warn!("no position reply from {missing} vehicle(s); polling again");
        clock.schedule_in_secs(
            params.position_reply_timeout_secs,
            EventKind::PositionTimeout,
            None,
        );
    }
}
