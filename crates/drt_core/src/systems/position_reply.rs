use bevy_ecs::prelude::{Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::corpus::CorpusResource;
use crate::ecs::{FleetManager, ManagerState};
use crate::geo::point_from_lonlat;
use crate::protocol::{AgentMessage, ManagerInbox};

/// REQUEST_POSITIONS state of the manager: store one position reply per
/// iteration and register the position as a synthetic corpus stop. Once all
/// expected replies arrived, move to UPDATE.
pub fn position_reply_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut manager: ResMut<FleetManager>,
    mut inbox: ResMut<ManagerInbox>,
    mut corpus: ResMut<CorpusResource>,
) {
    if event.0.kind != EventKind::PositionReply {
        return;
    }
    if manager.state != ManagerState::RequestPositions {
        // Late reply from a previous round; drop it.
        inbox.pop();
        return;
    }
    let Some(AgentMessage::PositionReply {
        vehicle_id,
        current_pos,
    }) = inbox.pop_where(|m| matches!(m, AgentMessage::PositionReply { .. }))
    else {
        return;
    };

    let Ok(coords) = point_from_lonlat(current_pos) else {
        warn!("vehicle {vehicle_id} reported invalid coordinates {current_pos:?}");
        return;
    };
    debug!(
        "position of {} is [{}, {}]",
        vehicle_id, current_pos[0], current_pos[1]
    );
    manager
        .transport_positions
        .insert(vehicle_id.clone(), coords);
    if let Err(e) = corpus
        .0
        .add_synthetic_stop(&format!("{vehicle_id}-current-0"), coords)
    {
        warn!("could not register current-position stop for {vehicle_id}: {e}");
    }

    manager.n_pending = manager
        .expected_transports
        .saturating_sub(manager.transport_positions.len());
    if manager.n_pending == 0 {
        manager.state = ManagerState::Update;
        clock.schedule_in(0, EventKind::DispatchUpdate, None);
    }
}
