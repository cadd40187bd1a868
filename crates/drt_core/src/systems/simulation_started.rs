use bevy_ecs::prelude::{Res, ResMut};
use tracing::info;

use crate::clock::{CurrentEvent, EventKind, SimulationClock};

/// Kick off the dispatch loop: the manager starts polling immediately.
pub fn simulation_started_system(mut clock: ResMut<SimulationClock>, event: Res<CurrentEvent>) {
    if event.0.kind != EventKind::SimulationStarted {
        return;
    }
    info!("simulation started");
    clock.schedule_in(0, EventKind::ManagerPoll, None);
}
