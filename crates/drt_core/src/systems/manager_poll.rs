use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use tracing::{debug, info, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{FleetManager, ManagerState, Vehicle};
use crate::protocol::{AgentMessage, Mailbox};
use crate::scenario::ScenarioParams;
use crate::scheduler::SchedulerResource;

/// WAITING state of the manager: wait for the fleet to register, push the
/// initial itineraries once, then poll for newly issued requests. When new
/// requests exist, ask every vehicle for its position and move to
/// REQUEST_POSITIONS.
pub fn manager_poll_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    params: Res<ScenarioParams>,
    mut manager: ResMut<FleetManager>,
    scheduler: Res<SchedulerResource>,
    mut vehicles: Query<(Entity, &Vehicle, &mut Mailbox)>,
) {
    if event.0.kind != EventKind::ManagerPoll {
        return;
    }
    if manager.state != ManagerState::Waiting {
        return;
    }

    let registered = vehicles.iter().count();
    if registered < manager.expected_transports {
        warn!(
            "only {registered}/{} transports registered; waiting",
            manager.expected_transports
        );
        clock.schedule_in_secs(5, EventKind::ManagerPoll, None);
        return;
    }

    if !manager.initial_itineraries_sent {
        info!("sending initial itineraries to {} transport(s)", registered);
        let mut plans = scheduler.0.all_plans();
        for (entity, vehicle, mut mailbox) in vehicles.iter_mut() {
            if let Some(plan) = plans.remove(&vehicle.vehicle_id) {
                mailbox.push(AgentMessage::NewItinerary { stops: plan });
                clock.schedule_in(
                    0,
                    EventKind::ItineraryUpdate,
                    Some(EventSubject::Vehicle(entity)),
                );
            }
        }
        manager.initial_itineraries_sent = true;
        clock.schedule_in_secs(1, EventKind::ManagerPoll, None);
        return;
    }

    if manager.new_customers.is_empty() {
        debug!("no new requests");
        clock.schedule_in_secs(params.manager_poll_secs, EventKind::ManagerPoll, None);
        return;
    }

    info!(
        "{} new request(s); collecting transport positions",
        manager.new_customers.len()
    );
    manager.clear_positions();
    let mut polled = 0;
    for (entity, _, mut mailbox) in vehicles.iter_mut() {
        mailbox.push(AgentMessage::PositionQuery);
        clock.schedule_in(
            0,
            EventKind::PositionQuery,
            Some(EventSubject::Vehicle(entity)),
        );
        polled += 1;
    }
    manager.state = ManagerState::RequestPositions;
    manager.n_pending = polled;
    clock.schedule_in_secs(
        params.position_reply_timeout_secs,
        EventKind::PositionTimeout,
        None,
    );
}
