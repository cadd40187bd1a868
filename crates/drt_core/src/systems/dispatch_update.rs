use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use tracing::{error, info, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::corpus::CorpusResource;
use crate::ecs::{Customer, CustomerState, FleetManager, ManagerState, Vehicle};
use crate::output::{write_customer_itineraries, write_vehicle_itineraries};
use crate::protocol::{AgentMessage, Mailbox};
use crate::request::Request;
use crate::scenario::ScenarioParams;
use crate::scheduler::SchedulerResource;
use crate::telemetry::{ServiceRecord, SimTelemetry};

/// UPDATE state of the manager: push the position snapshot into the
/// scheduler, schedule the whole batch of newly issued requests against it,
/// broadcast the touched plans, and return to WAITING.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_update_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    params: Res<ScenarioParams>,
    mut manager: ResMut<FleetManager>,
    mut scheduler: ResMut<SchedulerResource>,
    mut corpus: ResMut<CorpusResource>,
    mut telemetry: ResMut<SimTelemetry>,
    mut customers: Query<&mut Customer>,
    mut vehicles: Query<(Entity, &Vehicle, &mut Mailbox)>,
) {
    if event.0.kind != EventKind::DispatchUpdate {
        return;
    }
    if manager.state != ManagerState::Update {
        return;
    }
    let scheduler = &mut scheduler.0;
    let corpus = &mut corpus.0;

    scheduler.set_transport_positions(manager.transport_positions.clone());

    // Turn the newly issued customers into pending requests.
    let new_customers = std::mem::take(&mut manager.new_customers);
    for &entity in &new_customers {
        let resolved = customers.get(entity).ok().and_then(|customer| {
            match (&customer.origin_stop_id, &customer.destination_stop_id) {
                (Some(origin), Some(destination)) => {
                    Some((customer.config.clone(), origin.clone(), destination.clone()))
                }
                _ => None,
            }
        });
        let Some((config, origin_id, destination_id)) = resolved else {
            continue;
        };
        match Request::new(
            corpus,
            &config.name,
            &origin_id,
            &destination_id,
            config.origin_time_ini,
            config.origin_time_end,
            config.destination_time_ini,
            config.destination_time_end,
            config.npass,
            config.issue_time,
            params.max_wait_minutes,
            params.service_minutes_per_passenger,
        ) {
            Ok(request) => scheduler.pending_requests.push(request),
            Err(e) => {
                error!("request of customer {} is unusable: {e}", config.name);
                if let Ok(mut customer) = customers.get_mut(entity) {
                    customer.state = CustomerState::Rejected;
                }
            }
        }
    }

    let cycle_rejected = match scheduler.schedule_new_requests(corpus) {
        Ok(rejected) => rejected,
        Err(e) => {
            // Corpus or invariant failures end the cycle; the manager goes
            // back to waiting rather than running on a broken plan.
            error!("scheduling cycle aborted: {e}");
            manager.state = ManagerState::Waiting;
            clock.schedule_in_secs(params.manager_poll_secs, EventKind::ManagerPoll, None);
            return;
        }
    };

    // Mark customers and record the accepted services.
    for &entity in &new_customers {
        let Ok(mut customer) = customers.get_mut(entity) else {
            continue;
        };
        if customer.state != CustomerState::Pending {
            continue;
        }
        let name = customer.config.name.clone();
        if cycle_rejected.iter().any(|r| r == &name) {
            customer.state = CustomerState::Rejected;
            continue;
        }
        customer.state = CustomerState::Scheduled;
        let insertion = scheduler
            .insertion_log
            .values()
            .flatten()
            .find(|i| i.request.passenger_id == name)
            .cloned();
        if let Some(insertion) = insertion {
            let segment = scheduler.passenger_segment(&name);
            if let (Some(first), Some(last)) = (segment.first(), segment.last()) {
                telemetry.services.push(ServiceRecord {
                    passenger_id: name,
                    vehicle_id: insertion.vehicle_id.clone(),
                    npass: insertion.request.npass,
                    issue_time: insertion.request.issue_time,
                    pickup_at: first.arrival_time,
                    dropoff_at: last.arrival_time,
                    cost_increment: insertion.cost_increment,
                });
            }
        }
    }

    if let Some(output) = &params.output {
        if let Err(e) = write_vehicle_itineraries(&output.vehicle_itineraries, scheduler) {
            warn!("could not write vehicle itineraries: {e}");
        }
        if let Err(e) = write_customer_itineraries(&output.customer_itineraries, scheduler) {
            warn!("could not write customer itineraries: {e}");
        }
    }

    // Push every touched plan to its vehicle.
    for (entity, vehicle, mut mailbox) in vehicles.iter_mut() {
        if let Some(plan) = scheduler.modified_itineraries.get(&vehicle.vehicle_id) {
            info!("sending updated itinerary to {}", vehicle.vehicle_id);
            mailbox.push(AgentMessage::NewItinerary {
                stops: plan.clone(),
            });
            clock.schedule_in(
                0,
                EventKind::ItineraryUpdate,
                Some(EventSubject::Vehicle(entity)),
            );
        }
    }

    manager.state = ManagerState::Waiting;
    clock.schedule_in_secs(params.manager_poll_secs, EventKind::ManagerPoll, None);
}
