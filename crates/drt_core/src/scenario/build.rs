use bevy_ecs::prelude::World;
use tracing::debug;

use crate::clock::{minutes_to_ms, EventKind, EventSubject, SimulationClock};
use crate::corpus::{Corpus, CorpusResource};
use crate::ecs::{Customer, FleetManager, GeoPosition, Vehicle, VehiclePlan, VehicleState};
use crate::error::ScheduleError;
use crate::geo::point_from_lonlat;
use crate::itinerary::Itinerary;
use crate::protocol::{Mailbox, ManagerInbox};
use crate::scenario::params::{
    FleetConfig, OrderingPolicyKind, ScenarioParams, SimulationEndTimeMs,
};
use crate::scheduler::{
    ByIssuanceOrder, ByMinimalCost, OrderingPolicy, Scheduler, SchedulerResource,
};
use crate::telemetry::SimTelemetry;

/// Build the ordering policy selected by the run parameters.
pub fn create_ordering_policy(params: &ScenarioParams) -> Box<dyn OrderingPolicy> {
    match params.ordering_policy {
        OrderingPolicyKind::ByIssuanceOrder => Box::new(ByIssuanceOrder),
        OrderingPolicyKind::ByMinimalCost => Box::new(ByMinimalCost {
            cap_factor: params.cost_policy_cap_factor,
        }),
    }
}

/// Build the initial itineraries of the configured fleet: one two-stop
/// itinerary per vehicle, bracketed by its shift origin and terminus.
pub fn itineraries_from_config(
    corpus: &Corpus,
    config: &FleetConfig,
) -> Result<Vec<Itinerary>, ScheduleError> {
    let mut itineraries = Vec::with_capacity(config.transports.len());
    for transport in &config.transports {
        let start_stop_id = corpus.stops.id_at(transport.position)?.to_string();
        let end_stop_id = corpus.stops.id_at(transport.destination)?.to_string();
        itineraries.push(Itinerary::new(
            corpus,
            &transport.name,
            transport.capacity,
            &start_stop_id,
            &end_stop_id,
            transport.start_time,
            transport.end_time,
        )?);
    }
    Ok(itineraries)
}

/// Wire a complete online scenario into the world: corpora, scheduler,
/// manager, vehicle and customer entities, and the initial events.
pub fn build_scenario(
    world: &mut World,
    corpus: Corpus,
    config: FleetConfig,
    params: ScenarioParams,
) -> Result<(), ScheduleError> {
    let itineraries = itineraries_from_config(&corpus, &config)?;
    let scheduler = Scheduler::new(itineraries);

    let mut clock = SimulationClock::default();
    clock.schedule_at(0, EventKind::SimulationStarted, None);

    for transport in &config.transports {
        let coords =
            point_from_lonlat(transport.position).map_err(|_| {
                ScheduleError::Corpus(crate::error::CorpusError::InvalidCoords {
                    lon: transport.position[0],
                    lat: transport.position[1],
                })
            })?;
        debug!("spawning vehicle {}", transport.name);
        world.spawn((
            Vehicle {
                vehicle_id: transport.name.clone(),
                capacity: transport.capacity,
                speed_kmh: transport.speed,
                state: VehicleState::Waiting,
                index_current_stop: 0,
                rerouting: false,
            },
            GeoPosition(coords),
            VehiclePlan::default(),
            Mailbox::default(),
        ));
    }

    for customer in &config.customers {
        debug!(
            "spawning customer {} (issues at minute {})",
            customer.name, customer.issue_time
        );
        let entity = world.spawn(Customer::new(customer.clone())).id();
        clock.schedule_at(
            minutes_to_ms(customer.issue_time),
            EventKind::RequestIssued,
            Some(EventSubject::Customer(entity)),
        );
    }

    world.insert_resource(FleetManager::new(config.transports.len()));
    world.insert_resource(ManagerInbox::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SchedulerResource(scheduler));
    world.insert_resource(CorpusResource(corpus));
    if let Some(end_minutes) = params.simulation_end_minutes {
        world.insert_resource(SimulationEndTimeMs(minutes_to_ms(end_minutes)));
    }
    world.insert_resource(params);
    world.insert_resource(clock);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::params::TransportConfig;
    use crate::test_helpers::three_stop_corpus;

    #[test]
    fn scenario_wires_resources_and_entities() {
        let corpus = three_stop_corpus();
        let config = FleetConfig {
            transports: vec![TransportConfig {
                name: "bus1".into(),
                position: [-0.400, 39.500],
                destination: [-0.400, 39.500],
                capacity: 4,
                speed: 30.0,
                start_time: 0.0,
                end_time: 240.0,
            }],
            customers: vec![crate::scenario::params::CustomerConfig {
                name: "alice".into(),
                position: [-0.395, 39.505],
                destination: [-0.390, 39.510],
                npass: 1,
                issue_time: 5.0,
                origin_time_ini: 10.0,
                origin_time_end: Some(30.0),
                destination_time_ini: 12.0,
                destination_time_end: 40.0,
            }],
        };

        let mut world = World::new();
        build_scenario(&mut world, corpus, config, ScenarioParams::default()).unwrap();

        assert!(world.get_resource::<SchedulerResource>().is_some());
        assert!(world.get_resource::<CorpusResource>().is_some());
        let manager = world.resource::<FleetManager>();
        assert_eq!(manager.expected_transports, 1);

        let clock = world.resource::<SimulationClock>();
        // SimulationStarted plus the customer's RequestIssued.
        assert_eq!(clock.pending_event_count(), 2);

        let vehicles = world.query::<&Vehicle>().iter(&world).count();
        assert_eq!(vehicles, 1);
        let customers = world.query::<&Customer>().iter(&world).count();
        assert_eq!(customers, 1);
    }

    #[test]
    fn unresolvable_transport_position_is_fatal() {
        let corpus = three_stop_corpus();
        let config = FleetConfig {
            transports: vec![TransportConfig {
                name: "bus1".into(),
                position: [9.0, 9.0],
                destination: [9.0, 9.0],
                capacity: 4,
                speed: 30.0,
                start_time: 0.0,
                end_time: 240.0,
            }],
            customers: vec![],
        };
        let mut world = World::new();
        let err = build_scenario(&mut world, corpus, config, ScenarioParams::default());
        assert!(err.is_err());
    }
}
