use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::{debug, info, warn};

use crate::clock::{minutes_to_ms, CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::corpus::CorpusResource;
use crate::ecs::{GeoPosition, Vehicle, VehiclePlan, VehicleRoute, VehicleState};
use crate::geo::{geodesic_km, point_from_lonlat};
use crate::routing::{GeodesicFetch, RouteFetch, RouteResult};

/// SELECT_DEST state of a vehicle: pick the next plan stop and start moving
/// towards it. Legs come from the routing oracle; when the vehicle stands at
/// an off-corpus point (after an aborted move) the leg falls back to a
/// straight line at the vehicle's nominal speed.
pub fn select_dest_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    corpus: Res<CorpusResource>,
    mut vehicles: Query<(&mut Vehicle, &VehiclePlan, &GeoPosition)>,
) {
    if event.0.kind != EventKind::SelectDest {
        return;
    }
    let Some(EventSubject::Vehicle(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut vehicle, plan, position)) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state == VehicleState::MovingToDestination {
        return;
    }
    if vehicle.rerouting {
        debug!("vehicle {} rerouted; resetting flag", vehicle.vehicle_id);
        vehicle.rerouting = false;
    }

    let target_stop_index = vehicle.index_current_stop + 1;
    let Some(next) = plan
        .stops
        .as_ref()
        .and_then(|s| s.get(target_stop_index))
    else {
        warn!(
            "vehicle {} has reached the last stop in its itinerary",
            vehicle.vehicle_id
        );
        vehicle.state = VehicleState::Waiting;
        return;
    };
    let Ok(target) = point_from_lonlat(next.coords) else {
        warn!(
            "vehicle {} has an invalid next stop {:?}",
            vehicle.vehicle_id, next.coords
        );
        vehicle.state = VehicleState::Waiting;
        return;
    };

    let route = corpus.0.routes.route(position.0, target).or_else(|_| {
        GeodesicFetch::new(vehicle.speed_kmh)
            .fetch(position.0, target)
            .map(|record| RouteResult {
                path: record
                    .path
                    .iter()
                    .filter_map(|p| crate::geo::GeoPoint::new(p[0], p[1]).ok())
                    .collect(),
                distance_m: record.distance_m,
                duration_s: record.duration_s,
            })
    });
    let Ok(route) = route else {
        warn!(
            "vehicle {} has no route to stop {}",
            vehicle.vehicle_id, next.stop_id
        );
        vehicle.state = VehicleState::Waiting;
        return;
    };

    info!(
        "vehicle {} in route to stop {} ({:.2} km)",
        vehicle.vehicle_id,
        next.stop_id,
        route.distance_km()
    );

    let mut waypoints = route.path.clone();
    if waypoints.len() < 2 {
        waypoints = vec![position.0, target];
    }

    // Distribute the leg duration over the waypoint segments in proportion
    // to their straight-line lengths.
    let total_ms = minutes_to_ms(route.duration_min());
    let lengths: Vec<f64> = waypoints
        .windows(2)
        .map(|pair| geodesic_km(pair[0], pair[1]))
        .collect();
    let total_km: f64 = lengths.iter().sum();
    let segment_times_ms: Vec<u64> = if total_km > 0.0 {
        lengths
            .iter()
            .map(|l| (total_ms as f64 * l / total_km).round() as u64)
            .collect()
    } else {
        vec![0; lengths.len()]
    };

    vehicle.state = VehicleState::MovingToDestination;
    if total_ms == 0 {
        commands.entity(entity).insert(VehicleRoute {
            waypoints,
            segment_times_ms,
            next_index: 1,
            target_stop_index,
            next_step_due: None,
        });
        clock.schedule_in(
            0,
            EventKind::ArrivedAtStop,
            Some(EventSubject::Vehicle(entity)),
        );
        return;
    }

    let first_dt = segment_times_ms[0];
    commands.entity(entity).insert(VehicleRoute {
        waypoints,
        segment_times_ms,
        next_index: 1,
        target_stop_index,
        next_step_due: Some(clock.now() + first_dt),
    });
    clock.schedule_in(first_dt, EventKind::MoveStep, Some(EventSubject::Vehicle(entity)));
}
