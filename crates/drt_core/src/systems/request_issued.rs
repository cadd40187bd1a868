use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{info, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject};
use crate::corpus::{Corpus, CorpusResource};
use crate::ecs::{Customer, CustomerState, FleetManager};

/// Resolve a customer coordinate to a corpus stop, creating a synthetic
/// `<name>-<origin|destination>-<issue_time>` stop when no stop exists there.
fn resolve_or_create(
    corpus: &mut Corpus,
    name: &str,
    kind: &str,
    issue_time: f64,
    lonlat: [f64; 2],
) -> Result<String, crate::error::CorpusError> {
    if let Ok(id) = corpus.stops.id_at(lonlat) {
        return Ok(id.to_string());
    }
    let id = format!("{name}-{kind}-{issue_time}");
    corpus.stops.add(&id, lonlat)?;
    Ok(id)
}

/// A customer issues their request: resolve its stops and register it with
/// the fleet manager for the next scheduling cycle.
pub fn request_issued_system(
    event: Res<CurrentEvent>,
    mut manager: ResMut<FleetManager>,
    mut corpus: ResMut<CorpusResource>,
    mut customers: Query<&mut Customer>,
) {
    if event.0.kind != EventKind::RequestIssued {
        return;
    }
    let Some(EventSubject::Customer(entity)) = event.0.subject else {
        return;
    };
    let Ok(mut customer) = customers.get_mut(entity) else {
        return;
    };
    if customer.state != CustomerState::WaitingToIssue {
        return;
    }

    let config = customer.config.clone();
    let origin = resolve_or_create(
        &mut corpus.0,
        &config.name,
        "origin",
        config.issue_time,
        config.position,
    );
    let destination = resolve_or_create(
        &mut corpus.0,
        &config.name,
        "destination",
        config.issue_time,
        config.destination,
    );
    match (origin, destination) {
        (Ok(origin_id), Ok(destination_id)) => {
            info!(
                "customer {} requests {} -> {} at minute {}",
                config.name, origin_id, destination_id, config.issue_time
            );
            customer.origin_stop_id = Some(origin_id);
            customer.destination_stop_id = Some(destination_id);
            customer.state = CustomerState::Pending;
            manager.new_customers.push(entity);
        }
        (origin, destination) => {
            warn!(
                "customer {} has unresolvable stops ({:?}, {:?})",
                config.name,
                origin.err(),
                destination.err()
            );
            customer.state = CustomerState::Rejected;
        }
    }
}
