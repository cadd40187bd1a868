//! Simulation time: millisecond-scale timeline driving the dispatch loop.
//!
//! All timestamps and `clock.now()` are in **simulation milliseconds**; the
//! scheduling core reasons in minutes, converted at the event boundary. The
//! timeline advances by popping the next scheduled event (same-ms events are
//! ordered by `EventKind`).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

/// One second in simulation milliseconds.
pub const ONE_SEC_MS: u64 = 1000;
/// One minute in simulation milliseconds.
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;

/// Convert simulation milliseconds to fleet minutes.
pub fn ms_to_minutes(ms: u64) -> f64 {
    ms as f64 / ONE_MIN_MS as f64
}

/// Convert fleet minutes to simulation milliseconds.
pub fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * ONE_MIN_MS as f64).round().max(0.0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    SimulationStarted,
    /// A customer issues their request.
    RequestIssued,
    /// The fleet manager wakes up to look for new requests.
    ManagerPoll,
    /// Delivery of a position poll to one vehicle.
    PositionQuery,
    /// Delivery of one vehicle's position reply to the manager.
    PositionReply,
    /// The position-collection wait expired.
    PositionTimeout,
    /// The manager schedules the new-request batch and broadcasts plans.
    DispatchUpdate,
    /// Delivery of an updated plan to one vehicle.
    ItineraryUpdate,
    /// A waiting vehicle re-evaluates its departure.
    DepartStop,
    /// A vehicle picks its next stop and starts moving.
    SelectDest,
    /// A moving vehicle advances one waypoint.
    MoveStep,
    /// A vehicle reached the stop it was driving to.
    ArrivedAtStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Vehicle(Entity),
    Customer(Entity),
}

/// Simulation event. `timestamp` is in **milliseconds** (simulation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by timestamp; same timestamp ordered by kind for determinism.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

/// Simulation clock: time in **milliseconds**, advances to the next scheduled
/// event.
#[derive(Debug, Clone, Default, Resource)]
pub struct SimulationClock {
    /// Current simulation time in ms (updated when an event is popped).
    now: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    /// Current simulation time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current simulation time in fleet minutes.
    pub fn now_minutes(&self) -> f64 {
        ms_to_minutes(self.now)
    }

    /// Schedule an event at a specific simulation timestamp (ms).
    pub fn schedule_at(&mut self, at_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule(Event {
            timestamp: at_ms,
            kind,
            subject,
        });
    }

    /// Schedule an event at a fleet time in **minutes**.
    pub fn schedule_at_minutes(
        &mut self,
        at_minutes: f64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) {
        // Never schedule into the past; a stale minute target fires now.
        let at_ms = minutes_to_ms(at_minutes).max(self.now);
        self.schedule_at(at_ms, kind, subject);
    }

    /// Schedule an event at `now + delta_ms` (relative, in ms).
    pub fn schedule_in(&mut self, delta_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now.saturating_add(delta_ms), kind, subject);
    }

    /// Schedule an event in **delta_secs** seconds from now.
    pub fn schedule_in_secs(
        &mut self,
        delta_secs: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) {
        self.schedule_in(delta_secs.saturating_mul(ONE_SEC_MS), kind, subject);
    }

    /// Schedule a full event (timestamp must be in ms, >= now).
    pub fn schedule(&mut self, event: Event) {
        debug_assert!(
            event.timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        self.events.push(event);
    }

    /// Pop the next event (earliest timestamp; same-ms order by kind).
    /// Advances `now` to that timestamp.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    /// Timestamp of the next scheduled event without popping it.
    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events still in the queue (for tests and scenario checks).
    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }
}
