//! Agent message vocabulary for manager <-> vehicle traffic.
//!
//! Messages are a closed sum type delivered through per-agent mailboxes;
//! delivery is signalled by a clock event targeting the receiver. Per
//! manager/vehicle pair, mailbox push order plus the event heap give a total
//! order.

use std::collections::VecDeque;

use bevy_ecs::prelude::{Component, Resource};

use crate::itinerary::PlanStop;

/// One message between the fleet manager and a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Manager -> vehicle: report your current position.
    PositionQuery,
    /// Vehicle -> manager: current position, `[lon, lat]` on the wire.
    PositionReply {
        vehicle_id: String,
        current_pos: [f64; 2],
    },
    /// Manager -> vehicle: replace your plan with this stop list.
    NewItinerary { stops: Vec<PlanStop> },
}

/// Inbound queue of one vehicle agent.
#[derive(Debug, Default, Component)]
pub struct Mailbox {
    messages: VecDeque<AgentMessage>,
}

impl Mailbox {
    pub fn push(&mut self, message: AgentMessage) {
        self.messages.push_back(message);
    }

    pub fn pop(&mut self) -> Option<AgentMessage> {
        self.messages.pop_front()
    }

    /// Remove and return the first queued message matching `pred`.
    pub fn pop_where(&mut self, pred: impl Fn(&AgentMessage) -> bool) -> Option<AgentMessage> {
        let index = self.messages.iter().position(pred)?;
        self.messages.remove(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Inbound queue of the fleet manager.
#[derive(Debug, Default, Resource)]
pub struct ManagerInbox {
    messages: VecDeque<AgentMessage>,
}

impl ManagerInbox {
    pub fn push(&mut self, message: AgentMessage) {
        self.messages.push_back(message);
    }

    pub fn pop(&mut self) -> Option<AgentMessage> {
        self.messages.pop_front()
    }

    /// Remove and return the first queued message matching `pred`.
    pub fn pop_where(&mut self, pred: impl Fn(&AgentMessage) -> bool) -> Option<AgentMessage> {
        let index = self.messages.iter().position(pred)?;
        self.messages.remove(index)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
