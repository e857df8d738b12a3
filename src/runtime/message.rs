//! Protocol messages and the context helpers that send them.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::PuddleResult;
use crate::event::{EventId, EventType};
use crate::simulation::SimulationContext;

/// Every message exchanged by nodes, puddle heads, links and the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Movement timer of a fog node (sent to itself).
    UpdateLocation,
    /// A node asks the broker to re-check its membership.
    ProcessNodeMove { node: EntityId },
    /// Make `node` a member of the receiving puddle head.
    NodeJoinPuddleHead { node: EntityId },
    /// Remove `node` from the receiving puddle head.
    NodeLeavePuddleHead { node: EntityId },
    /// The receiving puddle head takes `node` over from its current owner.
    NodeRelocatePuddle { node: EntityId },
    /// The receiving node leaves the network for good.
    NodeLeave,
    /// The receiving link recomputes its latency from endpoint positions.
    UpdateLatency,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::UpdateLocation => write!(f, "UPDATE_LOCATION"),
            Message::ProcessNodeMove { node } => write!(f, "PROCESS_NODE_MOVE({})", node),
            Message::NodeJoinPuddleHead { node } => write!(f, "NODE_JOIN_PUDDLEHEAD({})", node),
            Message::NodeLeavePuddleHead { node } => write!(f, "NODE_LEAVE_PUDDLEHEAD({})", node),
            Message::NodeRelocatePuddle { node } => write!(f, "NODE_RELOCATE_PUDDLE({})", node),
            Message::NodeLeave => write!(f, "NODE_LEAVE"),
            Message::UpdateLatency => write!(f, "UPDATE_LATENCY"),
        }
    }
}

// ── SimulationContext extensions ──────────────────────────────────────

impl SimulationContext<'_> {
    /// Deliver `message` from `from` to `to` after `delay` ticks.
    pub fn send(
        &mut self,
        from: EntityId,
        to: EntityId,
        delay: u64,
        message: Message,
    ) -> PuddleResult<EventId> {
        self.schedule_after(delay, EventType::Deliver { from, to, message })
    }

    /// Re-arm an entity's own timer message.
    pub fn send_self(&mut self, id: EntityId, delay: u64, message: Message) -> PuddleResult<EventId> {
        self.send(id, id, delay, message)
    }
}
