//! TraceEntry: one record per delivered protocol message.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::event::EventId;
use crate::time::VirtualTime;

use super::message::Message;

/// A single delivered message, appended by `PuddleRuntime` on dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub time: VirtualTime,
    pub event_id: EventId,
    pub from: EntityId,
    pub to: EntityId,
    pub message: Message,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[T={} E=#{}] {} -> {} {}",
            self.time.ticks(),
            self.event_id.raw(),
            self.from,
            self.to,
            self.message,
        )
    }
}
