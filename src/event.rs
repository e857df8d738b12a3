//! Event system for the simulation kernel.
//!
//! Every protocol step in PuddleSim is an `Event` on the scheduler's
//! priority queue. Events are immutable records dispatched in
//! `(scheduled_at, id)` order.

use crate::entity::EntityId;
use crate::runtime::Message;
use crate::time::VirtualTime;
use std::cmp::Ordering;

// ── Event ID ──────────────────────────────────────────────────────────

/// A strictly increasing event identifier.
///
/// Two events scheduled at the same `VirtualTime` are ordered by their
/// `EventId`, which is their creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Monotonic event-ID generator. Each `Scheduler` owns one.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Event Type ────────────────────────────────────────────────────────

/// The payload of an event.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum EventType {
    /// A no-op event, used for heartbeats and tests.
    Noop,

    /// A protocol message addressed to a single entity.
    Deliver {
        from: EntityId,
        to: EntityId,
        message: Message,
    },
}

impl EventType {
    /// Numbered stand-in payload for kernel tests.
    #[cfg(test)]
    pub(crate) fn marker(n: u64) -> Self {
        EventType::Deliver {
            from: EntityId::new(0),
            to: EntityId::new(n),
            message: Message::UpdateLocation,
        }
    }

    /// Number carried by a [`marker`](Self::marker) payload.
    #[cfg(test)]
    pub(crate) fn marker_number(&self) -> Option<u64> {
        match self {
            EventType::Deliver { to, .. } => Some(to.raw()),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Noop => write!(f, "Noop"),
            EventType::Deliver { from, to, message } => {
                write!(f, "Deliver({} → {}, {})", from, to, message)
            }
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single simulation event, ordered by `(scheduled_at, id)`.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,

    /// The virtual time at which this event should be dispatched.
    pub scheduled_at: VirtualTime,

    /// The event payload.
    pub payload: EventType,
}

impl Event {
    /// Convenience constructor.
    pub fn new(id: EventId, scheduled_at: VirtualTime, payload: EventType) -> Self {
        Event {
            id,
            scheduled_at,
            payload,
        }
    }
}

impl Eq for Event {}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
