//! Deterministic event scheduler.
//!
//! A `BinaryHeap` with reversed `Ord` on `Event` acts as a min-heap keyed
//! by `(scheduled_at, event_id)`. Equal timestamps are delivered in
//! creation order.

use std::collections::BinaryHeap;

use crate::event::{Event, EventId, EventIdGen, EventType};
use crate::time::VirtualTime;

/// Owns the event queue and the ID generator.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    id_gen: EventIdGen,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Schedule a new event at the given virtual time.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, payload));
        id
    }

    /// Pop the next event (earliest time, lowest ID).
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    /// Peek at the next event without removing it.
    pub fn peek_next(&self) -> Option<&Event> {
        self.queue.peek()
    }

    /// Returns `true` if the event queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all events in delivery order.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(10), EventType::marker(1));
        sched.schedule(VirtualTime::new(10), EventType::marker(2));
        sched.schedule(VirtualTime::new(10), EventType::marker(3));

        let order: Vec<u64> = sched
            .drain_ordered()
            .iter()
            .filter_map(|e| e.payload.marker_number())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(30), EventType::Noop);
        sched.schedule(VirtualTime::new(10), EventType::Noop);
        sched.schedule(VirtualTime::new(20), EventType::Noop);

        assert_eq!(sched.peek_next().map(|e| e.scheduled_at), Some(VirtualTime::new(10)));
        let times: Vec<u64> = sched
            .drain_ordered()
            .iter()
            .map(|e| e.scheduled_at.ticks())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_mixed_ordering() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(50), EventType::Noop);
        sched.schedule(VirtualTime::new(10), EventType::Noop);
        sched.schedule(VirtualTime::new(10), EventType::Noop);
        sched.schedule(VirtualTime::new(30), EventType::Noop);
        sched.schedule(VirtualTime::new(10), EventType::Noop);

        let events = sched.drain_ordered();
        for window in events.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            assert!(
                (a.scheduled_at, a.id) <= (b.scheduled_at, b.id),
                "Events out of order: {:?} vs {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_empty_scheduler() {
        let mut sched = Scheduler::new();
        assert!(sched.is_empty());
        assert_eq!(sched.len(), 0);
        assert!(sched.pop_next().is_none());
        assert_eq!(sched.next_event_id().raw(), 0);
    }
}
