//! `Link`: a bidirectional channel between two entities.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Which way traffic flows over a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkDirection {
    /// From the first endpoint to the second.
    Forward,
    /// From the second endpoint to the first.
    Reverse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    id: EntityId,
    endpoints: (EntityId, EntityId),
    base_latency: f64,
    latency: f64,
    bandwidth: f64,
    forward_queue: VecDeque<u64>,
    reverse_queue: VecDeque<u64>,
}

impl Link {
    pub fn new(id: EntityId, a: EntityId, b: EntityId, latency: f64, bandwidth: f64) -> Self {
        Link {
            id,
            endpoints: (a, b),
            base_latency: latency,
            latency,
            bandwidth,
            forward_queue: VecDeque::new(),
            reverse_queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn endpoints(&self) -> (EntityId, EntityId) {
        self.endpoints
    }

    pub fn connects(&self, a: EntityId, b: EntityId) -> bool {
        self.endpoints == (a, b) || self.endpoints == (b, a)
    }

    /// The endpoint opposite `from`, if `from` is one of the two.
    pub fn other_end(&self, from: EntityId) -> Option<EntityId> {
        match self.direction_from(from)? {
            LinkDirection::Forward => Some(self.endpoints.1),
            LinkDirection::Reverse => Some(self.endpoints.0),
        }
    }

    pub fn direction_from(&self, from: EntityId) -> Option<LinkDirection> {
        if from == self.endpoints.0 {
            Some(LinkDirection::Forward)
        } else if from == self.endpoints.1 {
            Some(LinkDirection::Reverse)
        } else {
            None
        }
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn base_latency(&self) -> f64 {
        self.base_latency
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Propagation delay over the current endpoint distance, on top of the
    /// configured base latency.
    pub fn recompute_latency(&mut self, distance: f64, propagation_speed: f64) -> f64 {
        self.latency = if propagation_speed > 0.0 {
            self.base_latency + distance / propagation_speed
        } else {
            self.base_latency
        };
        self.latency
    }

    // ── Queues ────────────────────────────────────────────────

    fn queue_mut(&mut self, direction: LinkDirection) -> &mut VecDeque<u64> {
        match direction {
            LinkDirection::Forward => &mut self.forward_queue,
            LinkDirection::Reverse => &mut self.reverse_queue,
        }
    }

    fn queue(&self, direction: LinkDirection) -> &VecDeque<u64> {
        match direction {
            LinkDirection::Forward => &self.forward_queue,
            LinkDirection::Reverse => &self.reverse_queue,
        }
    }

    /// Queue a message of `bytes` sent by endpoint `from`.
    /// Returns `false` if `from` is not an endpoint.
    pub fn enqueue(&mut self, from: EntityId, bytes: u64) -> bool {
        match self.direction_from(from) {
            Some(direction) => {
                self.queue_mut(direction).push_back(bytes);
                true
            }
            None => false,
        }
    }

    pub fn dequeue(&mut self, from: EntityId) -> Option<u64> {
        let direction = self.direction_from(from)?;
        self.queue_mut(direction).pop_front()
    }

    /// Hand the oldest queued message in each direction to its receiver.
    /// Returns how many were released.
    pub fn release_oldest(&mut self) -> usize {
        let (a, b) = self.endpoints;
        usize::from(self.dequeue(a).is_some()) + usize::from(self.dequeue(b).is_some())
    }

    pub fn queued_bytes(&self, from: EntityId) -> u64 {
        self.direction_from(from)
            .map(|d| self.queue(d).iter().sum())
            .unwrap_or(0)
    }

    /// Delay a new message of `bytes` from `from` would see behind the
    /// messages already queued in that direction.
    pub fn estimated_delay(&self, from: EntityId, bytes: u64) -> f64 {
        let backlog = (self.queued_bytes(from) + bytes) as f64;
        if self.bandwidth > 0.0 {
            self.latency + backlog / self.bandwidth
        } else {
            self.latency
        }
    }
}
