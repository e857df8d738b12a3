//! `GlobalBroker`: the root coordinator that decides where a moved node
//! belongs.
//!
//! The broker keeps only indices (heads per level, active nodes, links).
//! Membership itself lives in the nodes and their puddle heads; the broker
//! reads it through the registry when it makes a decision.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::PuddleResult;
use crate::geometry::Point;

use super::fog_node::ClusterState;
use super::id::EntityId;
use super::registry::Registry;

/// Outcome of re-evaluating a node after it moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Still inside its current puddle.
    Stay,
    /// Unassigned node that now has a covering puddle.
    Join { to: EntityId },
    /// Left `from`'s coverage and entered `to`'s.
    Relocate { from: EntityId, to: EntityId },
    /// No puddle at the node's level covers it.
    Depart { from: Option<EntityId> },
    /// Nothing to decide: the node is gone, mid-transition, or its
    /// recorded owner no longer resolves.
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalBroker {
    id: EntityId,
    puddle_heads: Vec<EntityId>,
    heads_by_level: BTreeMap<u32, Vec<EntityId>>,
    fog_nodes: BTreeSet<EntityId>,
    links: Vec<EntityId>,
}

impl GlobalBroker {
    pub fn new(id: EntityId) -> Self {
        GlobalBroker {
            id,
            puddle_heads: Vec::new(),
            heads_by_level: BTreeMap::new(),
            fog_nodes: BTreeSet::new(),
            links: Vec::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn register_puddle_head(&mut self, head: EntityId, level: u32) {
        self.puddle_heads.push(head);
        self.heads_by_level.entry(level).or_default().push(head);
    }

    pub(crate) fn register_fog_node(&mut self, node: EntityId) {
        self.fog_nodes.insert(node);
    }

    pub(crate) fn register_link(&mut self, link: EntityId) {
        self.links.push(link);
    }

    /// Remove a departed node from the active index. Its id stays resolvable
    /// through the registry.
    pub(crate) fn forget_fog_node(&mut self, node: EntityId) -> bool {
        self.fog_nodes.remove(&node)
    }

    pub fn puddle_heads(&self) -> &[EntityId] {
        &self.puddle_heads
    }

    /// Heads at `level` in registration order.
    pub fn heads_at_level(&self, level: u32) -> &[EntityId] {
        self.heads_by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_fog_nodes(&self) -> &BTreeSet<EntityId> {
        &self.fog_nodes
    }

    pub fn is_active(&self, node: EntityId) -> bool {
        self.fog_nodes.contains(&node)
    }

    pub fn links(&self) -> &[EntityId] {
        &self.links
    }

    /// First head at `level`, in index order, whose coverage contains `position`.
    pub fn find_puddle_head(
        &self,
        registry: &Registry,
        level: u32,
        position: &Point,
    ) -> PuddleResult<Option<EntityId>> {
        for &head in self.heads_at_level(level) {
            if registry.puddle_head(head)?.covers(position) {
                return Ok(Some(head));
            }
        }
        Ok(None)
    }

    /// Decide what should happen to `node` at its current position.
    pub fn evaluate(&self, registry: &Registry, node: EntityId) -> PuddleResult<Placement> {
        let fog = registry.fog_node(node)?;
        if fog.pending().is_some() {
            return Ok(Placement::Ignore);
        }
        let position = fog.position();
        let current = match fog.state() {
            ClusterState::Departed => return Ok(Placement::Ignore),
            ClusterState::Unassigned => None,
            ClusterState::Owned(head) => match registry.puddle_head(head) {
                Ok(owner) if owner.covers(&position) => return Ok(Placement::Stay),
                Ok(_) => Some(head),
                Err(_) => return Ok(Placement::Ignore),
            },
        };

        let found = self.find_puddle_head(registry, fog.level(), &position)?;
        Ok(match (current, found) {
            (None, Some(to)) => Placement::Join { to },
            (Some(from), Some(to)) => Placement::Relocate { from, to },
            (from, None) => Placement::Depart { from },
        })
    }
}
