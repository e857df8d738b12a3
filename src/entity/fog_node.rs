//! `FogNode`: a mobile compute device that belongs to at most one puddle.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::mobility::Mobility;

use super::id::EntityId;

/// Resource snapshot a node reports to its puddle head on join.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCharacteristics {
    /// Processing capacity in MIPS.
    pub mips: u64,
    /// Memory in MB.
    pub ram: u64,
    /// Uplink bandwidth.
    pub uplink_bw: u64,
    /// Downlink bandwidth.
    pub downlink_bw: u64,
}

/// Where a node stands in the membership protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClusterState {
    /// Not yet placed in any puddle.
    #[default]
    Unassigned,
    /// Member of the puddle run by this head.
    Owned(EntityId),
    /// Left the network for good.
    Departed,
}

/// A membership change the broker has started but not yet seen finish.
///
/// While one is set the broker ignores further movement reports from the
/// node, so a node is never mid-way through two transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingTransition {
    /// A join request is on its way to `to`.
    Joining { to: EntityId },
    /// `to` will take the node over and then release it from `from`.
    Relocating { from: EntityId, to: EntityId },
    /// The node was expelled; `from` has not processed the leave yet.
    Departing { from: Option<EntityId> },
}

/// A mobile fog device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FogNode {
    id: EntityId,
    name: String,
    level: u32,
    mobility: Mobility,
    characteristics: DeviceCharacteristics,
    state: ClusterState,
    buddies: BTreeSet<EntityId>,
    links: BTreeSet<EntityId>,
    pending: Option<PendingTransition>,
}

impl FogNode {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        level: u32,
        mobility: Mobility,
        characteristics: DeviceCharacteristics,
    ) -> Self {
        FogNode {
            id,
            name: name.into(),
            level,
            mobility,
            characteristics,
            state: ClusterState::Unassigned,
            buddies: BTreeSet::new(),
            links: BTreeSet::new(),
            pending: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hierarchy level of the puddles this node may join.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn mobility(&self) -> &Mobility {
        &self.mobility
    }

    pub fn mobility_mut(&mut self) -> &mut Mobility {
        &mut self.mobility
    }

    pub fn position(&self) -> Point {
        self.mobility.position()
    }

    pub fn characteristics(&self) -> &DeviceCharacteristics {
        &self.characteristics
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    /// The owning puddle head, if the node is currently a member.
    pub fn owner(&self) -> Option<EntityId> {
        match self.state {
            ClusterState::Owned(head) => Some(head),
            _ => None,
        }
    }

    pub fn is_departed(&self) -> bool {
        self.state == ClusterState::Departed
    }

    pub(crate) fn set_owner(&mut self, head: EntityId) {
        if !self.is_departed() {
            self.state = ClusterState::Owned(head);
        }
    }

    /// Drop ownership without leaving the network.
    pub(crate) fn release(&mut self, head: EntityId) -> bool {
        if self.state == ClusterState::Owned(head) {
            self.state = ClusterState::Unassigned;
            return true;
        }
        false
    }

    /// Mark the node departed. Returns the owner it had, if any.
    pub(crate) fn depart(&mut self) -> Option<EntityId> {
        let previous = self.owner();
        self.state = ClusterState::Departed;
        previous
    }

    pub fn buddies(&self) -> &BTreeSet<EntityId> {
        &self.buddies
    }

    pub fn has_buddy(&self, id: EntityId) -> bool {
        self.buddies.contains(&id)
    }

    pub(crate) fn add_buddy(&mut self, id: EntityId) -> bool {
        id != self.id && self.buddies.insert(id)
    }

    pub(crate) fn remove_buddy(&mut self, id: EntityId) -> bool {
        self.buddies.remove(&id)
    }

    pub(crate) fn take_buddies(&mut self) -> BTreeSet<EntityId> {
        std::mem::take(&mut self.buddies)
    }

    pub fn links(&self) -> &BTreeSet<EntityId> {
        &self.links
    }

    pub(crate) fn attach_link(&mut self, link: EntityId) {
        self.links.insert(link);
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub(crate) fn begin(&mut self, transition: PendingTransition) {
        self.pending = Some(transition);
    }

    pub(crate) fn settle(&mut self) {
        self.pending = None;
    }
}
