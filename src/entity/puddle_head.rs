//! `PuddleHead`: the coordinator of one puddle.
//!
//! A puddle head owns a fixed coverage polygon at one hierarchy level. It
//! keeps the member registry for its puddle, a symmetric buddy list of
//! sibling heads, a link to its parent and a snapshot of each child
//! puddle's membership.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Polygon};

use super::fog_node::DeviceCharacteristics;
use super::id::EntityId;

/// Identifier of an application module placed on a member node.
pub type ModuleId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuddleHead {
    id: EntityId,
    name: String,
    level: u32,
    coverage: Polygon,
    anchor: Point,
    members: Vec<EntityId>,
    member_characteristics: BTreeMap<EntityId, DeviceCharacteristics>,
    buddies: BTreeSet<EntityId>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    child_puddles: BTreeMap<EntityId, Vec<EntityId>>,
    running_services: BTreeMap<EntityId, Vec<ModuleId>>,
    links: BTreeSet<EntityId>,
}

impl PuddleHead {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        level: u32,
        coverage: Polygon,
        anchor: Point,
    ) -> Self {
        PuddleHead {
            id,
            name: name.into(),
            level,
            coverage,
            anchor,
            members: Vec::new(),
            member_characteristics: BTreeMap::new(),
            buddies: BTreeSet::new(),
            parent: None,
            children: Vec::new(),
            child_puddles: BTreeMap::new(),
            running_services: BTreeMap::new(),
            links: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn coverage(&self) -> &Polygon {
        &self.coverage
    }

    /// Physical location of the head itself, used for link latency.
    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn covers(&self, p: &Point) -> bool {
        self.coverage.contains(p)
    }

    // ── Members ───────────────────────────────────────────────

    /// Members in join order.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn is_member(&self, node: EntityId) -> bool {
        self.members.contains(&node)
    }

    pub fn member_characteristics(&self, node: EntityId) -> Option<&DeviceCharacteristics> {
        self.member_characteristics.get(&node)
    }

    pub(crate) fn add_member(&mut self, node: EntityId, characteristics: DeviceCharacteristics) -> bool {
        if self.is_member(node) {
            return false;
        }
        self.members.push(node);
        self.member_characteristics.insert(node, characteristics);
        true
    }

    pub(crate) fn remove_member(&mut self, node: EntityId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != node);
        self.member_characteristics.remove(&node);
        before != self.members.len()
    }

    // ── Sibling buddies ───────────────────────────────────────

    pub fn buddies(&self) -> &BTreeSet<EntityId> {
        &self.buddies
    }

    pub(crate) fn add_buddy(&mut self, head: EntityId) -> bool {
        head != self.id && self.buddies.insert(head)
    }

    // ── Tree ──────────────────────────────────────────────────

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn set_parent(&mut self, parent: EntityId) {
        self.parent = Some(parent);
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: EntityId, members: Vec<EntityId>) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
        self.child_puddles.insert(child, members);
    }

    /// Last known membership of each child puddle.
    pub fn child_puddles(&self) -> &BTreeMap<EntityId, Vec<EntityId>> {
        &self.child_puddles
    }

    pub fn child_puddle(&self, child: EntityId) -> Option<&[EntityId]> {
        self.child_puddles.get(&child).map(Vec::as_slice)
    }

    pub(crate) fn refresh_child_puddle(&mut self, child: EntityId, members: Vec<EntityId>) {
        if let Some(entry) = self.child_puddles.get_mut(&child) {
            *entry = members;
        }
    }

    // ── Services ──────────────────────────────────────────────

    pub fn running_services(&self, node: EntityId) -> &[ModuleId] {
        self.running_services.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record a module placed on one of this puddle's members.
    pub fn place_service(&mut self, node: EntityId, module: impl Into<ModuleId>) {
        self.running_services.entry(node).or_default().push(module.into());
    }

    pub(crate) fn teardown_services(&mut self, node: EntityId) -> Vec<ModuleId> {
        self.running_services.remove(&node).unwrap_or_default()
    }

    // ── Links ─────────────────────────────────────────────────

    pub fn links(&self) -> &BTreeSet<EntityId> {
        &self.links
    }

    pub(crate) fn attach_link(&mut self, link: EntityId) {
        self.links.insert(link);
    }
}
