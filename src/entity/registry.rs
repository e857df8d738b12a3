//! `Registry`: owns every entity and resolves ids to typed references.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PuddleError, PuddleResult};
use crate::geometry::Point;

use super::broker::GlobalBroker;
use super::fog_node::FogNode;
use super::id::EntityId;
use super::link::Link;
use super::puddle_head::PuddleHead;

/// Discriminant of an [`Entity`], used in lookups and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    FogNode,
    PuddleHead,
    Link,
    Broker,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::FogNode => "fog node",
            EntityKind::PuddleHead => "puddle head",
            EntityKind::Link => "link",
            EntityKind::Broker => "broker",
        };
        f.write_str(name)
    }
}

/// Every kind of entity the simulator hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    FogNode(FogNode),
    PuddleHead(PuddleHead),
    Link(Link),
    Broker(GlobalBroker),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::FogNode(_) => EntityKind::FogNode,
            Entity::PuddleHead(_) => EntityKind::PuddleHead,
            Entity::Link(_) => EntityKind::Link,
            Entity::Broker(_) => EntityKind::Broker,
        }
    }

    /// Where the entity physically sits, for link latency. Links and the
    /// broker have no position.
    pub fn position(&self) -> Option<Point> {
        match self {
            Entity::FogNode(n) => Some(n.position()),
            Entity::PuddleHead(h) => Some(h.anchor()),
            Entity::Link(_) | Entity::Broker(_) => None,
        }
    }
}

macro_rules! typed_lookup {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, id: EntityId) -> PuddleResult<&$ty> {
            match self.get(id)? {
                Entity::$variant(e) => Ok(e),
                other => Err(PuddleError::EntityKindMismatch {
                    id,
                    expected: EntityKind::$variant,
                    found: other.kind(),
                }),
            }
        }

        pub fn $get_mut(&mut self, id: EntityId) -> PuddleResult<&mut $ty> {
            match self.get_mut(id)? {
                Entity::$variant(e) => Ok(e),
                other => Err(PuddleError::EntityKindMismatch {
                    id,
                    expected: EntityKind::$variant,
                    found: other.kind(),
                }),
            }
        }
    };
}

/// Id → entity index with sequential id allocation.
///
/// Id 0 is never handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserve a fresh id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Store an entity under an id obtained from [`Registry::allocate`].
    pub fn insert(&mut self, id: EntityId, entity: Entity) -> PuddleResult<()> {
        if self.entities.contains_key(&id) {
            return Err(PuddleError::DuplicateEntity(id));
        }
        self.entities.insert(id, entity);
        Ok(())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> PuddleResult<&Entity> {
        self.entities.get(&id).ok_or(PuddleError::UnknownEntity(id))
    }

    pub fn get_mut(&mut self, id: EntityId) -> PuddleResult<&mut Entity> {
        self.entities.get_mut(&id).ok_or(PuddleError::UnknownEntity(id))
    }

    pub fn kind(&self, id: EntityId) -> PuddleResult<EntityKind> {
        Ok(self.get(id)?.kind())
    }

    typed_lookup!(fog_node, fog_node_mut, FogNode, FogNode);
    typed_lookup!(puddle_head, puddle_head_mut, PuddleHead, PuddleHead);
    typed_lookup!(link, link_mut, Link, Link);
    typed_lookup!(broker, broker_mut, Broker, GlobalBroker);

    pub fn fog_nodes(&self) -> impl Iterator<Item = &FogNode> {
        self.entities.values().filter_map(|e| match e {
            Entity::FogNode(n) => Some(n),
            _ => None,
        })
    }

    pub fn puddle_heads(&self) -> impl Iterator<Item = &PuddleHead> {
        self.entities.values().filter_map(|e| match e {
            Entity::PuddleHead(h) => Some(h),
            _ => None,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.entities.values().filter_map(|e| match e {
            Entity::Link(l) => Some(l),
            _ => None,
        })
    }

    // ── Coordinator tree ──────────────────────────────────────

    /// Attach `child` under `parent` in the coordinator tree.
    ///
    /// The child must sit exactly one level below the parent and have no
    /// parent yet. It becomes a buddy of every existing sibling and the
    /// parent records a snapshot of its members.
    pub fn adopt_child(&mut self, parent: EntityId, child: EntityId) -> PuddleResult<()> {
        let hierarchy_error = |reason: &str| PuddleError::InvalidHierarchy {
            parent,
            child,
            reason: reason.to_string(),
        };
        if parent == child {
            return Err(hierarchy_error("a puddle head cannot parent itself"));
        }
        let parent_level = self.puddle_head(parent)?.level();
        let (child_level, child_parent, members) = {
            let c = self.puddle_head(child)?;
            (c.level(), c.parent(), c.members().to_vec())
        };
        if child_parent.is_some() {
            return Err(hierarchy_error("child already has a parent"));
        }
        if child_level != parent_level + 1 {
            return Err(hierarchy_error("child must be exactly one level below its parent"));
        }

        let siblings = self.puddle_head(parent)?.children().to_vec();
        for sibling in siblings {
            self.puddle_head_mut(sibling)?.add_buddy(child);
            self.puddle_head_mut(child)?.add_buddy(sibling);
        }
        self.puddle_head_mut(parent)?.add_child(child, members);
        self.puddle_head_mut(child)?.set_parent(parent);
        Ok(())
    }

    /// Re-snapshot `head`'s member list into its parent's child-puddle map.
    pub(crate) fn refresh_parent_snapshot(&mut self, head: EntityId) -> PuddleResult<()> {
        let (parent, members) = {
            let h = self.puddle_head(head)?;
            (h.parent(), h.members().to_vec())
        };
        if let Some(parent) = parent {
            self.puddle_head_mut(parent)?.refresh_child_puddle(head, members);
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
