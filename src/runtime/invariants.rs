//! Executable membership invariants.
//!
//! Each check walks the registry and reports the first violation it
//! finds. A node that is mid-way through a relocation is allowed to be
//! listed by both its old and new puddle head; with a zero hand-off delay
//! that overlap never survives past the instant it started in.

use std::collections::BTreeMap;

use crate::entity::{ClusterState, EntityId, PendingTransition, Registry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{a} lists {b} as a buddy but not the other way round")]
    AsymmetricBuddies { a: EntityId, b: EntityId },

    #[error("node {node} is listed by both {first} and {second}")]
    MultipleOwners {
        node: EntityId,
        first: EntityId,
        second: EntityId,
    },

    #[error("{head} lists {node}, which does not belong to it")]
    OwnerMismatch { head: EntityId, node: EntityId },

    #[error("node {node} is owned by {head} but missing from its member list")]
    MissingMember { node: EntityId, head: EntityId },

    #[error("{parent} holds a stale snapshot of child puddle {child}")]
    StaleChildSnapshot { parent: EntityId, child: EntityId },

    #[error("{node} still lists departed node {departed} as a buddy")]
    DepartedBuddy { node: EntityId, departed: EntityId },
}

/// Run every check.
pub fn check_all(reg: &Registry) -> Result<(), InvariantViolation> {
    check_buddy_symmetry(reg)?;
    check_departed_isolated(reg)?;
    check_single_ownership(reg)?;
    check_owner_consistency(reg)?;
    check_child_snapshots(reg)
}

/// `b ∈ buddies(a)` iff `a ∈ buddies(b)`, for fog nodes and puddle heads alike.
pub fn check_buddy_symmetry(reg: &Registry) -> Result<(), InvariantViolation> {
    for node in reg.fog_nodes() {
        for &buddy in node.buddies() {
            let mirrored = reg
                .fog_node(buddy)
                .map(|b| b.has_buddy(node.id()))
                .unwrap_or(false);
            if !mirrored {
                return Err(InvariantViolation::AsymmetricBuddies { a: node.id(), b: buddy });
            }
        }
    }
    for head in reg.puddle_heads() {
        for &buddy in head.buddies() {
            let mirrored = reg
                .puddle_head(buddy)
                .map(|b| b.buddies().contains(&head.id()))
                .unwrap_or(false);
            if !mirrored {
                return Err(InvariantViolation::AsymmetricBuddies { a: head.id(), b: buddy });
            }
        }
    }
    Ok(())
}

/// Departed nodes have no buddies and nobody lists them as one.
pub fn check_departed_isolated(reg: &Registry) -> Result<(), InvariantViolation> {
    for node in reg.fog_nodes() {
        for &buddy in node.buddies() {
            let departed = reg.fog_node(buddy).map(|b| b.is_departed()).unwrap_or(false);
            if node.is_departed() || departed {
                let (node, departed) = if departed { (node.id(), buddy) } else { (buddy, node.id()) };
                return Err(InvariantViolation::DepartedBuddy { node, departed });
            }
        }
    }
    Ok(())
}

/// No node appears in two member lists, outside an in-flight relocation
/// between exactly those two heads.
pub fn check_single_ownership(reg: &Registry) -> Result<(), InvariantViolation> {
    let mut listed_by: BTreeMap<EntityId, EntityId> = BTreeMap::new();
    for head in reg.puddle_heads() {
        for &node in head.members() {
            let Some(&first) = listed_by.get(&node) else {
                listed_by.insert(node, head.id());
                continue;
            };
            let relocating = matches!(
                reg.fog_node(node).ok().and_then(|n| n.pending()),
                Some(PendingTransition::Relocating { from, to })
                    if (from == first && to == head.id()) || (from == head.id() && to == first)
            );
            if !relocating {
                return Err(InvariantViolation::MultipleOwners {
                    node,
                    first,
                    second: head.id(),
                });
            }
        }
    }
    Ok(())
}

/// A head's members point back at it, and an owned node is in its owner's list.
pub fn check_owner_consistency(reg: &Registry) -> Result<(), InvariantViolation> {
    for head in reg.puddle_heads() {
        for &member in head.members() {
            let Ok(node) = reg.fog_node(member) else {
                return Err(InvariantViolation::OwnerMismatch { head: head.id(), node: member });
            };
            let consistent = match (node.state(), node.pending()) {
                (ClusterState::Owned(owner), _) if owner == head.id() => true,
                (_, Some(PendingTransition::Relocating { from, .. })) => from == head.id(),
                (_, Some(PendingTransition::Departing { from })) => from == Some(head.id()),
                _ => false,
            };
            if !consistent {
                return Err(InvariantViolation::OwnerMismatch { head: head.id(), node: member });
            }
        }
    }
    for node in reg.fog_nodes() {
        if let ClusterState::Owned(head) = node.state() {
            let listed = reg
                .puddle_head(head)
                .map(|h| h.is_member(node.id()))
                .unwrap_or(false);
            if !listed {
                return Err(InvariantViolation::MissingMember { node: node.id(), head });
            }
        }
    }
    Ok(())
}

/// Each parent's child-puddle map equals the child's actual member list.
pub fn check_child_snapshots(reg: &Registry) -> Result<(), InvariantViolation> {
    for head in reg.puddle_heads() {
        let Some(parent_id) = head.parent() else { continue };
        let current = reg
            .puddle_head(parent_id)
            .ok()
            .and_then(|p| p.child_puddle(head.id()))
            .map(|snapshot| snapshot == head.members())
            .unwrap_or(false);
        if !current {
            return Err(InvariantViolation::StaleChildSnapshot {
                parent: parent_id,
                child: head.id(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DeviceCharacteristics, Entity, FogNode, PuddleHead};
    use crate::geometry::{Point, Polygon, Rectangle};
    use crate::mobility::Mobility;

    fn head(reg: &mut Registry, level: u32) -> EntityId {
        let id = reg.allocate();
        let coverage = Polygon::rectangle(0.0, 0.0, 6.0, 10.0).unwrap();
        let h = PuddleHead::new(id, format!("h{}", id.raw()), level, coverage, Point::new(3.0, 5.0));
        reg.insert(id, Entity::PuddleHead(h)).unwrap();
        id
    }

    fn node(reg: &mut Registry) -> EntityId {
        let id = reg.allocate();
        let mobility = Mobility::stationary(Point::new(1.0, 1.0), Rectangle::new(0.0, 0.0, 6.0, 10.0));
        let n = FogNode::new(id, format!("n{}", id.raw()), 1, mobility, DeviceCharacteristics::default());
        reg.insert(id, Entity::FogNode(n)).unwrap();
        id
    }

    /// Owner and member list agree.
    fn enlist(reg: &mut Registry, h: EntityId, n: EntityId) {
        reg.fog_node_mut(n).unwrap().set_owner(h);
        reg.puddle_head_mut(h).unwrap().add_member(n, DeviceCharacteristics::default());
    }

    #[test]
    fn test_consistent_registry_passes() {
        let mut reg = Registry::new();
        let h = head(&mut reg, 1);
        let (a, b) = (node(&mut reg), node(&mut reg));
        enlist(&mut reg, h, a);
        enlist(&mut reg, h, b);
        reg.fog_node_mut(a).unwrap().add_buddy(b);
        reg.fog_node_mut(b).unwrap().add_buddy(a);
        assert_eq!(check_all(&reg), Ok(()));
    }

    #[test]
    fn test_one_sided_buddy() {
        let mut reg = Registry::new();
        let (a, b) = (node(&mut reg), node(&mut reg));
        reg.fog_node_mut(a).unwrap().add_buddy(b);
        assert_eq!(check_all(&reg), Err(InvariantViolation::AsymmetricBuddies { a, b }));
    }

    #[test]
    fn test_one_sided_head_buddy() {
        let mut reg = Registry::new();
        let (h1, h2) = (head(&mut reg, 1), head(&mut reg, 1));
        reg.puddle_head_mut(h2).unwrap().add_buddy(h1);
        assert_eq!(check_all(&reg), Err(InvariantViolation::AsymmetricBuddies { a: h2, b: h1 }));
    }

    #[test]
    fn test_departed_buddy_even_when_symmetric() {
        let mut reg = Registry::new();
        let (live, gone) = (node(&mut reg), node(&mut reg));
        reg.fog_node_mut(live).unwrap().add_buddy(gone);
        reg.fog_node_mut(gone).unwrap().add_buddy(live);
        reg.fog_node_mut(gone).unwrap().depart();
        assert_eq!(check_buddy_symmetry(&reg), Ok(()));
        assert_eq!(
            check_all(&reg),
            Err(InvariantViolation::DepartedBuddy { node: live, departed: gone })
        );
    }

    #[test]
    fn test_double_listing_outside_relocation() {
        let mut reg = Registry::new();
        let (h1, h2) = (head(&mut reg, 1), head(&mut reg, 1));
        let n = node(&mut reg);
        enlist(&mut reg, h1, n);
        reg.puddle_head_mut(h2).unwrap().add_member(n, DeviceCharacteristics::default());
        assert_eq!(
            check_all(&reg),
            Err(InvariantViolation::MultipleOwners { node: n, first: h1, second: h2 })
        );
    }

    #[test]
    fn test_double_listing_allowed_mid_relocation() {
        let mut reg = Registry::new();
        let (h1, h2) = (head(&mut reg, 1), head(&mut reg, 1));
        let n = node(&mut reg);
        enlist(&mut reg, h1, n);
        // The new head has taken the node; the old one has not let go yet.
        enlist(&mut reg, h2, n);
        reg.fog_node_mut(n)
            .unwrap()
            .begin(PendingTransition::Relocating { from: h1, to: h2 });
        assert_eq!(check_all(&reg), Ok(()));

        // Relocating between some other pair does not excuse it.
        let h3 = head(&mut reg, 1);
        reg.fog_node_mut(n)
            .unwrap()
            .begin(PendingTransition::Relocating { from: h3, to: h2 });
        assert!(matches!(
            check_single_ownership(&reg),
            Err(InvariantViolation::MultipleOwners { .. })
        ));
    }

    #[test]
    fn test_member_that_points_elsewhere() {
        let mut reg = Registry::new();
        let h = head(&mut reg, 1);
        let n = node(&mut reg);
        reg.puddle_head_mut(h).unwrap().add_member(n, DeviceCharacteristics::default());
        assert_eq!(check_all(&reg), Err(InvariantViolation::OwnerMismatch { head: h, node: n }));
    }

    #[test]
    fn test_owner_missing_from_member_list() {
        let mut reg = Registry::new();
        let h = head(&mut reg, 1);
        let n = node(&mut reg);
        reg.fog_node_mut(n).unwrap().set_owner(h);
        assert_eq!(check_all(&reg), Err(InvariantViolation::MissingMember { node: n, head: h }));
    }

    #[test]
    fn test_stale_child_snapshot() {
        let mut reg = Registry::new();
        let root = head(&mut reg, 0);
        let child = head(&mut reg, 1);
        reg.adopt_child(root, child).unwrap();
        let n = node(&mut reg);
        enlist(&mut reg, child, n);
        assert_eq!(
            check_all(&reg),
            Err(InvariantViolation::StaleChildSnapshot { parent: root, child })
        );

        reg.refresh_parent_snapshot(child).unwrap();
        assert_eq!(check_all(&reg), Ok(()));
    }
}
