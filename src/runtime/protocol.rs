//! Membership protocol handlers, one entry point per entity kind.
//!
//! Handlers run to completion inside a single delivery. They only touch
//! entities through the registry and only talk to other entities by
//! scheduling messages on the context.

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::entity::{EntityId, Placement, PendingTransition, Registry};
use crate::error::PuddleResult;
use crate::simulation::SimulationContext;

use super::message::Message;

// ── Shared membership steps ───────────────────────────────────────────

/// Make `node` a member of `head`.
///
/// The node becomes a buddy of every live member (both ways) and the
/// parent's snapshot of `head` is refreshed. Returns `false` when the node
/// was already a member or has departed.
pub(crate) fn join(reg: &mut Registry, head: EntityId, node: EntityId) -> PuddleResult<bool> {
    if reg.puddle_head(head)?.is_member(node) || reg.fog_node(node)?.is_departed() {
        return Ok(false);
    }
    let members = reg.puddle_head(head)?.members().to_vec();
    let characteristics = reg.fog_node(node)?.characteristics().clone();

    for member in members {
        // A departed member is still listed until its leave arrives.
        if reg.fog_node(member)?.is_departed() {
            continue;
        }
        reg.fog_node_mut(member)?.add_buddy(node);
        reg.fog_node_mut(node)?.add_buddy(member);
    }
    reg.fog_node_mut(node)?.set_owner(head);
    reg.puddle_head_mut(head)?.add_member(node, characteristics);
    reg.refresh_parent_snapshot(head)?;

    debug!(%node, %head, "joined puddle");
    Ok(true)
}

/// Remove `node` from `head`'s puddle.
///
/// Services are torn down and a departed node is cut from every
/// remaining member's buddy set. A live node loses its buddy ties to the
/// remaining members, except members that already share its new puddle.
/// If `head` still owned the node it becomes unassigned.
pub(crate) fn leave(reg: &mut Registry, head: EntityId, node: EntityId) -> PuddleResult<bool> {
    let removed = reg.puddle_head_mut(head)?.remove_member(node);
    if removed {
        let modules = reg.puddle_head_mut(head)?.teardown_services(node);
        let fog = reg.fog_node(node)?;
        if fog.is_departed() {
            let remaining = reg.puddle_head(head)?.members().to_vec();
            for member in remaining {
                reg.fog_node_mut(member)?.remove_buddy(node);
            }
            reg.fog_node_mut(node)?.take_buddies();
            info!(%node, %head, services = modules.len(), "departed node released");
        } else {
            let owner = fog.owner();
            let remaining = reg.puddle_head(head)?.members().to_vec();
            for member in remaining {
                let moved_with_it = owner.is_some()
                    && owner != Some(head)
                    && reg.fog_node(member)?.owner() == owner;
                if moved_with_it {
                    continue;
                }
                reg.fog_node_mut(member)?.remove_buddy(node);
                reg.fog_node_mut(node)?.remove_buddy(member);
            }
            if reg.fog_node_mut(node)?.release(head) {
                debug!(%node, %head, "node left and is unassigned");
            }
        }
        reg.refresh_parent_snapshot(head)?;
    } else {
        debug!(%node, %head, "leave for a node that is not a member");
    }

    let fog = reg.fog_node_mut(node)?;
    match fog.pending() {
        Some(PendingTransition::Relocating { from, .. }) if from == head => fog.settle(),
        Some(PendingTransition::Departing { from: Some(from) }) if from == head => fog.settle(),
        _ => {}
    }
    Ok(removed)
}

// ── Fog nodes ─────────────────────────────────────────────────────────

pub(crate) fn on_fog_node(
    reg: &mut Registry,
    cfg: &SimConfig,
    broker: EntityId,
    ctx: &mut SimulationContext,
    id: EntityId,
    message: Message,
) -> PuddleResult<()> {
    match message {
        Message::UpdateLocation => {
            let node = reg.fog_node_mut(id)?;
            if node.is_departed() || !node.mobility().is_mobile() {
                return Ok(());
            }
            let position = node.mobility_mut().advance(ctx.now());
            let links: Vec<EntityId> = node.links().iter().copied().collect();
            debug!(node = %id, %position, "moved");

            ctx.send_self(id, cfg.location_update_interval, Message::UpdateLocation)?;
            for link in links {
                ctx.send(id, link, cfg.message_delay, Message::UpdateLatency)?;
            }
            ctx.send(id, broker, cfg.message_delay, Message::ProcessNodeMove { node: id })?;
        }

        Message::NodeLeave => {
            let node = reg.fog_node_mut(id)?;
            if node.is_departed() {
                return Ok(());
            }
            let previous = node.depart();
            let buddies = node.take_buddies();
            match previous {
                Some(from) => node.begin(PendingTransition::Departing { from: Some(from) }),
                None => node.settle(),
            }
            for buddy in buddies {
                reg.fog_node_mut(buddy)?.remove_buddy(id);
            }
            info!(node = %id, owner = ?previous, "node left the network");
            if let Some(head) = previous {
                ctx.send(id, head, cfg.message_delay, Message::NodeLeavePuddleHead { node: id })?;
            }
        }

        other => warn!(node = %id, message = %other, "fog node ignores message"),
    }
    Ok(())
}

// ── Puddle heads ──────────────────────────────────────────────────────

pub(crate) fn on_puddle_head(
    reg: &mut Registry,
    cfg: &SimConfig,
    ctx: &mut SimulationContext,
    id: EntityId,
    message: Message,
) -> PuddleResult<()> {
    match message {
        Message::NodeJoinPuddleHead { node } => {
            join(reg, id, node)?;
            let fog = reg.fog_node_mut(node)?;
            if fog.pending() == Some(PendingTransition::Joining { to: id }) {
                fog.settle();
            }
        }

        Message::NodeRelocatePuddle { node } => {
            let fog = reg.fog_node(node)?;
            if fog.is_departed() {
                debug!(%node, head = %id, "relocation for a departed node dropped");
                return Ok(());
            }
            let old = fog.owner();
            if old == Some(id) {
                reg.fog_node_mut(node)?.settle();
                return Ok(());
            }
            join(reg, id, node)?;
            match old {
                Some(old) => {
                    info!(%node, from = %old, to = %id, "node relocated");
                    ctx.send(id, old, cfg.handoff_delay, Message::NodeLeavePuddleHead { node })?;
                }
                None => reg.fog_node_mut(node)?.settle(),
            }
        }

        Message::NodeLeavePuddleHead { node } => {
            leave(reg, id, node)?;
        }

        other => warn!(head = %id, message = %other, "puddle head ignores message"),
    }
    Ok(())
}

// ── Broker ────────────────────────────────────────────────────────────

pub(crate) fn on_broker(
    reg: &mut Registry,
    cfg: &SimConfig,
    ctx: &mut SimulationContext,
    id: EntityId,
    message: Message,
) -> PuddleResult<()> {
    let Message::ProcessNodeMove { node } = message else {
        warn!(broker = %id, message = %message, "broker ignores message");
        return Ok(());
    };

    let placement = reg.broker(id)?.evaluate(reg, node)?;
    match placement {
        Placement::Stay => {}
        Placement::Ignore => match reg.fog_node(node)?.owner() {
            Some(owner) if reg.puddle_head(owner).is_err() => {
                warn!(%node, %owner, "owner is not a puddle head, movement check skipped")
            }
            _ => debug!(%node, "movement check skipped"),
        },
        Placement::Join { to } => {
            reg.fog_node_mut(node)?.begin(PendingTransition::Joining { to });
            ctx.send(id, to, cfg.message_delay, Message::NodeJoinPuddleHead { node })?;
        }
        Placement::Relocate { from, to } => {
            reg.fog_node_mut(node)?.begin(PendingTransition::Relocating { from, to });
            ctx.send(id, to, cfg.message_delay, Message::NodeRelocatePuddle { node })?;
        }
        Placement::Depart { from } => {
            reg.fog_node_mut(node)?.begin(PendingTransition::Departing { from });
            reg.broker_mut(id)?.forget_fog_node(node);
            info!(%node, owner = ?from, "no puddle covers node, expelling");
            ctx.send(id, node, cfg.message_delay, Message::NodeLeave)?;
        }
    }
    Ok(())
}

// ── Links ─────────────────────────────────────────────────────────────

pub(crate) fn on_link(reg: &mut Registry, cfg: &SimConfig, id: EntityId, message: Message) -> PuddleResult<()> {
    if message != Message::UpdateLatency {
        warn!(link = %id, message = %message, "link ignores message");
        return Ok(());
    }
    let (a, b) = reg.link(id)?.endpoints();
    let (Some(pa), Some(pb)) = (reg.get(a)?.position(), reg.get(b)?.position()) else {
        return Ok(());
    };
    let link = reg.link_mut(id)?;
    let latency = link.recompute_latency(pa.distance_to(&pb), cfg.propagation_speed);
    let released = link.release_oldest();
    debug!(link = %id, latency, released, "latency updated");
    Ok(())
}
