//! `PuddleRuntime`: owns the fog topology and delivers protocol messages.
//!
//! The runtime is the explicit context every handler works against: the
//! entity registry, the broker id, the frozen routing graph and the
//! simulation constants. There is no global state.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`message`] | [`Message`] + [`SimulationContext`] send helpers |
//! | [`protocol`] | per-kind handlers, join / leave steps |
//! | [`invariants`] | membership checks, [`InvariantViolation`] |
//! | [`trace`] | [`TraceEntry`] |
//! | [`snapshot`] | [`RuntimeSnapshot`] |

pub mod invariants;
pub mod message;
pub(crate) mod protocol;
pub mod snapshot;
pub mod trace;

pub use invariants::InvariantViolation;
pub use message::Message;
pub use snapshot::RuntimeSnapshot;
pub use trace::TraceEntry;

use crate::config::SimConfig;
use crate::entity::{EntityId, EntityKind, GlobalBroker, Registry};
use crate::error::{PuddleError, PuddleResult};
use crate::event::{Event, EventType};
use crate::geometry::Vector;
use crate::graph::AdjacencyGraph;
use crate::simulation::{EventHandler, SimulationContext};
use crate::time::VirtualTime;

/// Hosts every entity and dispatches delivered messages to them.
///
/// Implements [`EventHandler`] so it can be passed straight to
/// [`Simulation::run_until`](crate::simulation::Simulation::run_until).
/// Build one with [`TopologyBuilder`](crate::topology::TopologyBuilder).
#[derive(Debug, Clone)]
pub struct PuddleRuntime {
    registry: Registry,
    broker: EntityId,
    graph: AdjacencyGraph,
    config: SimConfig,
    /// Append-only record of every delivered message.
    pub trace: Vec<TraceEntry>,
}

impl PuddleRuntime {
    pub(crate) fn new(registry: Registry, broker: EntityId, graph: AdjacencyGraph, config: SimConfig) -> Self {
        PuddleRuntime {
            registry,
            broker,
            graph,
            config,
            trace: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn broker_id(&self) -> EntityId {
        self.broker
    }

    pub fn broker(&self) -> PuddleResult<&GlobalBroker> {
        self.registry.broker(self.broker)
    }

    /// Current puddle head of `node`, `None` if unassigned or departed.
    pub fn owner_of(&self, node: EntityId) -> PuddleResult<Option<EntityId>> {
        Ok(self.registry.fog_node(node)?.owner())
    }

    pub fn find_fog_node(&self, name: &str) -> Option<EntityId> {
        self.registry.fog_nodes().find(|n| n.name() == name).map(|n| n.id())
    }

    pub fn find_puddle_head(&self, name: &str) -> Option<EntityId> {
        self.registry.puddle_heads().find(|h| h.name() == name).map(|h| h.id())
    }

    /// Record a module running on `node`, on behalf of its puddle head.
    pub fn place_service(&mut self, node: EntityId, module: impl Into<String>) -> PuddleResult<()> {
        let head = self
            .owner_of(node)?
            .ok_or_else(|| PuddleError::InvalidTopology(format!("{} has no puddle head", node)))?;
        self.registry.puddle_head_mut(head)?.place_service(node, module);
        Ok(())
    }

    /// Change a node's heading from outside the simulation.
    pub fn set_direction(&mut self, node: EntityId, velocity: Vector) -> PuddleResult<()> {
        self.registry.fog_node_mut(node)?.mobility_mut().set_direction(velocity);
        Ok(())
    }

    // ── Routing ───────────────────────────────────────────────

    /// Departed nodes are invisible to routing.
    pub fn is_routable(&self, id: EntityId) -> bool {
        match self.registry.fog_node(id) {
            Ok(node) => !node.is_departed(),
            Err(_) => self.registry.contains(id),
        }
    }

    pub fn next_hop(&self, src: EntityId, dst: EntityId) -> Option<EntityId> {
        self.graph.next_hop_where(src, dst, |v| self.is_routable(v))
    }

    pub fn route(&self, src: EntityId, dst: EntityId) -> Option<Vec<EntityId>> {
        self.graph.shortest_path_where(src, dst, |v| self.is_routable(v))
    }

    /// Lowest-id link joining `a` and `b` directly.
    pub fn link_between(&self, a: EntityId, b: EntityId) -> Option<EntityId> {
        self.registry.links().find(|l| l.connects(a, b)).map(|l| l.id())
    }

    /// Sum of current link latencies along the route from `src` to `dst`.
    pub fn path_latency(&self, src: EntityId, dst: EntityId) -> Option<f64> {
        let path = self.route(src, dst)?;
        let mut total = 0.0;
        for pair in path.windows(2) {
            let link = self.link_between(pair[0], pair[1])?;
            total += self.registry.link(link).ok()?.latency();
        }
        Some(total)
    }

    /// Links along the route from `src` to `dst`, each paired with the
    /// endpoint traffic enters it from.
    fn route_hops(&self, src: EntityId, dst: EntityId) -> Option<Vec<(EntityId, EntityId)>> {
        let path = self.route(src, dst)?;
        path.windows(2)
            .map(|pair| Some((self.link_between(pair[0], pair[1])?, pair[0])))
            .collect()
    }

    /// Expected delay for `bytes` sent from `src` to `dst`, counting what is
    /// already queued on every hop.
    pub fn transfer_delay(&self, src: EntityId, dst: EntityId, bytes: u64) -> Option<f64> {
        let mut total = 0.0;
        for (link, from) in self.route_hops(src, dst)? {
            total += self.registry.link(link).ok()?.estimated_delay(from, bytes);
        }
        Some(total)
    }

    /// Queue `bytes` on every hop from `src` to `dst`.
    ///
    /// Returns the delay estimated before queuing, or `None` without
    /// queuing anything when there is no route. A link releases the oldest
    /// message in each direction whenever it recomputes its latency.
    pub fn queue_transfer(&mut self, src: EntityId, dst: EntityId, bytes: u64) -> PuddleResult<Option<f64>> {
        let Some(hops) = self.route_hops(src, dst) else {
            return Ok(None);
        };
        let mut total = 0.0;
        for (link, from) in hops {
            let link = self.registry.link_mut(link)?;
            total += link.estimated_delay(from, bytes);
            link.enqueue(from, bytes);
        }
        Ok(Some(total))
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        invariants::check_all(&self.registry)
    }

    pub fn snapshot(&self, now: VirtualTime) -> RuntimeSnapshot {
        let active = self.broker().map(|b| b.active_fog_nodes().len()).unwrap_or(0);
        RuntimeSnapshot::capture(&self.registry, now, self.trace.len(), active)
    }

    fn deliver(
        &mut self,
        ctx: &mut SimulationContext,
        to: EntityId,
        message: Message,
    ) -> PuddleResult<()> {
        let reg = &mut self.registry;
        let cfg = &self.config;
        match reg.kind(to)? {
            EntityKind::FogNode => protocol::on_fog_node(reg, cfg, self.broker, ctx, to, message),
            EntityKind::PuddleHead => protocol::on_puddle_head(reg, cfg, ctx, to, message),
            EntityKind::Broker => protocol::on_broker(reg, cfg, ctx, to, message),
            EntityKind::Link => protocol::on_link(reg, cfg, to, message),
        }
    }
}

impl EventHandler for PuddleRuntime {
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> PuddleResult<()> {
        match &event.payload {
            EventType::Deliver { from, to, message } => {
                tracing::trace!(time = ctx.now().ticks(), %from, %to, %message, "deliver");
                self.trace.push(TraceEntry {
                    time: ctx.now(),
                    event_id: event.id,
                    from: *from,
                    to: *to,
                    message: *message,
                });
                self.deliver(ctx, *to, *message)?;
                if self.config.check_invariants {
                    self.check_invariants()?;
                }
            }
            // System-level events are not addressed to any entity.
            EventType::Noop => {}
        }
        Ok(())
    }
}
