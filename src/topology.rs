//! Builder for the initial fog topology.
//!
//! Hides the boilerplate of allocating ids, wiring the coordinator tree,
//! placing nodes in their first puddle and seeding movement timers. The
//! topology is frozen by [`TopologyBuilder::build`]: after that the link
//! set, and with it the routing graph, never changes.
//!
//! # Example
//! ```rust
//! use puddlesim::config::SimConfig;
//! use puddlesim::geometry::{Point, Polygon, Rectangle, Vector};
//! use puddlesim::topology::{FogNodeSpec, TopologyBuilder};
//!
//! let mut topo = TopologyBuilder::new(SimConfig::default()).unwrap();
//! let root = topo
//!     .puddle_head("root", 0, Polygon::rectangle(0.0, 0.0, 12.0, 10.0).unwrap(), Point::new(6.0, 5.0))
//!     .unwrap();
//! let west = topo
//!     .puddle_head("west", 1, Polygon::rectangle(0.0, 0.0, 6.0, 10.0).unwrap(), Point::new(3.0, 5.0))
//!     .unwrap();
//! topo.attach(west, root).unwrap();
//! let node = topo
//!     .fog_node(
//!         FogNodeSpec::new("n1", 1, Point::new(1.0, 5.0), Rectangle::new(0.0, 0.0, 12.0, 10.0))
//!             .velocity(Vector::new(0.5, 0.0)),
//!     )
//!     .unwrap();
//! let (_sim, rt) = topo.build().unwrap();
//! assert_eq!(rt.owner_of(node).unwrap(), Some(west));
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::entity::{
    DeviceCharacteristics, Entity, EntityId, EntityKind, FogNode, GlobalBroker, Link, PuddleHead,
    Registry,
};
use crate::error::{PuddleError, PuddleResult};
use crate::event::EventType;
use crate::geometry::{Point, Polygon, Rectangle, Vector};
use crate::graph::AdjacencyGraph;
use crate::mobility::Mobility;
use crate::runtime::{invariants, protocol, Message, PuddleRuntime};
use crate::simulation::Simulation;
use crate::time::VirtualTime;

// ── FogNodeSpec ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Motion {
    Stationary,
    Velocity(Vector),
    RandomHeading { speed: f64 },
}

/// Description of a fog node to be created by the builder.
#[derive(Debug, Clone)]
pub struct FogNodeSpec {
    name: String,
    level: u32,
    position: Point,
    bounds: Rectangle,
    motion: Motion,
    characteristics: DeviceCharacteristics,
}

impl FogNodeSpec {
    /// A stationary node; chain [`FogNodeSpec::velocity`] or
    /// [`FogNodeSpec::speed`] to make it move.
    pub fn new(name: impl Into<String>, level: u32, position: Point, bounds: Rectangle) -> Self {
        FogNodeSpec {
            name: name.into(),
            level,
            position,
            bounds,
            motion: Motion::Stationary,
            characteristics: DeviceCharacteristics::default(),
        }
    }

    pub fn velocity(mut self, v: Vector) -> Self {
        self.motion = Motion::Velocity(v);
        self
    }

    /// Move at `speed` in a heading drawn from the builder's seeded RNG.
    pub fn speed(mut self, speed: f64) -> Self {
        self.motion = Motion::RandomHeading { speed };
        self
    }

    pub fn stationary(mut self) -> Self {
        self.motion = Motion::Stationary;
        self
    }

    pub fn characteristics(mut self, characteristics: DeviceCharacteristics) -> Self {
        self.characteristics = characteristics;
        self
    }
}

// ── TopologyBuilder ───────────────────────────────────────────────────

pub struct TopologyBuilder {
    config: SimConfig,
    registry: Registry,
    broker: EntityId,
    rng: ChaCha8Rng,
    scripted: Vec<(VirtualTime, EventType)>,
}

impl TopologyBuilder {
    /// Start an empty topology containing only the global broker.
    pub fn new(config: SimConfig) -> PuddleResult<Self> {
        config.validate()?;
        let mut registry = Registry::new();
        let broker = registry.allocate();
        registry.insert(broker, Entity::Broker(GlobalBroker::new(broker)))?;
        Ok(TopologyBuilder {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            registry,
            broker,
            scripted: Vec::new(),
        })
    }

    pub fn broker_id(&self) -> EntityId {
        self.broker
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ── Entities ──────────────────────────────────────────────

    pub fn puddle_head(
        &mut self,
        name: impl Into<String>,
        level: u32,
        coverage: Polygon,
        anchor: Point,
    ) -> PuddleResult<EntityId> {
        let id = self.registry.allocate();
        self.registry.insert(
            id,
            Entity::PuddleHead(PuddleHead::new(id, name, level, coverage, anchor)),
        )?;
        self.registry.broker_mut(self.broker)?.register_puddle_head(id, level);
        Ok(id)
    }

    /// Place `child` under `parent` in the coordinator tree.
    pub fn attach(&mut self, child: EntityId, parent: EntityId) -> PuddleResult<()> {
        self.registry.adopt_child(parent, child)
    }

    pub fn fog_node(&mut self, spec: FogNodeSpec) -> PuddleResult<EntityId> {
        let mobility = match spec.motion {
            Motion::Stationary => Mobility::stationary(spec.position, spec.bounds),
            Motion::Velocity(v) => Mobility::new(spec.position, v, spec.bounds),
            Motion::RandomHeading { speed } => {
                Mobility::with_random_heading(spec.position, speed, spec.bounds, &mut self.rng)
            }
        };
        let id = self.registry.allocate();
        self.registry.insert(
            id,
            Entity::FogNode(FogNode::new(id, spec.name, spec.level, mobility, spec.characteristics)),
        )?;
        self.registry.broker_mut(self.broker)?.register_fog_node(id);
        Ok(id)
    }

    /// Connect two fog nodes or puddle heads.
    pub fn link(&mut self, a: EntityId, b: EntityId, latency: f64, bandwidth: f64) -> PuddleResult<EntityId> {
        let invalid = |reason: &str| PuddleError::InvalidLink {
            a,
            b,
            reason: reason.to_string(),
        };
        if a == b {
            return Err(invalid("self-loop"));
        }
        if !(latency >= 0.0) || !(bandwidth > 0.0) {
            return Err(invalid("latency must be non-negative and bandwidth positive"));
        }
        for end in [a, b] {
            match self.registry.kind(end)? {
                EntityKind::FogNode | EntityKind::PuddleHead => {}
                other => return Err(invalid(&format!("{} cannot terminate a link", other))),
            }
        }

        let id = self.registry.allocate();
        self.registry.insert(id, Entity::Link(Link::new(id, a, b, latency, bandwidth)))?;
        for end in [a, b] {
            match self.registry.get_mut(end)? {
                Entity::FogNode(n) => n.attach_link(id),
                Entity::PuddleHead(h) => h.attach_link(id),
                Entity::Link(_) | Entity::Broker(_) => {}
            }
        }
        self.registry.broker_mut(self.broker)?.register_link(id);
        Ok(id)
    }

    /// Queue a protocol message to be delivered once the run starts.
    pub fn schedule(&mut self, at: u64, from: EntityId, to: EntityId, message: Message) -> &mut Self {
        self.scripted
            .push((VirtualTime::new(at), EventType::Deliver { from, to, message }));
        self
    }

    // ── Freeze ────────────────────────────────────────────────

    /// Validate the hierarchy, place every node in its first puddle, build
    /// the routing graph and arm the movement timers.
    pub fn build(mut self) -> PuddleResult<(Simulation, PuddleRuntime)> {
        validate(&self.registry)?;

        let nodes: Vec<(EntityId, u32, Point)> = self
            .registry
            .fog_nodes()
            .map(|n| (n.id(), n.level(), n.position()))
            .collect();
        for &(node, level, position) in &nodes {
            let found = self
                .registry
                .broker(self.broker)?
                .find_puddle_head(&self.registry, level, &position)?;
            match found {
                Some(head) => {
                    protocol::join(&mut self.registry, head, node)?;
                    if self.config.auto_link_members {
                        self.link(
                            node,
                            head,
                            self.config.member_link_latency,
                            self.config.member_link_bandwidth,
                        )?;
                    }
                }
                None => debug!(%node, %position, "no puddle covers node at setup"),
            }
        }

        let graph = AdjacencyGraph::from_links(self.registry.links());

        let mut sim = Simulation::new();
        for (at, payload) in self.scripted {
            sim.schedule(at, payload);
        }
        let first_tick = VirtualTime::new(self.config.location_update_interval);
        for node in self.registry.fog_nodes().filter(|n| n.mobility().is_mobile()) {
            sim.schedule(
                first_tick,
                EventType::Deliver {
                    from: node.id(),
                    to: node.id(),
                    message: Message::UpdateLocation,
                },
            );
        }

        info!(
            entities = self.registry.len(),
            nodes = nodes.len(),
            links = graph.edge_count(),
            "topology frozen"
        );
        let rt = PuddleRuntime::new(self.registry, self.broker, graph, self.config);
        Ok((sim, rt))
    }
}

// ── Validation ────────────────────────────────────────────────────────

/// Check the coordinator tree and link set before a run starts.
///
/// Every non-root puddle head must reach a root through exactly one
/// parent chain, one level per step, with each parent listing it as a
/// child and holding a current snapshot of its members.
pub fn validate(registry: &Registry) -> PuddleResult<()> {
    let heads: Vec<&PuddleHead> = registry.puddle_heads().collect();

    for head in &heads {
        let id = head.id();
        if let Some(parent_id) = head.parent() {
            let parent = registry.puddle_head(parent_id)?;
            if parent.level() + 1 != head.level() {
                return Err(PuddleError::InvalidTopology(format!(
                    "{} at level {} has parent {} at level {}",
                    id,
                    head.level(),
                    parent_id,
                    parent.level()
                )));
            }
            if !parent.children().contains(&id) {
                return Err(PuddleError::InvalidTopology(format!(
                    "{} does not list child {}",
                    parent_id, id
                )));
            }
        }

        // Walk up; a chain longer than the head count must loop.
        let mut cursor = head.parent();
        let mut steps = 0usize;
        while let Some(up) = cursor {
            steps += 1;
            if steps > heads.len() {
                return Err(PuddleError::InvalidTopology(format!(
                    "parent chain of {} never reaches a root",
                    id
                )));
            }
            cursor = registry.puddle_head(up)?.parent();
        }

        for &child in head.children() {
            if registry.puddle_head(child)?.parent() != Some(id) {
                return Err(PuddleError::InvalidTopology(format!(
                    "{} lists child {} whose parent is elsewhere",
                    id, child
                )));
            }
        }
    }

    for link in registry.links() {
        let (a, b) = link.endpoints();
        if a == b {
            return Err(PuddleError::InvalidLink {
                a,
                b,
                reason: "self-loop".into(),
            });
        }
        registry.get(a)?;
        registry.get(b)?;
    }

    invariants::check_all(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TopologyBuilder {
        TopologyBuilder::new(SimConfig::default()).unwrap()
    }

    fn rect(x: f64, w: f64) -> Polygon {
        Polygon::rectangle(x, 0.0, w, 10.0).unwrap()
    }

    fn bounds() -> Rectangle {
        Rectangle::new(0.0, 0.0, 12.0, 10.0)
    }

    #[test]
    fn test_ids_are_unique_and_sequential() {
        let mut topo = builder();
        let a = topo.puddle_head("a", 0, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        let b = topo.puddle_head("b", 0, rect(6.0, 6.0), Point::new(9.0, 5.0)).unwrap();
        let n = topo.fog_node(FogNodeSpec::new("n", 0, Point::new(1.0, 1.0), bounds())).unwrap();
        let ids = [topo.broker_id(), a, b, n];
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_attach_wires_siblings_as_buddies() {
        let mut topo = builder();
        let root = topo.puddle_head("root", 0, rect(0.0, 12.0), Point::new(6.0, 5.0)).unwrap();
        let a = topo.puddle_head("a", 1, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        let b = topo.puddle_head("b", 1, rect(6.0, 6.0), Point::new(9.0, 5.0)).unwrap();
        let c = topo.puddle_head("c", 1, rect(6.0, 3.0), Point::new(7.0, 5.0)).unwrap();
        topo.attach(a, root).unwrap();
        topo.attach(b, root).unwrap();
        topo.attach(c, root).unwrap();

        let reg = topo.registry();
        assert_eq!(reg.puddle_head(root).unwrap().children(), &[a, b, c]);
        assert!(reg.puddle_head(a).unwrap().buddies().contains(&b));
        assert!(reg.puddle_head(b).unwrap().buddies().contains(&a));
        assert!(reg.puddle_head(c).unwrap().buddies().contains(&a));
        assert!(reg.puddle_head(a).unwrap().buddies().contains(&c));
        assert_eq!(reg.puddle_head(a).unwrap().parent(), Some(root));
        assert!(validate(reg).is_ok());
    }

    #[test]
    fn test_attach_rejects_level_skip() {
        let mut topo = builder();
        let root = topo.puddle_head("root", 0, rect(0.0, 12.0), Point::new(6.0, 5.0)).unwrap();
        let deep = topo.puddle_head("deep", 2, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        let err = topo.attach(deep, root).unwrap_err();
        assert!(matches!(err, PuddleError::InvalidHierarchy { .. }));
    }

    #[test]
    fn test_attach_rejects_second_parent() {
        let mut topo = builder();
        let r1 = topo.puddle_head("r1", 0, rect(0.0, 12.0), Point::new(6.0, 5.0)).unwrap();
        let r2 = topo.puddle_head("r2", 0, rect(0.0, 12.0), Point::new(6.0, 5.0)).unwrap();
        let a = topo.puddle_head("a", 1, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        topo.attach(a, r1).unwrap();
        assert!(topo.attach(a, r2).is_err());
    }

    #[test]
    fn test_link_validation() {
        let mut topo = builder();
        let a = topo.puddle_head("a", 0, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        assert!(matches!(
            topo.link(a, a, 1.0, 1.0),
            Err(PuddleError::InvalidLink { .. })
        ));
        let broker = topo.broker_id();
        assert!(topo.link(a, broker, 1.0, 1.0).is_err());
        assert!(matches!(
            topo.link(a, EntityId::new(999), 1.0, 1.0),
            Err(PuddleError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_build_assigns_initial_puddles() {
        let mut topo = builder();
        let west = topo.puddle_head("west", 1, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        let east = topo.puddle_head("east", 1, rect(6.0, 6.0), Point::new(9.0, 5.0)).unwrap();
        let n1 = topo.fog_node(FogNodeSpec::new("n1", 1, Point::new(1.0, 1.0), bounds())).unwrap();
        let n2 = topo.fog_node(FogNodeSpec::new("n2", 1, Point::new(8.0, 1.0), bounds())).unwrap();
        let n3 = topo.fog_node(FogNodeSpec::new("n3", 1, Point::new(2.0, 1.0), bounds())).unwrap();

        let (_sim, rt) = topo.build().unwrap();
        assert_eq!(rt.owner_of(n1).unwrap(), Some(west));
        assert_eq!(rt.owner_of(n2).unwrap(), Some(east));
        assert_eq!(rt.registry().puddle_head(west).unwrap().members(), &[n1, n3]);
        assert!(rt.registry().fog_node(n1).unwrap().has_buddy(n3));
        assert!(!rt.registry().fog_node(n1).unwrap().has_buddy(n2));
    }

    #[test]
    fn test_build_auto_links_members() {
        let config = SimConfig {
            auto_link_members: true,
            ..SimConfig::default()
        };
        let mut topo = TopologyBuilder::new(config).unwrap();
        let west = topo.puddle_head("west", 1, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        let n1 = topo.fog_node(FogNodeSpec::new("n1", 1, Point::new(1.0, 1.0), bounds())).unwrap();

        let (_sim, rt) = topo.build().unwrap();
        let link = rt.link_between(n1, west).unwrap();
        assert_eq!(rt.registry().link(link).unwrap().latency(), 2.0);
        assert_eq!(rt.next_hop(n1, west), Some(west));
    }

    #[test]
    fn test_build_arms_movement_timers_for_mobile_nodes_only() {
        let mut topo = builder();
        topo.puddle_head("west", 1, rect(0.0, 6.0), Point::new(3.0, 5.0)).unwrap();
        topo.fog_node(
            FogNodeSpec::new("mover", 1, Point::new(1.0, 1.0), bounds()).velocity(Vector::new(1.0, 0.0)),
        )
        .unwrap();
        topo.fog_node(FogNodeSpec::new("post", 1, Point::new(2.0, 1.0), bounds())).unwrap();

        let (sim, _rt) = topo.build().unwrap();
        assert_eq!(sim.scheduler().len(), 1);
        assert_eq!(
            sim.scheduler().peek_next().map(|e| e.scheduled_at),
            Some(VirtualTime::new(10))
        );
    }

    #[test]
    fn test_random_heading_is_reproducible() {
        fn heading(seed: u64) -> Vector {
            let config = SimConfig {
                seed,
                ..SimConfig::default()
            };
            let mut topo = TopologyBuilder::new(config).unwrap();
            let n = topo
                .fog_node(FogNodeSpec::new("n", 1, Point::new(1.0, 1.0), bounds()).speed(3.0))
                .unwrap();
            topo.registry().fog_node(n).unwrap().mobility().velocity()
        }
        assert_eq!(heading(11), heading(11));
        assert!((heading(11).magnitude() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_update_interval() {
        let config = SimConfig {
            location_update_interval: 0,
            ..SimConfig::default()
        };
        assert!(TopologyBuilder::new(config).is_err());
    }
}
