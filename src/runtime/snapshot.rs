//! Serializable view of the runtime, for the CLI and post-run inspection.

use serde::{Deserialize, Serialize};

use crate::entity::{ClusterState, EntityId, Registry};
use crate::geometry::Point;
use crate::time::VirtualTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogNodeSnapshot {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub state: ClusterState,
    pub position: Point,
    pub buddies: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuddleHeadSnapshot {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub members: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub id: EntityId,
    pub endpoints: (EntityId, EntityId),
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub time: VirtualTime,
    pub messages_delivered: usize,
    pub active_fog_nodes: usize,
    pub puddle_heads: Vec<PuddleHeadSnapshot>,
    pub fog_nodes: Vec<FogNodeSnapshot>,
    pub links: Vec<LinkSnapshot>,
}

impl RuntimeSnapshot {
    pub(crate) fn capture(
        reg: &Registry,
        time: VirtualTime,
        messages_delivered: usize,
        active_fog_nodes: usize,
    ) -> Self {
        RuntimeSnapshot {
            time,
            messages_delivered,
            active_fog_nodes,
            puddle_heads: reg
                .puddle_heads()
                .map(|h| PuddleHeadSnapshot {
                    id: h.id(),
                    name: h.name().to_string(),
                    level: h.level(),
                    parent: h.parent(),
                    children: h.children().to_vec(),
                    members: h.members().to_vec(),
                })
                .collect(),
            fog_nodes: reg
                .fog_nodes()
                .map(|n| FogNodeSnapshot {
                    id: n.id(),
                    name: n.name().to_string(),
                    level: n.level(),
                    state: n.state(),
                    position: n.position(),
                    buddies: n.buddies().iter().copied().collect(),
                })
                .collect(),
            links: reg
                .links()
                .map(|l| LinkSnapshot {
                    id: l.id(),
                    endpoints: l.endpoints(),
                    latency: l.latency(),
                })
                .collect(),
        }
    }
}
