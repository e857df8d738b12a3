//! Simulation parameters and TOML scenario files.
//!
//! A scenario names its puddle heads, fog nodes and links; names are
//! resolved to entity ids when the scenario is turned into a runtime.
//!
//! ```toml
//! [simulation]
//! location_update_interval = 10
//! end_time = 200
//!
//! [[puddle_heads]]
//! name = "west"
//! level = 1
//! anchor = [3.0, 5.0]
//! coverage = [[0.0, 0.0], [6.0, 0.0], [6.0, 10.0], [0.0, 10.0]]
//!
//! [[fog_nodes]]
//! name = "n1"
//! level = 1
//! position = [1.0, 5.0]
//! velocity = [0.5, 0.0]
//! bounds = { x = 0.0, y = 0.0, width = 12.0, height = 10.0 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::{DeviceCharacteristics, EntityId};
use crate::error::{PuddleError, PuddleResult};
use crate::geometry::{Point, Polygon, Rectangle, Vector};
use crate::runtime::PuddleRuntime;
use crate::simulation::Simulation;
use crate::topology::{FogNodeSpec, TopologyBuilder};

/// Propagation speed used for link latency, in distance units per tick.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

// ── SimConfig ─────────────────────────────────────────────────────────

/// Timing and topology constants for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Ticks between two movement checks of a mobile node.
    pub location_update_interval: u64,
    /// Delivery delay of protocol messages.
    pub message_delay: u64,
    /// Delay of the leave a new puddle head sends to the old one after a
    /// relocation. Zero keeps a node in a single member list at every
    /// instant boundary.
    pub handoff_delay: u64,
    /// Default horizon for [`PuddleRuntime`] runs started from the CLI.
    pub end_time: u64,
    /// Divisor turning link length into propagation latency.
    pub propagation_speed: f64,
    /// Link each node to the puddle head it is first placed in.
    pub auto_link_members: bool,
    pub member_link_latency: f64,
    pub member_link_bandwidth: f64,
    /// Seed for random node headings.
    pub seed: u64,
    /// Run the invariant checks after every delivered message.
    pub check_invariants: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            location_update_interval: 10,
            message_delay: 1,
            handoff_delay: 0,
            end_time: 1_000,
            propagation_speed: SPEED_OF_LIGHT,
            auto_link_members: false,
            member_link_latency: 2.0,
            member_link_bandwidth: 1000.0,
            seed: 42,
            check_invariants: false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> PuddleResult<()> {
        if self.location_update_interval == 0 {
            return Err(PuddleError::InvalidScenario(
                "location_update_interval must be at least 1".into(),
            ));
        }
        if !(self.propagation_speed > 0.0) {
            return Err(PuddleError::InvalidScenario(
                "propagation_speed must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── Scenario ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PuddleHeadConfig {
    pub name: String,
    pub level: u32,
    pub anchor: [f64; 2],
    pub coverage: Vec<[f64; 2]>,
    /// Name of the parent puddle head.
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FogNodeConfig {
    pub name: String,
    pub level: u32,
    pub position: [f64; 2],
    pub bounds: BoundsConfig,
    /// Fixed velocity. Takes precedence over `speed`.
    #[serde(default)]
    pub velocity: Option<[f64; 2]>,
    /// Speed with a seeded random heading.
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default = "default_true")]
    pub mobile: bool,
    #[serde(default)]
    pub characteristics: DeviceCharacteristics,
    /// Modules already running on the node when the run starts.
    #[serde(default)]
    pub services: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    pub latency: f64,
    pub bandwidth: f64,
}

/// A complete scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimConfig,
    #[serde(default)]
    pub puddle_heads: Vec<PuddleHeadConfig>,
    #[serde(default)]
    pub fog_nodes: Vec<FogNodeConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl ScenarioConfig {
    pub fn from_toml_str(text: &str) -> PuddleResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> PuddleResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PuddleError::ScenarioIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve names, build the topology and freeze it.
    pub fn build(&self) -> PuddleResult<(Simulation, PuddleRuntime)> {
        let mut topo = TopologyBuilder::new(self.simulation.clone())?;
        let mut names: BTreeMap<&str, EntityId> = BTreeMap::new();

        for head in &self.puddle_heads {
            let coverage = Polygon::new(head.coverage.iter().copied().map(Point::from).collect())?;
            let id = topo.puddle_head(&head.name, head.level, coverage, head.anchor.into())?;
            if names.insert(head.name.as_str(), id).is_some() {
                return Err(duplicate(&head.name));
            }
        }
        for head in &self.puddle_heads {
            if let Some(parent) = &head.parent {
                topo.attach(resolve(&names, &head.name)?, resolve(&names, parent)?)?;
            }
        }

        let mut services = Vec::new();
        for node in &self.fog_nodes {
            let b = node.bounds;
            let mut spec = FogNodeSpec::new(
                &node.name,
                node.level,
                node.position.into(),
                Rectangle::new(b.x, b.y, b.width, b.height),
            )
            .characteristics(node.characteristics.clone());
            spec = match (node.mobile, node.velocity, node.speed) {
                (false, _, _) => spec.stationary(),
                (true, Some([vx, vy]), _) => spec.velocity(Vector::new(vx, vy)),
                (true, None, Some(speed)) => spec.speed(speed),
                (true, None, None) => {
                    return Err(PuddleError::InvalidScenario(format!(
                        "mobile fog node `{}` needs a velocity or a speed",
                        node.name
                    )))
                }
            };
            let id = topo.fog_node(spec)?;
            if names.insert(node.name.as_str(), id).is_some() {
                return Err(duplicate(&node.name));
            }
            for module in &node.services {
                services.push((id, module.clone()));
            }
        }

        for link in &self.links {
            topo.link(
                resolve(&names, &link.a)?,
                resolve(&names, &link.b)?,
                link.latency,
                link.bandwidth,
            )?;
        }

        let (sim, mut rt) = topo.build()?;
        for (node, module) in services {
            rt.place_service(node, module)?;
        }
        Ok((sim, rt))
    }
}

fn resolve(names: &BTreeMap<&str, EntityId>, name: &str) -> PuddleResult<EntityId> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| PuddleError::InvalidScenario(format!("unknown entity name `{}`", name)))
}

fn duplicate(name: &str) -> PuddleError {
    PuddleError::InvalidScenario(format!("duplicate entity name `{}`", name))
}
