//! # Puddlesim: Hierarchical Mobile Fog Simulator
//!
//! A deterministic discrete-event simulator for fog networks organised as
//! puddles: geographic clusters of mobile fog nodes, each coordinated by a
//! puddle head, arranged in a tree and overseen by one global broker.
//! Runs are single-threaded and driven by a
//! virtual clock and a seeded RNG, so two runs of the same scenario
//! produce the same message trace.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │        PuddleRuntime         │ ← delivers protocol messages
//! │  ┌───────────────────────┐  │
//! │  │  Registry              │  │ ← fog nodes, puddle heads,
//! │  │                        │  │   links, broker (by EntityId)
//! │  └───────────────────────┘  │
//! │  ┌───────────────────────┐  │
//! │  │  AdjacencyGraph        │  │ ← BFS routing over links
//! │  └───────────────────────┘  │
//! │  ┌───────────────────────┐  │
//! │  │     Simulation         │  │ ← execution loop
//! │  │  ┌─────────────────┐  │  │
//! │  │  │   Scheduler      │  │  │ ← deterministic min-heap
//! │  │  └─────────────────┘  │  │
//! │  │  ┌─────────────────┐  │  │
//! │  │  │   VirtualTime    │  │  │ ← logical clock
//! │  │  └─────────────────┘  │  │
//! │  └───────────────────────┘  │
//! └─────────────────────────────┘
//! ```
//!
//! Build a topology with [`TopologyBuilder`] or load one from a TOML
//! scenario with [`ScenarioConfig`], then run it:
//!
//! ```no_run
//! use puddlesim::{ScenarioConfig, VirtualTime};
//!
//! # fn main() -> puddlesim::PuddleResult<()> {
//! let scenario = ScenarioConfig::load("scenarios/two_puddles.toml")?;
//! let (mut sim, mut rt) = scenario.build()?;
//! sim.run_until(VirtualTime::new(500), &mut rt)?;
//! println!("{} messages delivered", rt.trace.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod geometry;
pub mod graph;
pub mod mobility;
pub mod runtime;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod topology;

// Re-exports for convenience.
pub use config::{ScenarioConfig, SimConfig};
pub use entity::{
    ClusterState, DeviceCharacteristics, EntityId, FogNode, GlobalBroker, Link, Placement, PuddleHead,
    Registry,
};
pub use error::{PuddleError, PuddleResult};
pub use event::{Event, EventId, EventIdGen, EventType};
pub use geometry::{Point, Polygon, Rectangle, Vector};
pub use graph::AdjacencyGraph;
pub use mobility::Mobility;
pub use runtime::{InvariantViolation, Message, PuddleRuntime, RuntimeSnapshot, TraceEntry};
pub use scheduler::Scheduler;
pub use simulation::{EventHandler, Simulation, SimulationContext};
pub use time::VirtualTime;
pub use topology::{FogNodeSpec, TopologyBuilder};
