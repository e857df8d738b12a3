//! Simulated entities and the registry that owns them.
//!
//! Every entity gets a process-wide unique [`EntityId`] from the registry
//! when it is created. Entities never hold references to each other, only
//! ids, and all cross-entity changes go through the registry.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`EntityId`] newtype |
//! | [`fog_node`] | [`FogNode`], [`ClusterState`], [`PendingTransition`] |
//! | [`puddle_head`] | [`PuddleHead`] coordinator |
//! | [`broker`] | [`GlobalBroker`], [`Placement`] |
//! | [`link`] | [`Link`], [`LinkDirection`] |
//! | [`registry`] | [`Registry`], [`Entity`], [`EntityKind`] |

pub mod broker;
pub mod fog_node;
pub mod id;
pub mod link;
pub mod puddle_head;
pub mod registry;

pub use broker::{GlobalBroker, Placement};
pub use fog_node::{ClusterState, DeviceCharacteristics, FogNode, PendingTransition};
pub use id::EntityId;
pub use link::{Link, LinkDirection};
pub use puddle_head::{ModuleId, PuddleHead};
pub use registry::{Entity, EntityKind, Registry};
