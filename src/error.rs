//! Structured error types for PuddleSim.
//!
//! All fallible public APIs return `PuddleResult<T>`. Configuration
//! mistakes (bad polygons, broken hierarchies, unknown names) surface at
//! construction time; handler failures propagate out of the simulation
//! loop and stop the run.

use crate::entity::{EntityId, EntityKind};
use crate::runtime::InvariantViolation;

/// The top-level error type for the simulator.
#[derive(Debug, thiserror::Error)]
pub enum PuddleError {
    // ── Geometry ──────────────────────────────────────────

    /// A polygon needs at least three vertices.
    #[error("polygon needs at least 3 vertices, got {count}")]
    InsufficientVertices { count: usize },

    /// Parallel coordinate arrays of different length.
    #[error("coordinate arrays differ in length: {xs} x values, {ys} y values")]
    MismatchedCoordinates { xs: usize, ys: usize },

    // ── Registry ──────────────────────────────────────────

    /// An entity id was referenced but never registered.
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),

    /// An entity id resolved to the wrong kind of entity.
    #[error("entity {id} is a {found}, expected a {expected}")]
    EntityKindMismatch {
        id: EntityId,
        expected: EntityKind,
        found: EntityKind,
    },

    /// Attempted to register an entity under an id that is already taken.
    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),

    // ── Topology ──────────────────────────────────────────

    /// A parent/child adoption that would break the coordinator tree.
    #[error("cannot attach {child} under {parent}: {reason}")]
    InvalidHierarchy {
        parent: EntityId,
        child: EntityId,
        reason: String,
    },

    /// A link that cannot exist (self-loop, unknown endpoint, bad weight).
    #[error("invalid link {a} <-> {b}: {reason}")]
    InvalidLink {
        a: EntityId,
        b: EntityId,
        reason: String,
    },

    /// The frozen topology failed validation.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    // ── Scheduling ────────────────────────────────────────

    /// Attempted to schedule an event in the past.
    #[error("cannot schedule event at T={requested} when current time is T={current}")]
    NonCausalEvent { requested: u64, current: u64 },

    /// Scheduling delay pushed the clock past `u64::MAX`.
    #[error("virtual time overflow scheduling {delay} ticks after T={now}")]
    TimeOverflow { now: u64, delay: u64 },

    // ── Scenario / config ─────────────────────────────────

    /// A scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    ScenarioIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A scenario file could not be parsed or references unknown names.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    // ── Invariants ────────────────────────────────────────

    /// A runtime invariant check failed.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl From<toml::de::Error> for PuddleError {
    fn from(err: toml::de::Error) -> Self {
        PuddleError::InvalidScenario(err.to_string())
    }
}

/// Convenience alias for `Result<T, PuddleError>`.
pub type PuddleResult<T> = Result<T, PuddleError>;
