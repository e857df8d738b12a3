//! Entity ID: a copyable, ordered identifier shared by every entity kind.

/// Process-wide unique identifier for a fog node, puddle head, link or
/// the broker. Ids are allocated by the registry and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an entity ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
