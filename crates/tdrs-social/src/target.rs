//! Targets that rules, preconditions, and effects are evaluated against.

use tdrs_types::{EntityId, RelationshipId};

/// A node or edge of the social graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleTarget {
    /// An entity node.
    Entity(EntityId),
    /// A relationship edge.
    Relationship(RelationshipId),
}

impl core::fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity {id}"),
            Self::Relationship(id) => write!(f, "relationship {id}"),
        }
    }
}

impl From<EntityId> for RuleTarget {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<RelationshipId> for RuleTarget {
    fn from(id: RelationshipId) -> Self {
        Self::Relationship(id)
    }
}
