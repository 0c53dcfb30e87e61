//! Type-safe identifier wrappers.
//!
//! Runtime objects (entities, relationships, rules, modifiers) get a
//! strongly-typed UUID v7 identifier so they cannot be mixed up at compile
//! time. Traits are authored in content, so their identifier is the
//! human-written string key instead.
//!
//! [`SourceId`] is the opaque provenance token attached to modifiers, trait
//! instances, and rule attachments. It is compared for equality only and
//! never resolved back to the object that produced it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an entity (agent or organization) in the social graph.
    EntityId
}

define_id! {
    /// Unique identifier for a directed relationship between two entities.
    RelationshipId
}

define_id! {
    /// Unique identifier for a social rule instance.
    RuleId
}

define_id! {
    /// Unique identifier for a single stat modifier, used for removal by identity.
    ModifierId
}

define_id! {
    /// Opaque provenance token for modifiers, trait instances, and rule attachments.
    SourceId
}

impl From<RuleId> for SourceId {
    fn from(id: RuleId) -> Self {
        Self(id.0)
    }
}

/// Content identifier for a trait definition (e.g. `"friendly"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitId(pub String);

impl TraitId {
    /// Create a trait identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TraitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraitId {
    fn from(id: &str) -> Self {
        Self(String::from(id))
    }
}
