//! Enumeration types for the TDRS social simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Modifier combination modes
// ---------------------------------------------------------------------------

/// How a stat modifier combines with the running value of its stat.
///
/// Each mode carries a default evaluation-order tier. Modifiers are applied
/// in ascending order, so with default orders every flat modifier resolves
/// before any percent-add block, and percent-add blocks resolve before any
/// percent-multiply modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatModifierType {
    /// Added to the running value immediately.
    Flat,
    /// Summed with adjacent percent-add modifiers, then applied once as `* (1 + sum)`.
    PercentAdd,
    /// Applied individually as `* (1 + value)`.
    PercentMultiply,
}

impl StatModifierType {
    /// Default evaluation-order tier for this combination mode.
    pub const fn default_order(self) -> i32 {
        match self {
            Self::Flat => 100,
            Self::PercentAdd => 200,
            Self::PercentMultiply => 300,
        }
    }

    /// Human-readable label for logs and descriptions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::PercentAdd => "percent_add",
            Self::PercentMultiply => "percent_multiply",
        }
    }
}

// ---------------------------------------------------------------------------
// Rule orientation
// ---------------------------------------------------------------------------

/// Which side of a relationship a social rule is evaluated against.
///
/// A rule held by entity `E` with [`Outgoing`](Self::Outgoing) orientation
/// applies to relationships owned by `E` (`E -> X`). With
/// [`Incoming`](Self::Incoming) it applies to relationships that target `E`
/// (`X -> E`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RuleOrientation {
    /// Applies to relationships where the holder is the owner.
    #[default]
    Outgoing,
    /// Applies to relationships where the holder is the target.
    Incoming,
}

impl RuleOrientation {
    /// Whether this orientation is [`Outgoing`](Self::Outgoing).
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Outgoing)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// What a trait definition may be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TraitKind {
    /// Held by entities (e.g. "honest", "greedy").
    Entity,
    /// Held by relationships (e.g. "rivals", "family").
    Relationship,
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// The object a precondition inspects or an effect mutates, resolved
/// relative to the rule target.
///
/// When the target is a relationship, [`Owner`](Self::Owner) and
/// [`Target`](Self::Target) name its endpoints. When the target is an
/// entity only [`This`](Self::This) is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Subject {
    /// The rule target itself (an entity or a relationship).
    #[default]
    This,
    /// The owner entity of the target relationship.
    Owner,
    /// The target entity of the target relationship.
    Target,
}

impl Subject {
    /// Human-readable label for descriptions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::This => "this",
            Self::Owner => "owner",
            Self::Target => "target",
        }
    }
}
