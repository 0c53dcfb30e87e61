//! Declarative schema structs shared between content loading and the engine.
//!
//! These are plain data: they describe stats and modifiers without owning
//! any runtime state. The stat engine turns a [`StatSchema`] into a live
//! stat and a [`StatModifierData`] into a sourced modifier. The social
//! engine instantiates entities and relationships from [`EntitySchema`] and
//! [`RelationshipSchema`].

use serde::{Deserialize, Serialize};

use crate::enums::StatModifierType;
use crate::ids::TraitId;

/// Describes how to construct a named stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSchema {
    /// Stat name, unique within its owner (e.g. `"Friendship"`).
    pub name: String,
    /// Initial base value.
    #[serde(default)]
    pub base_value: f64,
    /// Lower clamp bound for the derived value.
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    /// Upper clamp bound for the derived value.
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    /// Whether the derived value is floored to an integer after clamping.
    #[serde(default)]
    pub is_discrete: bool,
}

impl StatSchema {
    /// Create a continuous schema with the given bounds.
    pub fn new(name: impl Into<String>, base_value: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            name: name.into(),
            base_value,
            min_value,
            max_value,
            is_discrete: false,
        }
    }

    /// Mark the schema as discrete (integer-valued).
    #[must_use]
    pub const fn discrete(mut self) -> Self {
        self.is_discrete = true;
        self
    }
}

/// Declarative description of one stat modifier, before it has a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifierData {
    /// Name of the stat the modifier targets.
    pub stat: String,
    /// Magnitude. Percent modes use fractions (`0.2` = +20%).
    pub value: f64,
    /// Combination mode.
    pub modifier_type: StatModifierType,
    /// Explicit evaluation order; defaults to the mode's tier.
    #[serde(default)]
    pub order: Option<i32>,
    /// Remaining duration in ticks; `None` lasts until removed.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Human-readable reason shown in tooling.
    #[serde(default)]
    pub reason: String,
}

impl StatModifierData {
    /// Create modifier data with default order and unbounded duration.
    pub fn new(stat: impl Into<String>, value: f64, modifier_type: StatModifierType) -> Self {
        Self {
            stat: stat.into(),
            value,
            modifier_type,
            order: None,
            duration: None,
            reason: String::new(),
        }
    }

    /// The evaluation order this data resolves to.
    pub fn resolved_order(&self) -> i32 {
        self.order
            .unwrap_or_else(|| self.modifier_type.default_order())
    }
}

/// Template for creating entities of one kind (e.g. `"character"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity kind this schema creates.
    pub kind: String,
    /// Stats every entity of this kind starts with.
    #[serde(default)]
    pub stats: Vec<StatSchema>,
    /// Traits every entity of this kind starts with.
    #[serde(default)]
    pub traits: Vec<TraitId>,
}

impl EntitySchema {
    /// Create a schema with no stats or traits.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            stats: Vec::new(),
            traits: Vec::new(),
        }
    }
}

/// Template for creating relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    /// Stats every relationship starts with.
    #[serde(default)]
    pub stats: Vec<StatSchema>,
    /// Traits every relationship starts with.
    #[serde(default)]
    pub traits: Vec<TraitId>,
}

const fn default_min_value() -> f64 {
    f64::MIN
}

const fn default_max_value() -> f64 {
    f64::MAX
}
