//! Shared type definitions for the TDRS social simulation.
//!
//! This crate is the single source of truth for the identifiers, enums,
//! and content schema structs used across the workspace. It carries no
//! behavior beyond small helpers on the types themselves.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers and the string-keyed [`TraitId`]
//! - [`enums`] -- Modifier combination modes, rule orientation, trait kinds
//! - [`structs`] -- Stat, entity, and relationship schemas and modifier data

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{RuleOrientation, StatModifierType, Subject, TraitKind};
pub use ids::{EntityId, ModifierId, RelationshipId, RuleId, SourceId, TraitId};
pub use structs::{EntitySchema, RelationshipSchema, StatModifierData, StatSchema};
