//! Error types for the tdrs-stats crate.
//!
//! Recomputing a stat never fails. Errors arise only from non-finite or
//! inverted inputs and from looking up a stat that does not exist.

/// Errors that can occur during stat construction and lookup.
#[derive(Debug, thiserror::Error)]
pub enum StatError {
    /// No stat with the given name exists in the collection.
    #[error("stat not found: {0}")]
    NotFound(String),

    /// A stat with the given name already exists in the collection.
    #[error("duplicate stat: {0}")]
    DuplicateStat(String),

    /// The lower bound is greater than the upper bound.
    #[error("invalid stat bounds: min {min} is greater than max {max}")]
    InvalidBounds {
        /// The requested lower bound.
        min: f64,
        /// The requested upper bound.
        max: f64,
    },

    /// A stat value was NaN or infinite.
    #[error("stat {field} must be finite")]
    NotFinite {
        /// Which value was rejected (`"base_value"`, `"min_value"`, `"max_value"`).
        field: &'static str,
    },

    /// A modifier value was NaN or infinite.
    #[error("modifier for stat {stat} has non-finite value {value}")]
    NonFiniteModifier {
        /// The stat the modifier targets.
        stat: String,
        /// The rejected value.
        value: f64,
    },

    /// A schema could not be turned into a stat.
    #[error("invalid schema for stat {name}: {source}")]
    InvalidSchema {
        /// The schema's stat name.
        name: String,
        /// Why the schema was rejected.
        source: Box<Self>,
    },
}
