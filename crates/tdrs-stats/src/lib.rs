//! Stat values and modifier stacking for the TDRS social simulation.
//!
//! A [`Stat`] owns a base value and an ordered list of [`StatModifier`]s and
//! lazily recomputes its derived value on read. A [`StatCollection`] groups
//! named stats for one owner (an entity or a relationship) and routes
//! modifiers to the stat they name.
//!
//! # Modules
//!
//! - [`modifier`] -- Immutable, sourced, optionally time-bounded adjustments
//! - [`stat`] -- Base value, bounds, ordered modifiers, memoized recompute
//! - [`collection`] -- Named stats keyed by stat name ([`StatCollection`])
//! - [`error`] -- Error types for stat operations ([`StatError`])

pub mod collection;
pub mod error;
pub mod modifier;
pub mod stat;

pub use collection::StatCollection;
pub use error::StatError;
pub use modifier::StatModifier;
pub use stat::Stat;
