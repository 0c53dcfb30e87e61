//! Entities, relationships, traits, and social rules for TDRS.
//!
//! This crate is the rule-application layer of the simulation. It owns the
//! social graph ([`SocialEngine`]) and everything that reads or mutates it:
//! trait definitions, preconditions, effects, and the social rules that
//! bundle them. Stat arithmetic is delegated to `tdrs-stats`.
//!
//! # Modules
//!
//! - [`effect`] -- Reversible mutators applied by rules and traits ([`Effect`])
//! - [`engine`] -- The social graph manager and rule reconciliation ([`SocialEngine`])
//! - [`entity`] -- Entity nodes and their attached rules ([`Entity`])
//! - [`error`] -- Error types for social operations ([`SocialError`])
//! - [`opinion`] -- Trait-driven opinions of one entity about another
//! - [`precondition`] -- Pure predicates gating rules ([`Precondition`])
//! - [`relationship`] -- Directed edges with their own stats ([`Relationship`])
//! - [`rule`] -- Precondition-gated effect bundles ([`SocialRule`])
//! - [`target`] -- What a rule, precondition, or effect is evaluated against
//! - [`traits`] -- Trait definitions, the trait library, and held traits

pub mod effect;
pub mod engine;
pub mod entity;
pub mod error;
pub mod opinion;
pub mod precondition;
pub mod relationship;
pub mod rule;
pub mod target;
pub mod traits;

pub use effect::Effect;
pub use engine::{EngineSettings, RuleActivity, SocialEngine, TickReport};
pub use entity::{Entity, RuleAttachment};
pub use error::SocialError;
pub use opinion::{Opinion, OpinionContribution, OpinionRule, OpinionSystem, SharedTraitBonus};
pub use precondition::Precondition;
pub use relationship::{AppliedRule, Relationship};
pub use rule::SocialRule;
pub use target::RuleTarget;
pub use traits::{HeldTrait, TraitCollection, TraitDefinition, TraitLibrary};
