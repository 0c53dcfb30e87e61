//! Error types for the tdrs-social crate.
//!
//! Lookups that callers expect to fail have `try_` forms returning
//! [`Option`]; everything else reports a typed error. Content mistakes (an
//! unknown trait, a subject that cannot be resolved for a target) surface
//! here rather than being skipped, because a silently skipped effect would
//! corrupt every stat computed downstream.

use tdrs_stats::StatError;
use tdrs_types::{EntityId, RelationshipId, Subject, TraitId, TraitKind};

use crate::target::RuleTarget;

/// Errors that can occur during social graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// Entity with the given ID does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Relationship with the given ID does not exist.
    #[error("relationship not found: {0}")]
    RelationshipNotFound(RelationshipId),

    /// No relationship exists from `owner` to `target`.
    #[error("no relationship from {owner} to {target}")]
    NoRelationship {
        /// The would-be owner.
        owner: EntityId,
        /// The would-be target.
        target: EntityId,
    },

    /// A relationship from `owner` to `target` already exists.
    #[error("relationship from {owner} to {target} already exists")]
    DuplicateRelationship {
        /// The owner entity.
        owner: EntityId,
        /// The target entity.
        target: EntityId,
    },

    /// An entity cannot have a relationship with itself.
    #[error("entity {0} cannot have a relationship with itself")]
    SelfRelationship(EntityId),

    /// No schema is registered for the entity kind.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// A schema for the entity kind is already registered.
    #[error("duplicate entity kind: {0}")]
    DuplicateEntityKind(String),

    /// No trait definition exists with the given ID.
    #[error("trait not found: {0}")]
    TraitNotFound(TraitId),

    /// A trait definition with the given ID is already registered.
    #[error("duplicate trait definition: {0}")]
    DuplicateTrait(TraitId),

    /// The trait cannot be held by this kind of target.
    #[error("trait {trait_id} is a {expected:?} trait and cannot be added to {target}")]
    WrongTraitKind {
        /// The trait being added.
        trait_id: TraitId,
        /// The kind the trait is defined for.
        expected: TraitKind,
        /// The target it was added to.
        target: RuleTarget,
    },

    /// The target already holds a trait that conflicts with the new one.
    #[error("trait {trait_id} conflicts with held trait {conflicts_with}")]
    TraitConflict {
        /// The trait being added.
        trait_id: TraitId,
        /// The held trait it conflicts with.
        conflicts_with: TraitId,
    },

    /// The subject cannot be resolved against the target.
    #[error("subject {subject:?} cannot be resolved against {target}")]
    InvalidSubject {
        /// The subject that was requested.
        subject: Subject,
        /// The target it was resolved against.
        target: RuleTarget,
    },

    /// Rule re-evaluation kept scheduling more work past the pass limit.
    ///
    /// This indicates content whose rules keep toggling each other.
    #[error("rule re-evaluation exceeded {limit} passes")]
    CascadeLimit {
        /// The configured pass limit.
        limit: u32,
    },

    /// An opinion rule definition was rejected.
    #[error("invalid opinion rule: {reason}")]
    InvalidOpinionRule {
        /// Description of why the rule was rejected.
        reason: String,
    },

    /// A stat operation failed.
    #[error("stat error: {source}")]
    Stat {
        /// The underlying stat error.
        #[from]
        source: StatError,
    },
}
