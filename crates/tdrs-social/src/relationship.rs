//! Directed relationship edges.
//!
//! A [`Relationship`] runs from an owner to a target and has its own stats
//! and traits (the owner's feelings about the target, not the reverse). It
//! also records which social rules are currently applied to it, so the
//! engine can retract exactly those rules later.

use std::sync::Arc;

use tdrs_stats::StatCollection;
use tdrs_types::{EntityId, RelationshipId, RuleId, SourceId};

use crate::rule::SocialRule;
use crate::traits::TraitCollection;

/// One application of a rule to one relationship.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    /// The applied rule.
    pub rule: Arc<SocialRule>,
    /// Source token carried by everything this application created.
    pub source: SourceId,
}

/// A directed edge from `owner` to `target`.
#[derive(Debug, Clone)]
pub struct Relationship {
    id: RelationshipId,
    owner: EntityId,
    target: EntityId,
    pub(crate) stats: StatCollection,
    pub(crate) traits: TraitCollection,
    /// Rules whose effects are currently applied, in application order.
    pub(crate) active_rules: Vec<AppliedRule>,
}

impl Relationship {
    pub(crate) const fn new(
        id: RelationshipId,
        owner: EntityId,
        target: EntityId,
        stats: StatCollection,
    ) -> Self {
        Self {
            id,
            owner,
            target,
            stats,
            traits: TraitCollection::new(),
            active_rules: Vec::new(),
        }
    }

    /// Unique identity.
    pub const fn id(&self) -> RelationshipId {
        self.id
    }

    /// The entity that owns this edge.
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// The entity this edge points at.
    pub const fn target(&self) -> EntityId {
        self.target
    }

    /// The relationship's stats.
    pub const fn stats(&self) -> &StatCollection {
        &self.stats
    }

    /// The traits the relationship holds.
    pub const fn traits(&self) -> &TraitCollection {
        &self.traits
    }

    /// Rules currently applied, in application order.
    pub fn active_rules(&self) -> &[AppliedRule] {
        &self.active_rules
    }

    /// Whether the given rule is currently applied.
    pub fn is_rule_active(&self, rule_id: RuleId) -> bool {
        self.active_rules.iter().any(|a| a.rule.id() == rule_id)
    }
}
