//! Entity nodes of the social graph.
//!
//! An [`Entity`] owns its stats and traits, the social rules attached to it,
//! and the IDs of the relationships it participates in. Mutation goes
//! through the [`SocialEngine`] so that rule re-evaluation is never skipped;
//! this module only exposes read access plus crate-internal bookkeeping.
//!
//! [`SocialEngine`]: crate::SocialEngine

use std::collections::BTreeSet;
use std::sync::Arc;

use tdrs_stats::StatCollection;
use tdrs_types::{EntityId, RelationshipId, RuleId, RuleOrientation, SourceId};

use crate::rule::SocialRule;
use crate::traits::TraitCollection;

/// A social rule attached to an entity, with the source that attached it.
#[derive(Debug, Clone)]
pub struct RuleAttachment {
    /// The attached rule.
    pub rule: Arc<SocialRule>,
    /// Who attached it, or `None` for direct attachment by the caller.
    pub source: Option<SourceId>,
}

/// An agent or organization in the social graph.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: String,
    pub(crate) stats: StatCollection,
    pub(crate) traits: TraitCollection,
    pub(crate) rules: Vec<RuleAttachment>,
    pub(crate) outgoing: BTreeSet<RelationshipId>,
    pub(crate) incoming: BTreeSet<RelationshipId>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, kind: String, stats: StatCollection) -> Self {
        Self {
            id,
            kind,
            stats,
            traits: TraitCollection::new(),
            rules: Vec::new(),
            outgoing: BTreeSet::new(),
            incoming: BTreeSet::new(),
        }
    }

    /// Unique identity.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The schema kind this entity was created from.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The entity's stats.
    pub const fn stats(&self) -> &StatCollection {
        &self.stats
    }

    /// The traits the entity holds.
    pub const fn traits(&self) -> &TraitCollection {
        &self.traits
    }

    /// Every social rule attachment, in attachment order.
    pub fn rule_attachments(&self) -> &[RuleAttachment] {
        &self.rules
    }

    /// Whether any attachment of the given rule exists.
    pub fn has_rule(&self, rule_id: RuleId) -> bool {
        self.rules.iter().any(|a| a.rule.id() == rule_id)
    }

    /// Attached rules with the given orientation, deduplicated by rule ID.
    pub fn rules_with_orientation(
        &self,
        orientation: RuleOrientation,
    ) -> impl Iterator<Item = &Arc<SocialRule>> {
        let mut seen = BTreeSet::new();
        self.rules
            .iter()
            .filter(move |a| a.rule.orientation() == orientation && seen.insert(a.rule.id()))
            .map(|a| &a.rule)
    }

    /// Relationships this entity owns.
    pub const fn outgoing_relationships(&self) -> &BTreeSet<RelationshipId> {
        &self.outgoing
    }

    /// Relationships that target this entity.
    pub const fn incoming_relationships(&self) -> &BTreeSet<RelationshipId> {
        &self.incoming
    }

    /// Relationships on the side a rule of this orientation applies to.
    pub(crate) const fn relationships_for(
        &self,
        orientation: RuleOrientation,
    ) -> &BTreeSet<RelationshipId> {
        match orientation {
            RuleOrientation::Outgoing => &self.outgoing,
            RuleOrientation::Incoming => &self.incoming,
        }
    }
}
