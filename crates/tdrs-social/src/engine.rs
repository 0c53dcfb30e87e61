//! The social graph manager.
//!
//! [`SocialEngine`] owns every entity and relationship, the trait library,
//! and the schemas used to build new nodes and edges. It is also the only
//! place social rules are matched: whenever something a precondition could
//! read changes (stats, traits, attached rules), the affected relationships
//! are queued and reconciled before the public operation returns.
//!
//! Reconciling one relationship:
//!
//! 1. Collect the candidate rules: the owner's outgoing rules plus the
//!    target's incoming rules, deduplicated by rule ID.
//! 2. Retract every active rule that is no longer a candidate or whose
//!    preconditions no longer hold.
//! 3. Apply every candidate that is not active and whose preconditions hold.
//!
//! Applying or retracting a rule can queue more relationships (including the
//! same one). The queue is drained until empty, bounded by
//! [`EngineSettings::max_cascade_passes`] so content whose rules toggle each
//! other fails with [`SocialError::CascadeLimit`] instead of looping.
//!
//! Effects use the crate-internal mutators on this type, which queue work
//! but never drain the queue, so one public call performs exactly one drain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tdrs_stats::{StatCollection, StatModifier};
use tdrs_types::{
    EntityId, EntitySchema, ModifierId, RelationshipId, RelationshipSchema, RuleId,
    RuleOrientation, SourceId, Subject, TraitId, TraitKind,
};
use tracing::{debug, warn};

use crate::effect;
use crate::entity::{Entity, RuleAttachment};
use crate::error::SocialError;
use crate::relationship::{AppliedRule, Relationship};
use crate::rule::SocialRule;
use crate::target::RuleTarget;
use crate::traits::{HeldTrait, TraitCollection, TraitDefinition, TraitLibrary};

/// Default bound on relationship reconciliations per drain.
pub const DEFAULT_MAX_CASCADE_PASSES: u32 = 10_000;

// ---------------------------------------------------------------------------
// Settings and reports
// ---------------------------------------------------------------------------

/// Tunables for rule re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Re-evaluate every relationship at the end of each tick, not only the
    /// ones whose inputs changed.
    pub reevaluate_rules_on_tick: bool,
    /// Maximum relationship reconciliations in one drain of the queue.
    pub max_cascade_passes: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reevaluate_rules_on_tick: true,
            max_cascade_passes: DEFAULT_MAX_CASCADE_PASSES,
        }
    }
}

/// Running totals of rule applications and retractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActivity {
    /// Rules applied to a relationship.
    pub applied: u64,
    /// Rules retracted from a relationship.
    pub removed: u64,
}

/// What happened during one [`SocialEngine::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Stat modifiers whose duration ran out.
    pub expired_modifiers: usize,
    /// Held traits whose duration ran out.
    pub expired_traits: usize,
    /// Rules applied while settling the tick.
    pub rules_applied: u64,
    /// Rules retracted while settling the tick.
    pub rules_removed: u64,
}

// ---------------------------------------------------------------------------
// SocialEngine
// ---------------------------------------------------------------------------

/// Owner of the social graph and the rule reconciliation loop.
#[derive(Debug, Clone)]
pub struct SocialEngine {
    settings: EngineSettings,
    traits: TraitLibrary,
    entity_schemas: BTreeMap<String, EntitySchema>,
    relationship_schema: RelationshipSchema,
    entities: BTreeMap<EntityId, Entity>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    /// `(owner, target)` to edge, enforcing one edge per ordered pair.
    edges: BTreeMap<(EntityId, EntityId), RelationshipId>,
    /// Relationships waiting to be reconciled.
    pending: BTreeSet<RelationshipId>,
    activity: RuleActivity,
}

impl Default for SocialEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialEngine {
    /// Create an empty engine with default settings.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// Create an empty engine with the given settings.
    pub const fn with_settings(settings: EngineSettings) -> Self {
        Self {
            settings,
            traits: TraitLibrary::new(),
            entity_schemas: BTreeMap::new(),
            relationship_schema: RelationshipSchema {
                stats: Vec::new(),
                traits: Vec::new(),
            },
            entities: BTreeMap::new(),
            relationships: BTreeMap::new(),
            edges: BTreeMap::new(),
            pending: BTreeSet::new(),
            activity: RuleActivity {
                applied: 0,
                removed: 0,
            },
        }
    }

    /// Current settings.
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Running totals of rule applications and retractions.
    pub const fn activity(&self) -> RuleActivity {
        self.activity
    }

    // -----------------------------------------------------------------------
    // Content registration
    // -----------------------------------------------------------------------

    /// Register a trait definition.
    pub fn add_trait_definition(&mut self, definition: TraitDefinition) -> Result<(), SocialError> {
        let id = definition.id.clone();
        let kind = definition.kind;
        self.traits.add(definition)?;
        debug!(trait_id = %id, kind = ?kind, "Trait definition registered");
        Ok(())
    }

    /// The registered trait definitions.
    pub const fn trait_library(&self) -> &TraitLibrary {
        &self.traits
    }

    /// Register the schema used by [`add_entity`](Self::add_entity) for `schema.kind`.
    ///
    /// The stat schemas are validated and every default trait must exist.
    pub fn add_entity_schema(&mut self, schema: EntitySchema) -> Result<(), SocialError> {
        if self.entity_schemas.contains_key(&schema.kind) {
            return Err(SocialError::DuplicateEntityKind(schema.kind));
        }
        StatCollection::from_schemas(&schema.stats)?;
        for trait_id in &schema.traits {
            self.traits.require(trait_id)?;
        }
        debug!(kind = schema.kind.as_str(), stats = schema.stats.len(), "Entity schema registered");
        self.entity_schemas.insert(schema.kind.clone(), schema);
        Ok(())
    }

    /// The schema registered for an entity kind.
    pub fn entity_schema(&self, kind: &str) -> Option<&EntitySchema> {
        self.entity_schemas.get(kind)
    }

    /// Replace the schema used for new relationships.
    pub fn set_relationship_schema(&mut self, schema: RelationshipSchema) -> Result<(), SocialError> {
        StatCollection::from_schemas(&schema.stats)?;
        for trait_id in &schema.traits {
            self.traits.require(trait_id)?;
        }
        self.relationship_schema = schema;
        Ok(())
    }

    /// The schema used for new relationships.
    pub const fn relationship_schema(&self) -> &RelationshipSchema {
        &self.relationship_schema
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create an entity from the schema registered for `kind`.
    ///
    /// Stats are built from the schema and default traits are added with
    /// their effects.
    pub fn add_entity(&mut self, kind: &str) -> Result<EntityId, SocialError> {
        let schema = self
            .entity_schemas
            .get(kind)
            .ok_or_else(|| SocialError::UnknownEntityKind(String::from(kind)))?;
        let stats = StatCollection::from_schemas(&schema.stats)?;
        let defaults = schema.traits.clone();

        let id = EntityId::new();
        self.entities
            .insert(id, Entity::new(id, String::from(kind), stats));

        let target = RuleTarget::Entity(id);
        for trait_id in &defaults {
            if let Err(err) = self.grant_trait(target, trait_id, None, None) {
                self.entities.remove(&id);
                return Err(err);
            }
        }

        debug!(entity_id = %id, kind, "Entity added");
        self.flush()?;
        Ok(id)
    }

    /// Look up an entity.
    pub fn get_entity(&self, id: EntityId) -> Result<&Entity, SocialError> {
        self.entities
            .get(&id)
            .ok_or(SocialError::EntityNotFound(id))
    }

    /// Look up an entity, returning `None` when absent.
    pub fn try_get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Iterate over entities in ID order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Remove an entity and every relationship it takes part in.
    ///
    /// Rules applied to those relationships are retracted first, so effects
    /// they placed on other entities are undone. Returns `false` if the
    /// entity does not exist.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<bool, SocialError> {
        let Some(entity) = self.entities.get(&id) else {
            return Ok(false);
        };
        let edges: Vec<RelationshipId> = entity
            .outgoing
            .iter()
            .chain(&entity.incoming)
            .copied()
            .collect();

        let mut first_error = None;
        for relationship in edges {
            if let Err(err) = self.unlink_relationship(relationship) {
                first_error.get_or_insert(err);
            }
        }
        self.entities.remove(&id);
        debug!(entity_id = %id, "Entity removed");

        if let Some(err) = first_error {
            return Err(err);
        }
        self.flush()?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    /// Create the directed relationship `owner -> target`.
    ///
    /// Default relationship traits are added, then the owner's outgoing and
    /// the target's incoming rules are evaluated against the new edge. When
    /// that evaluation fails the edge is discarded before the error returns.
    pub fn add_relationship(
        &mut self,
        owner: EntityId,
        target: EntityId,
    ) -> Result<RelationshipId, SocialError> {
        if owner == target {
            return Err(SocialError::SelfRelationship(owner));
        }
        self.get_entity(owner)?;
        self.get_entity(target)?;
        if self.edges.contains_key(&(owner, target)) {
            return Err(SocialError::DuplicateRelationship { owner, target });
        }

        let stats = StatCollection::from_schemas(&self.relationship_schema.stats)?;
        let id = RelationshipId::new();
        self.relationships
            .insert(id, Relationship::new(id, owner, target, stats));
        self.edges.insert((owner, target), id);
        if let Some(entity) = self.entities.get_mut(&owner) {
            entity.outgoing.insert(id);
        }
        if let Some(entity) = self.entities.get_mut(&target) {
            entity.incoming.insert(id);
        }

        let defaults = self.relationship_schema.traits.clone();
        let edge = RuleTarget::Relationship(id);
        for trait_id in &defaults {
            if let Err(err) = self.grant_trait(edge, trait_id, None, None) {
                if let Err(cleanup) = self.unlink_relationship(id) {
                    warn!(relationship_id = %id, error = %cleanup, "Failed to discard relationship");
                }
                return Err(err);
            }
        }

        self.pending.insert(id);
        if let Err(err) = self.flush() {
            // The edge never settled, so it is taken out again.
            if let Err(cleanup) = self.unlink_relationship(id) {
                warn!(relationship_id = %id, error = %cleanup, "Failed to discard relationship");
            }
            if let Err(cleanup) = self.flush() {
                warn!(relationship_id = %id, error = %cleanup, "Failed to settle after discarding relationship");
            }
            return Err(err);
        }
        debug!(relationship_id = %id, %owner, %target, "Relationship added");
        Ok(id)
    }

    /// The relationship `owner -> target`.
    pub fn get_relationship(
        &self,
        owner: EntityId,
        target: EntityId,
    ) -> Result<&Relationship, SocialError> {
        self.try_get_relationship(owner, target)
            .ok_or(SocialError::NoRelationship { owner, target })
    }

    /// The relationship `owner -> target`, or `None` when absent.
    pub fn try_get_relationship(&self, owner: EntityId, target: EntityId) -> Option<&Relationship> {
        self.edges
            .get(&(owner, target))
            .and_then(|id| self.relationships.get(id))
    }

    /// Whether `owner -> target` exists.
    pub fn has_relationship(&self, owner: EntityId, target: EntityId) -> bool {
        self.edges.contains_key(&(owner, target))
    }

    /// Look up a relationship by identity.
    pub fn get_relationship_by_id(&self, id: RelationshipId) -> Result<&Relationship, SocialError> {
        self.relationships
            .get(&id)
            .ok_or(SocialError::RelationshipNotFound(id))
    }

    /// Iterate over relationships in ID order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Number of relationships.
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Remove `owner -> target`, retracting its applied rules and traits first.
    ///
    /// Returns `false` if there is no such relationship.
    pub fn remove_relationship(
        &mut self,
        owner: EntityId,
        target: EntityId,
    ) -> Result<bool, SocialError> {
        let Some(&id) = self.edges.get(&(owner, target)) else {
            return Ok(false);
        };
        self.unlink_relationship(id)?;
        debug!(relationship_id = %id, %owner, %target, "Relationship removed");
        self.flush()?;
        Ok(true)
    }

    /// Retract everything applied to a relationship and drop it.
    ///
    /// The edge is removed even when a retraction fails; the first failure
    /// is returned afterwards.
    fn unlink_relationship(&mut self, id: RelationshipId) -> Result<bool, SocialError> {
        let Some(relationship) = self.relationships.get(&id) else {
            return Ok(false);
        };
        let active: Vec<AppliedRule> = relationship.active_rules.iter().rev().cloned().collect();
        let held: Vec<TraitId> = relationship.traits.ids().cloned().collect();
        let edge = RuleTarget::Relationship(id);

        let mut first_error = None;
        for applied in &active {
            if let Err(err) = self.retract(id, applied) {
                warn!(relationship_id = %id, rule_id = %applied.rule.id(), error = %err, "Failed to retract rule");
                first_error.get_or_insert(err);
            }
        }
        for trait_id in &held {
            if let Err(err) = self.revoke_trait(edge, trait_id, None) {
                warn!(relationship_id = %id, trait_id = %trait_id, error = %err, "Failed to remove trait");
                first_error.get_or_insert(err);
            }
        }

        if let Some(relationship) = self.relationships.remove(&id) {
            self.edges
                .remove(&(relationship.owner(), relationship.target()));
            if let Some(owner) = self.entities.get_mut(&relationship.owner()) {
                owner.outgoing.remove(&id);
            }
            if let Some(target) = self.entities.get_mut(&relationship.target()) {
                target.incoming.remove(&id);
            }
        }
        self.pending.remove(&id);

        first_error.map_or(Ok(true), Err)
    }

    // -----------------------------------------------------------------------
    // Targets and subjects
    // -----------------------------------------------------------------------

    /// Resolve a subject relative to `target`.
    ///
    /// [`Subject::This`] is the target itself. [`Subject::Owner`] and
    /// [`Subject::Target`] are the endpoints of a relationship target and
    /// are invalid against an entity target.
    pub fn resolve_subject(
        &self,
        target: RuleTarget,
        subject: Subject,
    ) -> Result<RuleTarget, SocialError> {
        match (subject, target) {
            (Subject::This, _) => Ok(target),
            (Subject::Owner, RuleTarget::Relationship(id)) => {
                Ok(RuleTarget::Entity(self.get_relationship_by_id(id)?.owner()))
            }
            (Subject::Target, RuleTarget::Relationship(id)) => {
                Ok(RuleTarget::Entity(self.get_relationship_by_id(id)?.target()))
            }
            (Subject::Owner | Subject::Target, RuleTarget::Entity(_)) => {
                Err(SocialError::InvalidSubject { subject, target })
            }
        }
    }

    /// The stats of an entity or relationship.
    pub fn stats_of(&self, target: RuleTarget) -> Result<&StatCollection, SocialError> {
        match target {
            RuleTarget::Entity(id) => self.get_entity(id).map(Entity::stats),
            RuleTarget::Relationship(id) => self.get_relationship_by_id(id).map(Relationship::stats),
        }
    }

    /// The traits held by an entity or relationship.
    pub fn traits_of(&self, target: RuleTarget) -> Result<&TraitCollection, SocialError> {
        match target {
            RuleTarget::Entity(id) => self.get_entity(id).map(Entity::traits),
            RuleTarget::Relationship(id) => {
                self.get_relationship_by_id(id).map(Relationship::traits)
            }
        }
    }

    /// Whether `target` holds the trait.
    ///
    /// The trait must be defined in the library.
    pub fn has_trait(&self, target: RuleTarget, trait_id: &TraitId) -> Result<bool, SocialError> {
        self.traits.require(trait_id)?;
        Ok(self.traits_of(target)?.contains(trait_id))
    }

    fn stats_mut(&mut self, target: RuleTarget) -> Result<&mut StatCollection, SocialError> {
        match target {
            RuleTarget::Entity(id) => self
                .entities
                .get_mut(&id)
                .map(|e| &mut e.stats)
                .ok_or(SocialError::EntityNotFound(id)),
            RuleTarget::Relationship(id) => self
                .relationships
                .get_mut(&id)
                .map(|r| &mut r.stats)
                .ok_or(SocialError::RelationshipNotFound(id)),
        }
    }

    fn traits_mut(&mut self, target: RuleTarget) -> Result<&mut TraitCollection, SocialError> {
        match target {
            RuleTarget::Entity(id) => self
                .entities
                .get_mut(&id)
                .map(|e| &mut e.traits)
                .ok_or(SocialError::EntityNotFound(id)),
            RuleTarget::Relationship(id) => self
                .relationships
                .get_mut(&id)
                .map(|r| &mut r.traits)
                .ok_or(SocialError::RelationshipNotFound(id)),
        }
    }

    /// Queue every relationship whose preconditions could read `target`.
    fn mark_dirty(&mut self, target: RuleTarget) {
        match target {
            RuleTarget::Relationship(id) => {
                self.pending.insert(id);
            }
            RuleTarget::Entity(id) => {
                if let Some(entity) = self.entities.get(&id) {
                    self.pending
                        .extend(entity.outgoing.iter().chain(&entity.incoming).copied());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Replace the base value of a stat.
    ///
    /// A NaN or infinite `value` is rejected and nothing is re-evaluated.
    pub fn set_base_value(
        &mut self,
        target: RuleTarget,
        stat: &str,
        value: f64,
    ) -> Result<(), SocialError> {
        self.stats_mut(target)?.get_stat_mut(stat)?.set_base_value(value)?;
        self.mark_dirty(target);
        self.flush()
    }

    /// Attach a modifier to `target`.
    pub fn add_modifier(
        &mut self,
        target: RuleTarget,
        modifier: StatModifier,
    ) -> Result<ModifierId, SocialError> {
        let id = self.attach_modifier(target, modifier)?;
        self.flush()?;
        Ok(id)
    }

    /// Remove a modifier from `target` by identity.
    pub fn remove_modifier(&mut self, target: RuleTarget, id: ModifierId) -> Result<bool, SocialError> {
        let removed = self.stats_mut(target)?.remove_modifier(id);
        if removed {
            self.mark_dirty(target);
            self.flush()?;
        }
        Ok(removed)
    }

    /// Remove every modifier created by `source` from `target`.
    pub fn remove_modifiers_from_source(
        &mut self,
        target: RuleTarget,
        source: SourceId,
    ) -> Result<bool, SocialError> {
        let removed = self.stats_mut(target)?.remove_modifiers_from_source(source);
        if removed {
            self.mark_dirty(target);
            self.flush()?;
        }
        Ok(removed)
    }

    pub(crate) fn attach_modifier(
        &mut self,
        target: RuleTarget,
        modifier: StatModifier,
    ) -> Result<ModifierId, SocialError> {
        let id = self.stats_mut(target)?.add_modifier(modifier)?;
        self.mark_dirty(target);
        Ok(id)
    }

    pub(crate) fn detach_stat_modifiers(
        &mut self,
        target: RuleTarget,
        stat: &str,
        source: SourceId,
    ) -> Result<bool, SocialError> {
        let removed = self
            .stats_mut(target)?
            .get_stat_mut(stat)?
            .remove_modifiers_from_source(source);
        if removed {
            self.mark_dirty(target);
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Traits
    // -----------------------------------------------------------------------

    /// Give `target` a trait, optionally for a limited number of ticks.
    ///
    /// Returns `false` if the trait is already held; a `source` given then is
    /// recorded as one more claim on the held instance. The trait's effects
    /// are applied with the new instance's own source.
    pub fn add_trait(
        &mut self,
        target: RuleTarget,
        trait_id: &TraitId,
        duration: Option<u32>,
        source: Option<SourceId>,
    ) -> Result<bool, SocialError> {
        let added = self.grant_trait(target, trait_id, duration, source)?;
        self.flush()?;
        Ok(added)
    }

    /// Remove a held trait and its effects.
    ///
    /// Returns `false` if the trait is not held.
    pub fn remove_trait(&mut self, target: RuleTarget, trait_id: &TraitId) -> Result<bool, SocialError> {
        let removed = self.revoke_trait(target, trait_id, None)?;
        self.flush()?;
        Ok(removed)
    }

    /// Drop `source`'s claim on a held trait, removing the trait once no
    /// claim remains.
    ///
    /// Returns `true` only when the trait was removed.
    pub fn remove_trait_from_source(
        &mut self,
        target: RuleTarget,
        trait_id: &TraitId,
        source: SourceId,
    ) -> Result<bool, SocialError> {
        let removed = self.revoke_trait(target, trait_id, Some(source))?;
        self.flush()?;
        Ok(removed)
    }

    pub(crate) fn grant_trait(
        &mut self,
        target: RuleTarget,
        trait_id: &TraitId,
        duration: Option<u32>,
        source: Option<SourceId>,
    ) -> Result<bool, SocialError> {
        let definition = Arc::clone(self.traits.get(trait_id)?);
        let holder_kind = match target {
            RuleTarget::Entity(_) => TraitKind::Entity,
            RuleTarget::Relationship(_) => TraitKind::Relationship,
        };
        if definition.kind != holder_kind {
            return Err(SocialError::WrongTraitKind {
                trait_id: trait_id.clone(),
                expected: definition.kind,
                target,
            });
        }

        if self.traits_of(target)?.contains(trait_id) {
            // Another grant of a held trait becomes a claim on the instance.
            if let (Some(source), Some(entry)) = (source, self.traits_mut(target)?.get_mut(trait_id)) {
                entry.share(source, duration);
            }
            return Ok(false);
        }
        let held = self.traits_of(target)?;
        if let Some(conflict) = held
            .ids()
            .find(|other| self.traits.conflicts(trait_id, other))
        {
            return Err(SocialError::TraitConflict {
                trait_id: trait_id.clone(),
                conflicts_with: conflict.clone(),
            });
        }

        let fresh = HeldTrait::new(duration, source);
        let instance = fresh.instance;
        self.traits_mut(target)?.insert(trait_id.clone(), fresh);
        if let Err(err) = effect::apply_all(&definition.effects, self, target, instance) {
            self.traits_mut(target)?.remove(trait_id);
            return Err(err);
        }

        self.mark_dirty(target);
        debug!(rule_target = %target, trait_id = %trait_id, ?duration, "Trait added");
        Ok(true)
    }

    /// Remove a held trait. With `only_from`, only that source's claim is
    /// dropped, and the trait goes once no source claims it.
    pub(crate) fn revoke_trait(
        &mut self,
        target: RuleTarget,
        trait_id: &TraitId,
        only_from: Option<SourceId>,
    ) -> Result<bool, SocialError> {
        let Some(held) = self.traits_of(target)?.get(trait_id).cloned() else {
            return Ok(false);
        };
        let last_claim = match only_from {
            Some(source) => self.traits_mut(target)?.release(trait_id, source),
            None => true,
        };
        if !last_claim {
            return Ok(false);
        }

        self.traits_mut(target)?.remove(trait_id);
        let result = match self.traits.try_get(trait_id).map(Arc::clone) {
            Some(definition) => effect::remove_all(&definition.effects, self, target, held.instance),
            None => Ok(()),
        };
        self.mark_dirty(target);
        debug!(rule_target = %target, trait_id = %trait_id, "Trait removed");
        result.map(|()| true)
    }

    // -----------------------------------------------------------------------
    // Social rules
    // -----------------------------------------------------------------------

    /// Attach a rule to an entity.
    ///
    /// `source` identifies who attached it so the attachment can later be
    /// removed with [`remove_all_social_rules_from_source`](Self::remove_all_social_rules_from_source).
    pub fn add_social_rule(
        &mut self,
        entity: EntityId,
        rule: Arc<SocialRule>,
        source: Option<SourceId>,
    ) -> Result<(), SocialError> {
        self.attach_rule(entity, rule, source)?;
        self.flush()
    }

    /// Detach every attachment of a rule from an entity.
    ///
    /// The rule is retracted from every relationship it was applied to
    /// through this entity. Returns `false` if it was not attached.
    pub fn remove_social_rule(&mut self, entity: EntityId, rule_id: RuleId) -> Result<bool, SocialError> {
        let removed = self.detach_rules_where(entity, |a| a.rule.id() == rule_id)?;
        self.flush()?;
        Ok(removed)
    }

    /// Detach every rule `source` attached to an entity.
    pub fn remove_all_social_rules_from_source(
        &mut self,
        entity: EntityId,
        source: SourceId,
    ) -> Result<bool, SocialError> {
        let removed = self.detach_rules_from_source(entity, source)?;
        self.flush()?;
        Ok(removed)
    }

    pub(crate) fn attach_rule(
        &mut self,
        entity: EntityId,
        rule: Arc<SocialRule>,
        source: Option<SourceId>,
    ) -> Result<(), SocialError> {
        let holder = self
            .entities
            .get_mut(&entity)
            .ok_or(SocialError::EntityNotFound(entity))?;
        let orientation = rule.orientation();
        debug!(entity_id = %entity, rule_id = %rule.id(), ?orientation, "Social rule attached");
        holder.rules.push(RuleAttachment { rule, source });
        self.pending
            .extend(holder.relationships_for(orientation).iter().copied());
        Ok(())
    }

    pub(crate) fn detach_rules_from_source(
        &mut self,
        entity: EntityId,
        source: SourceId,
    ) -> Result<bool, SocialError> {
        self.detach_rules_where(entity, |a| a.source == Some(source))
    }

    fn detach_rules_where(
        &mut self,
        entity: EntityId,
        mut matches: impl FnMut(&RuleAttachment) -> bool,
    ) -> Result<bool, SocialError> {
        let holder = self
            .entities
            .get_mut(&entity)
            .ok_or(SocialError::EntityNotFound(entity))?;
        let mut orientations = BTreeSet::new();
        holder.rules.retain(|attachment| {
            if matches(attachment) {
                orientations.insert(attachment.rule.orientation());
                false
            } else {
                true
            }
        });

        let removed = !orientations.is_empty();
        for orientation in orientations {
            self.pending
                .extend(holder.relationships_for(orientation).iter().copied());
        }
        if removed {
            debug!(entity_id = %entity, "Social rules detached");
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Reconcile the rules applied to one relationship.
    pub fn reevaluate_relationship(&mut self, id: RelationshipId) -> Result<(), SocialError> {
        self.get_relationship_by_id(id)?;
        self.pending.insert(id);
        self.flush()
    }

    /// Reconcile the rules applied to every relationship.
    pub fn reevaluate_all(&mut self) -> Result<(), SocialError> {
        self.pending.extend(self.relationships.keys().copied());
        self.flush()
    }

    /// Drain the pending queue.
    ///
    /// On failure the rest of the queue is discarded, so a later call never
    /// reports work left over from this one.
    fn flush(&mut self) -> Result<(), SocialError> {
        let result = self.drain();
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    fn drain(&mut self) -> Result<(), SocialError> {
        let limit = self.settings.max_cascade_passes;
        let mut passes: u32 = 0;
        while let Some(id) = self.pending.pop_first() {
            if passes >= limit {
                warn!(limit, "Rule re-evaluation did not settle");
                return Err(SocialError::CascadeLimit { limit });
            }
            passes = passes.saturating_add(1);
            self.reconcile(id)?;
        }
        Ok(())
    }

    fn reconcile(&mut self, id: RelationshipId) -> Result<(), SocialError> {
        let Some(relationship) = self.relationships.get(&id) else {
            return Ok(());
        };
        let target = RuleTarget::Relationship(id);
        let candidates = self.candidate_rules(relationship.owner(), relationship.target());
        let active = relationship.active_rules.clone();

        for applied in &active {
            let attached = candidates.iter().any(|c| c.id() == applied.rule.id());
            if !attached || !applied.rule.check_preconditions(self, target)? {
                self.retract(id, applied)?;
            }
        }

        for rule in &candidates {
            let already_active = self
                .relationships
                .get(&id)
                .is_some_and(|r| r.is_rule_active(rule.id()));
            if !already_active && rule.check_preconditions(self, target)? {
                self.activate(id, rule)?;
            }
        }
        Ok(())
    }

    /// The owner's outgoing and the target's incoming rules, deduplicated.
    fn candidate_rules(&self, owner: EntityId, target: EntityId) -> Vec<Arc<SocialRule>> {
        let outgoing = self
            .entities
            .get(&owner)
            .into_iter()
            .flat_map(|e| e.rules_with_orientation(RuleOrientation::Outgoing));
        let incoming = self
            .entities
            .get(&target)
            .into_iter()
            .flat_map(|e| e.rules_with_orientation(RuleOrientation::Incoming));

        let mut seen = BTreeSet::new();
        outgoing
            .chain(incoming)
            .filter(|rule| seen.insert(rule.id()))
            .cloned()
            .collect()
    }

    /// Mark a rule active on a relationship, then apply it under a fresh
    /// source owned by this application.
    fn activate(&mut self, id: RelationshipId, rule: &Arc<SocialRule>) -> Result<(), SocialError> {
        let relationship = self
            .relationships
            .get_mut(&id)
            .ok_or(SocialError::RelationshipNotFound(id))?;
        let source = SourceId::new();
        relationship.active_rules.push(AppliedRule {
            rule: Arc::clone(rule),
            source,
        });

        if let Err(err) = rule.apply(self, RuleTarget::Relationship(id), source) {
            if let Some(relationship) = self.relationships.get_mut(&id) {
                relationship.active_rules.retain(|a| a.source != source);
            }
            return Err(err);
        }

        self.activity.applied = self.activity.applied.saturating_add(1);
        debug!(relationship_id = %id, rule_id = %rule.id(), %source, "Social rule applied");
        Ok(())
    }

    /// Mark an application inactive, then remove its effects.
    fn retract(&mut self, id: RelationshipId, applied: &AppliedRule) -> Result<(), SocialError> {
        if let Some(relationship) = self.relationships.get_mut(&id) {
            relationship.active_rules.retain(|a| a.source != applied.source);
        }
        self.activity.removed = self.activity.removed.saturating_add(1);
        debug!(relationship_id = %id, rule_id = %applied.rule.id(), "Social rule removed");
        applied
            .rule
            .remove(self, RuleTarget::Relationship(id), applied.source)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance durations by one tick.
    ///
    /// Timed modifiers count down first, then timed traits; anything that
    /// runs out is removed with its effects. Finally every relationship is
    /// reconciled when [`EngineSettings::reevaluate_rules_on_tick`] is set,
    /// otherwise only those whose inputs changed.
    pub fn tick(&mut self) -> Result<TickReport, SocialError> {
        let before = self.activity;
        let mut report = TickReport::default();

        let mut touched = Vec::new();
        for (id, entity) in &mut self.entities {
            let expired = entity.stats.tick();
            if !expired.is_empty() {
                report.expired_modifiers = report.expired_modifiers.saturating_add(expired.len());
                touched.push(RuleTarget::Entity(*id));
            }
        }
        for (id, relationship) in &mut self.relationships {
            let expired = relationship.stats.tick();
            if !expired.is_empty() {
                report.expired_modifiers = report.expired_modifiers.saturating_add(expired.len());
                touched.push(RuleTarget::Relationship(*id));
            }
        }
        for target in touched {
            self.mark_dirty(target);
        }

        let mut expired_traits = Vec::new();
        for (id, entity) in &mut self.entities {
            for trait_id in entity.traits.tick() {
                expired_traits.push((RuleTarget::Entity(*id), trait_id));
            }
        }
        for (id, relationship) in &mut self.relationships {
            for trait_id in relationship.traits.tick() {
                expired_traits.push((RuleTarget::Relationship(*id), trait_id));
            }
        }
        for (target, trait_id) in &expired_traits {
            // An earlier removal may already have taken this trait with it.
            if self.revoke_trait(*target, trait_id, None)? {
                report.expired_traits = report.expired_traits.saturating_add(1);
            }
        }

        if self.settings.reevaluate_rules_on_tick {
            self.pending.extend(self.relationships.keys().copied());
        }
        self.flush()?;

        report.rules_applied = self.activity.applied.saturating_sub(before.applied);
        report.rules_removed = self.activity.removed.saturating_sub(before.removed);
        debug!(
            expired_modifiers = report.expired_modifiers,
            expired_traits = report.expired_traits,
            rules_applied = report.rules_applied,
            rules_removed = report.rules_removed,
            "Social engine ticked"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tdrs_stats::StatError;
    use tdrs_types::{StatModifierData, StatModifierType, StatSchema};

    use super::*;
    use crate::effect::Effect;
    use crate::precondition::Precondition;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn engine() -> SocialEngine {
        let mut engine = SocialEngine::new();
        engine
            .add_trait_definition(TraitDefinition::new("honest", TraitKind::Entity).with_conflict("deceitful"))
            .unwrap();
        engine
            .add_trait_definition(TraitDefinition::new("deceitful", TraitKind::Entity))
            .unwrap();
        engine
            .add_trait_definition(TraitDefinition::new("rivals", TraitKind::Relationship))
            .unwrap();
        engine
            .add_trait_definition(
                TraitDefinition::new("cheerful", TraitKind::Entity).with_effect(Effect::add_stat_modifier(
                    Subject::This,
                    StatModifierData::new("Mood", 5.0, StatModifierType::Flat),
                )),
            )
            .unwrap();

        let mut character = EntitySchema::new("character");
        character.stats.push(StatSchema::new("Mood", 0.0, -100.0, 100.0));
        engine.add_entity_schema(character).unwrap();

        let relationship = RelationshipSchema {
            stats: vec![StatSchema::new("Friendship", 0.0, -100.0, 100.0)],
            traits: Vec::new(),
        };
        engine.set_relationship_schema(relationship).unwrap();
        engine
    }

    fn friendship(engine: &SocialEngine, owner: EntityId, target: EntityId) -> f64 {
        engine
            .get_relationship(owner, target)
            .unwrap()
            .stats()
            .value("Friendship")
            .unwrap()
    }

    fn mood(engine: &SocialEngine, entity: EntityId) -> f64 {
        engine.get_entity(entity).unwrap().stats().value("Mood").unwrap()
    }

    fn friendship_bonus(value: f64, orientation: RuleOrientation, preconditions: Vec<Precondition>) -> Arc<SocialRule> {
        Arc::new(SocialRule::new(
            preconditions,
            vec![Effect::add_stat_modifier(
                Subject::This,
                StatModifierData::new("Friendship", value, StatModifierType::Flat),
            )],
            orientation,
        ))
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.add_entity("dragon"),
            Err(SocialError::UnknownEntityKind(_))
        ));
        assert_eq!(engine.entity_count(), 0);
    }

    #[test]
    fn relationship_validation() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();

        assert!(matches!(engine.add_relationship(a, a), Err(SocialError::SelfRelationship(_))));
        assert!(matches!(
            engine.add_relationship(a, EntityId::new()),
            Err(SocialError::EntityNotFound(_))
        ));
        assert!(engine.add_relationship(a, b).is_ok());
        assert!(matches!(
            engine.add_relationship(a, b),
            Err(SocialError::DuplicateRelationship { .. })
        ));

        assert!(engine.has_relationship(a, b));
        assert!(!engine.has_relationship(b, a));
        assert!(engine.try_get_relationship(b, a).is_none());
        assert!(matches!(
            engine.get_relationship(b, a),
            Err(SocialError::NoRelationship { .. })
        ));
    }

    #[test]
    fn outgoing_rule_applies_to_owned_relationships() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        engine.add_relationship(b, a).unwrap();

        let rule = friendship_bonus(10.0, RuleOrientation::Outgoing, Vec::new());
        engine.add_social_rule(a, rule, None).unwrap();

        assert!(approx(friendship(&engine, a, b), 10.0));
        assert!(approx(friendship(&engine, b, a), 0.0));
    }

    #[test]
    fn incoming_rule_applies_to_relationships_targeting_holder() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(-7.0, RuleOrientation::Incoming, Vec::new());
        engine.add_social_rule(b, rule, None).unwrap();
        assert!(approx(friendship(&engine, a, b), -7.0));

        // New edges are matched when created.
        let c = engine.add_entity("character").unwrap();
        engine.add_relationship(c, b).unwrap();
        assert!(approx(friendship(&engine, c, b), -7.0));
    }

    #[test]
    fn trait_changes_reevaluate_rules() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(
            15.0,
            RuleOrientation::Outgoing,
            vec![Precondition::has_trait(Subject::Target, "honest")],
        );
        let rule_id = rule.id();
        engine.add_social_rule(a, rule, None).unwrap();
        assert!(approx(friendship(&engine, a, b), 0.0));

        let honest = TraitId::new("honest");
        assert!(engine.add_trait(RuleTarget::Entity(b), &honest, None, None).unwrap());
        assert!(approx(friendship(&engine, a, b), 15.0));
        assert!(engine.get_relationship(a, b).unwrap().is_rule_active(rule_id));

        assert!(engine.remove_trait(RuleTarget::Entity(b), &honest).unwrap());
        assert!(approx(friendship(&engine, a, b), 0.0));
        assert!(!engine.get_relationship(a, b).unwrap().is_rule_active(rule_id));
    }

    #[test]
    fn stat_changes_reevaluate_rules() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(
            20.0,
            RuleOrientation::Outgoing,
            vec![Precondition::stat_at_least(Subject::Owner, "Mood", 50.0)],
        );
        engine.add_social_rule(a, rule, None).unwrap();
        assert!(approx(friendship(&engine, a, b), 0.0));

        engine
            .set_base_value(RuleTarget::Entity(a), "Mood", 60.0)
            .unwrap();
        assert!(approx(friendship(&engine, a, b), 20.0));

        engine
            .set_base_value(RuleTarget::Entity(a), "Mood", 10.0)
            .unwrap();
        assert!(approx(friendship(&engine, a, b), 0.0));
    }

    #[test]
    fn removing_rule_restores_values() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(12.5, RuleOrientation::Outgoing, Vec::new());
        let rule_id = rule.id();
        engine.add_social_rule(a, rule, None).unwrap();
        assert!(approx(friendship(&engine, a, b), 12.5));

        assert!(engine.remove_social_rule(a, rule_id).unwrap());
        assert!(approx(friendship(&engine, a, b), 0.0));
        assert!(!engine.remove_social_rule(a, rule_id).unwrap());
    }

    #[test]
    fn rule_applies_once_despite_duplicate_attachments() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(4.0, RuleOrientation::Outgoing, Vec::new());
        let source = SourceId::new();
        engine.add_social_rule(a, Arc::clone(&rule), None).unwrap();
        engine.add_social_rule(a, rule, Some(source)).unwrap();
        assert!(approx(friendship(&engine, a, b), 4.0));

        // The direct attachment still holds the rule in place.
        assert!(engine.remove_all_social_rules_from_source(a, source).unwrap());
        assert!(approx(friendship(&engine, a, b), 4.0));
    }

    #[test]
    fn trait_rules_enforce_kind_conflicts_and_duplicates() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let target = RuleTarget::Entity(a);

        assert!(matches!(
            engine.add_trait(target, &TraitId::new("rivals"), None, None),
            Err(SocialError::WrongTraitKind { .. })
        ));
        assert!(matches!(
            engine.add_trait(target, &TraitId::new("unknown"), None, None),
            Err(SocialError::TraitNotFound(_))
        ));

        let honest = TraitId::new("honest");
        assert!(engine.add_trait(target, &honest, None, None).unwrap());
        assert!(!engine.add_trait(target, &honest, None, None).unwrap());
        assert!(matches!(
            engine.add_trait(target, &TraitId::new("deceitful"), None, None),
            Err(SocialError::TraitConflict { .. })
        ));
    }

    #[test]
    fn trait_effects_follow_the_trait() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let cheerful = TraitId::new("cheerful");

        engine
            .add_trait(RuleTarget::Entity(a), &cheerful, None, None)
            .unwrap();
        assert!(approx(mood(&engine, a), 5.0));

        // Only the source that added a trait may remove it through the source path.
        assert!(!engine
            .remove_trait_from_source(RuleTarget::Entity(a), &cheerful, SourceId::new())
            .unwrap());
        assert!(engine.remove_trait(RuleTarget::Entity(a), &cheerful).unwrap());
        assert!(approx(mood(&engine, a), 0.0));
    }

    #[test]
    fn timed_modifier_expires_on_nth_tick() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let modifier = StatModifier::new("Mood", 8.0, StatModifierType::Flat).with_duration(2);
        engine.add_modifier(RuleTarget::Entity(a), modifier).unwrap();

        let first = engine.tick().unwrap();
        assert_eq!(first.expired_modifiers, 0);
        assert!(approx(mood(&engine, a), 8.0));

        let second = engine.tick().unwrap();
        assert_eq!(second.expired_modifiers, 1);
        assert!(approx(mood(&engine, a), 0.0));
    }

    #[test]
    fn timed_trait_expiry_removes_effects() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let cheerful = TraitId::new("cheerful");
        engine
            .add_trait(RuleTarget::Entity(a), &cheerful, Some(1), None)
            .unwrap();
        assert!(approx(mood(&engine, a), 5.0));

        let report = engine.tick().unwrap();
        assert_eq!(report.expired_traits, 1);
        assert!(approx(mood(&engine, a), 0.0));
        assert!(!engine.get_entity(a).unwrap().traits().contains(&cheerful));
    }

    #[test]
    fn self_toggling_rule_hits_cascade_limit() {
        let mut engine = SocialEngine::with_settings(EngineSettings {
            reevaluate_rules_on_tick: false,
            max_cascade_passes: 50,
        });
        engine
            .set_relationship_schema(RelationshipSchema {
                stats: vec![StatSchema::new("Friendship", 0.0, -100.0, 100.0)],
                traits: Vec::new(),
            })
            .unwrap();
        engine.add_entity_schema(EntitySchema::new("character")).unwrap();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        // Applying the rule invalidates its own precondition.
        let rule = friendship_bonus(
            10.0,
            RuleOrientation::Outgoing,
            vec![Precondition::stat_at_most(Subject::This, "Friendship", 0.0)],
        );
        assert!(matches!(
            engine.add_social_rule(a, rule, None),
            Err(SocialError::CascadeLimit { limit: 50 })
        ));
    }

    #[test]
    fn failed_rule_application_rolls_back() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = Arc::new(SocialRule::new(
            Vec::new(),
            vec![
                Effect::add_stat_modifier(
                    Subject::This,
                    StatModifierData::new("Friendship", 5.0, StatModifierType::Flat),
                ),
                Effect::add_stat_modifier(
                    Subject::This,
                    StatModifierData::new("Respect", 5.0, StatModifierType::Flat),
                ),
            ],
            RuleOrientation::Outgoing,
        ));
        let rule_id = rule.id();
        assert!(engine.add_social_rule(a, rule, None).is_err());
        assert!(approx(friendship(&engine, a, b), 0.0));
        assert!(!engine.get_relationship(a, b).unwrap().is_rule_active(rule_id));
    }

    #[test]
    fn removing_entity_retracts_effects_on_others() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        engine.add_relationship(b, a).unwrap();

        let rule = Arc::new(SocialRule::new(
            Vec::new(),
            vec![Effect::add_stat_modifier(
                Subject::Target,
                StatModifierData::new("Mood", 3.0, StatModifierType::Flat),
            )],
            RuleOrientation::Outgoing,
        ));
        engine.add_social_rule(a, rule, None).unwrap();
        assert!(approx(mood(&engine, b), 3.0));

        assert!(engine.remove_entity(a).unwrap());
        assert!(approx(mood(&engine, b), 0.0));
        assert_eq!(engine.relationship_count(), 0);
        assert!(engine.get_entity(b).unwrap().incoming_relationships().is_empty());
        assert!(engine.get_entity(b).unwrap().outgoing_relationships().is_empty());
        assert!(!engine.remove_entity(a).unwrap());
    }

    #[test]
    fn subjects_resolve_against_targets() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let edge = engine.add_relationship(a, b).unwrap();
        let rel = RuleTarget::Relationship(edge);

        assert_eq!(engine.resolve_subject(rel, Subject::This).unwrap(), rel);
        assert_eq!(engine.resolve_subject(rel, Subject::Owner).unwrap(), RuleTarget::Entity(a));
        assert_eq!(engine.resolve_subject(rel, Subject::Target).unwrap(), RuleTarget::Entity(b));
        assert!(matches!(
            engine.resolve_subject(RuleTarget::Entity(a), Subject::Owner),
            Err(SocialError::InvalidSubject { .. })
        ));
    }

    #[test]
    fn default_traits_are_added_on_creation() {
        let mut engine = engine();
        let mut schema = EntitySchema::new("optimist");
        schema.stats.push(StatSchema::new("Mood", 0.0, -100.0, 100.0));
        schema.traits.push(TraitId::new("cheerful"));
        engine.add_entity_schema(schema).unwrap();

        let a = engine.add_entity("optimist").unwrap();
        assert!(approx(mood(&engine, a), 5.0));

        let mut broken = EntitySchema::new("broken");
        broken.traits.push(TraitId::new("nonexistent"));
        assert!(matches!(
            engine.add_entity_schema(broken),
            Err(SocialError::TraitNotFound(_))
        ));
    }

    fn owner_mood_when_target_honest() -> Arc<SocialRule> {
        Arc::new(SocialRule::new(
            vec![Precondition::has_trait(Subject::Target, "honest")],
            vec![Effect::add_stat_modifier(
                Subject::Owner,
                StatModifierData::new("Mood", 5.0, StatModifierType::Flat),
            )],
            RuleOrientation::Outgoing,
        ))
    }

    #[test]
    fn retracting_one_edge_keeps_effects_of_its_siblings() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let c = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        engine.add_relationship(a, c).unwrap();

        let rule = owner_mood_when_target_honest();
        let rule_id = rule.id();
        engine.add_social_rule(a, rule, None).unwrap();
        let honest = TraitId::new("honest");
        engine.add_trait(RuleTarget::Entity(b), &honest, None, None).unwrap();
        engine.add_trait(RuleTarget::Entity(c), &honest, None, None).unwrap();
        assert!(approx(mood(&engine, a), 10.0));

        engine.remove_trait(RuleTarget::Entity(b), &honest).unwrap();
        assert!(approx(mood(&engine, a), 5.0));
        assert!(!engine.get_relationship(a, b).unwrap().is_rule_active(rule_id));
        assert!(engine.get_relationship(a, c).unwrap().is_rule_active(rule_id));

        engine.remove_trait(RuleTarget::Entity(c), &honest).unwrap();
        assert!(approx(mood(&engine, a), 0.0));
    }

    #[test]
    fn trait_granted_by_two_edges_survives_one_retraction() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let c = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        engine.add_relationship(a, c).unwrap();

        let rule = Arc::new(SocialRule::new(
            vec![Precondition::has_trait(Subject::Target, "honest")],
            vec![Effect::add_trait(Subject::Owner, "cheerful")],
            RuleOrientation::Outgoing,
        ));
        engine.add_social_rule(a, rule, None).unwrap();
        let honest = TraitId::new("honest");
        let cheerful = TraitId::new("cheerful");
        engine.add_trait(RuleTarget::Entity(b), &honest, None, None).unwrap();
        engine.add_trait(RuleTarget::Entity(c), &honest, None, None).unwrap();
        // One instance, so its modifier counts once.
        assert!(approx(mood(&engine, a), 5.0));

        engine.remove_trait(RuleTarget::Entity(b), &honest).unwrap();
        assert!(engine.has_trait(RuleTarget::Entity(a), &cheerful).unwrap());
        assert!(approx(mood(&engine, a), 5.0));

        engine.remove_trait(RuleTarget::Entity(c), &honest).unwrap();
        assert!(!engine.has_trait(RuleTarget::Entity(a), &cheerful).unwrap());
        assert!(approx(mood(&engine, a), 0.0));
    }

    #[test]
    fn rule_attached_by_two_edges_survives_one_retraction() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let c = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        engine.add_relationship(a, c).unwrap();

        let nested = friendship_bonus(10.0, RuleOrientation::Outgoing, Vec::new());
        let nested_id = nested.id();
        let rule = Arc::new(SocialRule::new(
            vec![Precondition::has_trait(Subject::Target, "honest")],
            vec![Effect::add_social_rule(Subject::Owner, nested)],
            RuleOrientation::Outgoing,
        ));
        engine.add_social_rule(a, rule, None).unwrap();
        let honest = TraitId::new("honest");
        engine.add_trait(RuleTarget::Entity(b), &honest, None, None).unwrap();
        engine.add_trait(RuleTarget::Entity(c), &honest, None, None).unwrap();
        assert!(approx(friendship(&engine, a, b), 10.0));

        engine.remove_trait(RuleTarget::Entity(b), &honest).unwrap();
        assert!(engine.get_entity(a).unwrap().has_rule(nested_id));
        assert!(approx(friendship(&engine, a, b), 10.0));
        assert!(approx(friendship(&engine, a, c), 10.0));

        engine.remove_trait(RuleTarget::Entity(c), &honest).unwrap();
        assert!(!engine.get_entity(a).unwrap().has_rule(nested_id));
        assert!(approx(friendship(&engine, a, c), 0.0));
    }

    fn trust_gate(orientation: RuleOrientation) -> Arc<SocialRule> {
        friendship_bonus(
            5.0,
            orientation,
            vec![Precondition::stat_at_least(Subject::This, "Trust", 1.0)],
        )
    }

    #[test]
    fn relationship_that_fails_evaluation_is_discarded() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let rule = trust_gate(RuleOrientation::Outgoing);
        let rule_id = rule.id();
        engine.add_social_rule(a, rule, None).unwrap();

        assert!(matches!(engine.add_relationship(a, b), Err(SocialError::Stat { .. })));
        assert!(!engine.has_relationship(a, b));
        assert_eq!(engine.relationship_count(), 0);
        assert!(engine.get_entity(a).unwrap().outgoing_relationships().is_empty());
        assert!(engine.get_entity(b).unwrap().incoming_relationships().is_empty());

        // A retry reports the same failure, not a duplicate edge.
        assert!(matches!(engine.add_relationship(a, b), Err(SocialError::Stat { .. })));

        engine.remove_social_rule(a, rule_id).unwrap();
        engine.add_relationship(a, b).unwrap();
        assert!(engine.has_relationship(a, b));
    }

    #[test]
    fn failed_evaluation_drops_queued_work() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        let c = engine.add_entity("character").unwrap();
        engine.add_relationship(b, a).unwrap();
        engine.add_relationship(c, a).unwrap();

        // Both incoming edges are queued and the first one fails.
        assert!(matches!(
            engine.add_social_rule(a, trust_gate(RuleOrientation::Incoming), None),
            Err(SocialError::Stat { .. })
        ));

        // Unrelated work does not replay the abandoned queue.
        let d = engine.add_entity("character").unwrap();
        engine
            .add_trait(RuleTarget::Entity(d), &TraitId::new("honest"), None, None)
            .unwrap();
        engine
            .set_base_value(RuleTarget::Entity(d), "Mood", 3.0)
            .unwrap();
    }

    #[test]
    fn non_finite_base_value_is_rejected() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();
        let rule = friendship_bonus(
            20.0,
            RuleOrientation::Outgoing,
            vec![Precondition::stat_at_least(Subject::Owner, "Mood", 50.0)],
        );
        engine.add_social_rule(a, rule, None).unwrap();
        engine
            .set_base_value(RuleTarget::Entity(a), "Mood", 60.0)
            .unwrap();

        assert!(matches!(
            engine.set_base_value(RuleTarget::Entity(a), "Mood", f64::NAN),
            Err(SocialError::Stat {
                source: StatError::NotFinite { .. }
            })
        ));
        assert!(engine
            .set_base_value(RuleTarget::Entity(a), "Mood", f64::NEG_INFINITY)
            .is_err());
        assert!(approx(mood(&engine, a), 60.0));
        assert!(approx(friendship(&engine, a, b), 20.0));
    }

    #[test]
    fn infinite_modifier_effect_is_not_applied() {
        let mut engine = engine();
        let a = engine.add_entity("character").unwrap();
        let b = engine.add_entity("character").unwrap();
        engine.add_relationship(a, b).unwrap();

        let rule = friendship_bonus(f64::INFINITY, RuleOrientation::Outgoing, Vec::new());
        let rule_id = rule.id();
        assert!(matches!(
            engine.add_social_rule(a, rule, None),
            Err(SocialError::Stat {
                source: StatError::NonFiniteModifier { .. }
            })
        ));
        assert!(!engine.get_relationship(a, b).unwrap().is_rule_active(rule_id));
        assert!(approx(friendship(&engine, a, b), 0.0));
    }
}
