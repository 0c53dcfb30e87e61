//! Effects: reversible mutations applied by rules and held traits.
//!
//! Every effect comes as an `apply` / `remove` pair. `remove` undoes exactly
//! what `apply` did for the same source, so a rule or trait that is applied
//! and then removed leaves every stat where it started. Effects call the
//! engine's non-flushing mutators; re-evaluation of affected relationships
//! is queued and runs when the outermost engine operation finishes.

use std::sync::Arc;

use tdrs_stats::StatModifier;
use tdrs_types::{EntityId, SourceId, StatModifierData, Subject, TraitId};
use tracing::warn;

use crate::engine::SocialEngine;
use crate::error::SocialError;
use crate::rule::SocialRule;
use crate::target::RuleTarget;

/// A reversible mutation of the social graph.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Attach a stat modifier to the subject.
    AddStatModifier {
        /// Whose stats receive the modifier.
        subject: Subject,
        /// The modifier to build, sourced by whoever applies the effect.
        modifier: StatModifierData,
    },

    /// Give the subject a trait.
    AddTrait {
        /// Who receives the trait.
        subject: Subject,
        /// The trait to add.
        trait_id: TraitId,
        /// Ticks the trait lasts, or `None` for as long as the effect holds.
        duration: Option<u32>,
    },

    /// Attach a nested social rule to an entity.
    AddSocialRule {
        /// The entity that receives the rule. Must resolve to an entity.
        subject: Subject,
        /// The rule to attach. The attachment records the applying source.
        rule: Arc<SocialRule>,
    },
}

impl Effect {
    /// Shorthand for [`Effect::AddStatModifier`].
    pub const fn add_stat_modifier(subject: Subject, modifier: StatModifierData) -> Self {
        Self::AddStatModifier { subject, modifier }
    }

    /// Shorthand for a permanent [`Effect::AddTrait`].
    pub fn add_trait(subject: Subject, trait_id: impl Into<TraitId>) -> Self {
        Self::AddTrait {
            subject,
            trait_id: trait_id.into(),
            duration: None,
        }
    }

    /// Shorthand for [`Effect::AddSocialRule`].
    pub const fn add_social_rule(subject: Subject, rule: Arc<SocialRule>) -> Self {
        Self::AddSocialRule { subject, rule }
    }

    /// Apply the effect to `target` on behalf of `source`.
    ///
    /// # Errors
    ///
    /// Fails when the subject cannot be resolved, the stat or trait does not
    /// exist, or a trait conflicts with one already held.
    pub fn apply(
        &self,
        engine: &mut SocialEngine,
        target: RuleTarget,
        source: SourceId,
    ) -> Result<(), SocialError> {
        match self {
            Self::AddStatModifier { subject, modifier } => {
                let holder = engine.resolve_subject(target, *subject)?;
                engine.attach_modifier(holder, StatModifier::from_data(modifier, Some(source)))?;
            }
            Self::AddTrait {
                subject,
                trait_id,
                duration,
            } => {
                let holder = engine.resolve_subject(target, *subject)?;
                engine.grant_trait(holder, trait_id, *duration, Some(source))?;
            }
            Self::AddSocialRule { subject, rule } => {
                let entity = rule_holder(engine, target, *subject)?;
                engine.attach_rule(entity, Arc::clone(rule), Some(source))?;
            }
        }
        Ok(())
    }

    /// Undo [`apply`](Self::apply) for the same `target` and `source`.
    ///
    /// # Errors
    ///
    /// Fails when the subject can no longer be resolved or the stat is
    /// missing. Removing something that is already gone is not an error.
    pub fn remove(
        &self,
        engine: &mut SocialEngine,
        target: RuleTarget,
        source: SourceId,
    ) -> Result<(), SocialError> {
        match self {
            Self::AddStatModifier { subject, modifier } => {
                let holder = engine.resolve_subject(target, *subject)?;
                engine.detach_stat_modifiers(holder, &modifier.stat, source)?;
            }
            Self::AddTrait {
                subject, trait_id, ..
            } => {
                let holder = engine.resolve_subject(target, *subject)?;
                engine.revoke_trait(holder, trait_id, Some(source))?;
            }
            Self::AddSocialRule { subject, .. } => {
                let entity = rule_holder(engine, target, *subject)?;
                engine.detach_rules_from_source(entity, source)?;
            }
        }
        Ok(())
    }

    /// Human-readable description for tooling.
    pub fn description(&self) -> String {
        match self {
            Self::AddStatModifier { subject, modifier } => format!(
                "{} {} {} {}",
                subject.as_str(),
                modifier.stat,
                modifier.modifier_type.as_str(),
                modifier.value
            ),
            Self::AddTrait {
                subject,
                trait_id,
                duration: Some(ticks),
            } => format!("{} gains trait {trait_id} for {ticks} ticks", subject.as_str()),
            Self::AddTrait {
                subject, trait_id, ..
            } => format!("{} gains trait {trait_id}", subject.as_str()),
            Self::AddSocialRule { subject, rule, .. } => {
                format!("{} gains rule {}", subject.as_str(), rule.id())
            }
        }
    }

    /// Trait IDs referenced by this effect, for load-time validation.
    pub fn referenced_trait(&self) -> Option<&TraitId> {
        match self {
            Self::AddTrait { trait_id, .. } => Some(trait_id),
            Self::AddStatModifier { .. } | Self::AddSocialRule { .. } => None,
        }
    }
}

fn rule_holder(
    engine: &SocialEngine,
    target: RuleTarget,
    subject: Subject,
) -> Result<EntityId, SocialError> {
    match engine.resolve_subject(target, subject)? {
        RuleTarget::Entity(id) => Ok(id),
        RuleTarget::Relationship(_) => Err(SocialError::InvalidSubject { subject, target }),
    }
}

/// Apply `effects` in order, undoing the applied prefix if one fails.
pub(crate) fn apply_all(
    effects: &[Effect],
    engine: &mut SocialEngine,
    target: RuleTarget,
    source: SourceId,
) -> Result<(), SocialError> {
    for (applied, effect) in effects.iter().enumerate() {
        if let Err(err) = effect.apply(engine, target, source) {
            for done in effects.iter().take(applied).rev() {
                if let Err(undo) = done.remove(engine, target, source) {
                    warn!(
                        rule_target = %target,
                        effect = %done.description(),
                        error = %undo,
                        "Failed to roll back effect"
                    );
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Remove `effects` in order, reporting the first failure after trying all.
pub(crate) fn remove_all(
    effects: &[Effect],
    engine: &mut SocialEngine,
    target: RuleTarget,
    source: SourceId,
) -> Result<(), SocialError> {
    let mut first_error = None;
    for effect in effects {
        if let Err(err) = effect.remove(engine, target, source) {
            warn!(
                rule_target = %target,
                effect = %effect.description(),
                error = %err,
                "Failed to remove effect"
            );
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
