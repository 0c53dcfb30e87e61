//! Trait-driven opinions of one entity about another.
//!
//! An opinion is not stored anywhere. [`OpinionSystem::opinion_of`] builds a
//! throwaway [`Stat`] from the configured base and bounds, attaches one
//! modifier per matching rule, and reads the result. Because the stat
//! machinery does the arithmetic, opinion rules stack exactly like any other
//! modifier (flat, then percent-add runs, then percent-multiply).

use serde::{Deserialize, Serialize};
use tdrs_stats::{Stat, StatModifier};
use tdrs_types::{EntityId, RuleId, SourceId, StatModifierType, TraitId};

use crate::engine::SocialEngine;
use crate::error::SocialError;
use crate::target::RuleTarget;
use crate::traits::TraitLibrary;

/// Name of the throwaway stat an opinion is computed in.
const OPINION_STAT: &str = "opinion";

/// A modifier granted when the subject and object hold certain traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionRule {
    /// Identity, used as the modifier source.
    #[serde(default)]
    pub id: RuleId,
    /// Shown in the contribution breakdown.
    #[serde(default)]
    pub description: String,
    /// Trait the opinion holder must have, if any.
    #[serde(default)]
    pub subject_trait: Option<TraitId>,
    /// Trait the entity being judged must have, if any.
    #[serde(default)]
    pub object_trait: Option<TraitId>,
    /// Modifier magnitude.
    pub value: f64,
    /// How the magnitude combines.
    pub modifier_type: StatModifierType,
}

impl OpinionRule {
    /// A flat rule with no trait requirements yet.
    pub fn new(description: impl Into<String>, value: f64) -> Self {
        Self {
            id: RuleId::new(),
            description: description.into(),
            subject_trait: None,
            object_trait: None,
            value,
            modifier_type: StatModifierType::Flat,
        }
    }

    /// Require the subject to hold `trait_id`.
    #[must_use]
    pub fn when_subject_has(mut self, trait_id: impl Into<TraitId>) -> Self {
        self.subject_trait = Some(trait_id.into());
        self
    }

    /// Require the object to hold `trait_id`.
    #[must_use]
    pub fn when_object_has(mut self, trait_id: impl Into<TraitId>) -> Self {
        self.object_trait = Some(trait_id.into());
        self
    }

    /// Use a different combination mode.
    #[must_use]
    pub const fn with_modifier_type(mut self, modifier_type: StatModifierType) -> Self {
        self.modifier_type = modifier_type;
        self
    }
}

/// A flat bonus for every configured trait both parties hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedTraitBonus {
    /// The trait both must hold.
    pub trait_id: TraitId,
    /// Flat modifier magnitude.
    pub value: f64,
}

/// One modifier that went into an opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionContribution {
    /// Rule description, or `shared <trait>` for shared-trait bonuses.
    pub description: String,
    /// Modifier magnitude.
    pub value: f64,
    /// How it combined.
    pub modifier_type: StatModifierType,
}

/// A computed opinion with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    /// Final clamped value.
    pub value: f64,
    /// Every modifier applied, rules first then shared-trait bonuses.
    pub contributions: Vec<OpinionContribution>,
}

/// Opinion rules plus the base and bounds opinions are computed within.
#[derive(Debug, Clone)]
pub struct OpinionSystem {
    base: f64,
    min: f64,
    max: f64,
    rules: Vec<OpinionRule>,
    shared: Vec<SharedTraitBonus>,
}

impl OpinionSystem {
    /// Create a system with no rules.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::Stat`] if the bounds are invalid.
    pub fn new(base: f64, min: f64, max: f64) -> Result<Self, SocialError> {
        Stat::new(base, min, max, false)?;
        Ok(Self {
            base,
            min,
            max,
            rules: Vec::new(),
            shared: Vec::new(),
        })
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::InvalidOpinionRule`] if the rule names neither
    /// trait or its value is not finite, and [`SocialError::TraitNotFound`]
    /// for a trait missing from `library`.
    pub fn add_rule(&mut self, rule: OpinionRule, library: &TraitLibrary) -> Result<(), SocialError> {
        if rule.subject_trait.is_none() && rule.object_trait.is_none() {
            return Err(SocialError::InvalidOpinionRule {
                reason: format!("rule '{}' requires neither a subject nor an object trait", rule.description),
            });
        }
        if !rule.value.is_finite() {
            return Err(SocialError::InvalidOpinionRule {
                reason: format!("rule '{}' has a non-finite value", rule.description),
            });
        }
        for trait_id in rule.subject_trait.iter().chain(&rule.object_trait) {
            library.require(trait_id)?;
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Add a shared-trait bonus.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::TraitNotFound`] for a trait missing from `library`.
    pub fn add_shared_trait(
        &mut self,
        trait_id: impl Into<TraitId>,
        value: f64,
        library: &TraitLibrary,
    ) -> Result<(), SocialError> {
        let trait_id = trait_id.into();
        if !value.is_finite() {
            return Err(SocialError::InvalidOpinionRule {
                reason: format!("shared bonus for {trait_id} has a non-finite value"),
            });
        }
        library.require(&trait_id)?;
        self.shared.push(SharedTraitBonus { trait_id, value });
        Ok(())
    }

    /// The configured rules in insertion order.
    pub fn rules(&self) -> &[OpinionRule] {
        &self.rules
    }

    /// The configured shared-trait bonuses.
    pub fn shared_traits(&self) -> &[SharedTraitBonus] {
        &self.shared
    }

    /// What `subject` thinks of `object`.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::EntityNotFound`] if either entity is missing.
    pub fn opinion_of(
        &self,
        engine: &SocialEngine,
        subject: EntityId,
        object: EntityId,
    ) -> Result<Opinion, SocialError> {
        let subject_traits = engine.traits_of(RuleTarget::Entity(subject))?;
        let object_traits = engine.traits_of(RuleTarget::Entity(object))?;

        let mut stat = Stat::new(self.base, self.min, self.max, false)?;
        let mut contributions = Vec::new();

        for rule in &self.rules {
            let subject_ok = rule
                .subject_trait
                .as_ref()
                .is_none_or(|t| subject_traits.contains(t));
            let object_ok = rule
                .object_trait
                .as_ref()
                .is_none_or(|t| object_traits.contains(t));
            if subject_ok && object_ok {
                stat.add_modifier(
                    StatModifier::new(OPINION_STAT, rule.value, rule.modifier_type)
                        .with_reason(rule.description.clone())
                        .with_source(SourceId::from(rule.id)),
                )?;
                contributions.push(OpinionContribution {
                    description: rule.description.clone(),
                    value: rule.value,
                    modifier_type: rule.modifier_type,
                });
            }
        }

        for bonus in &self.shared {
            if subject_traits.contains(&bonus.trait_id) && object_traits.contains(&bonus.trait_id) {
                let description = format!("shared {}", bonus.trait_id);
                stat.add_modifier(
                    StatModifier::new(OPINION_STAT, bonus.value, StatModifierType::Flat)
                        .with_reason(description.clone()),
                )?;
                contributions.push(OpinionContribution {
                    description,
                    value: bonus.value,
                    modifier_type: StatModifierType::Flat,
                });
            }
        }

        Ok(Opinion {
            value: stat.value(),
            contributions,
        })
    }
}
