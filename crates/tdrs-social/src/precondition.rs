//! Preconditions: pure predicates that gate social rules.
//!
//! A precondition inspects a subject resolved from the rule target and
//! returns a boolean. Evaluation never mutates the graph. It fails only
//! when the data it depends on is missing (an undefined trait, an absent
//! stat, or a subject that does not exist for the target), and those
//! failures are returned rather than treated as `false`.

use serde::{Deserialize, Serialize};
use tdrs_types::{Subject, TraitId};

use crate::engine::SocialEngine;
use crate::error::SocialError;
use crate::target::RuleTarget;

/// A predicate over a rule target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Precondition {
    /// The subject holds the given trait.
    HasTrait {
        /// Whose traits to inspect.
        subject: Subject,
        /// The trait that must be held.
        trait_id: TraitId,
    },

    /// The subject's stat value lies within the inclusive bounds.
    StatInRange {
        /// Whose stats to inspect.
        subject: Subject,
        /// The stat name.
        stat: String,
        /// Inclusive lower bound, if any.
        #[serde(default)]
        min: Option<f64>,
        /// Inclusive upper bound, if any.
        #[serde(default)]
        max: Option<f64>,
    },

    /// Negation of another precondition.
    Not {
        /// The precondition to negate.
        precondition: Box<Self>,
    },
}

impl Precondition {
    /// Shorthand for [`Precondition::HasTrait`].
    pub fn has_trait(subject: Subject, trait_id: impl Into<TraitId>) -> Self {
        Self::HasTrait {
            subject,
            trait_id: trait_id.into(),
        }
    }

    /// Shorthand for a [`Precondition::StatInRange`] with only a lower bound.
    pub fn stat_at_least(subject: Subject, stat: impl Into<String>, min: f64) -> Self {
        Self::StatInRange {
            subject,
            stat: stat.into(),
            min: Some(min),
            max: None,
        }
    }

    /// Shorthand for a [`Precondition::StatInRange`] with only an upper bound.
    pub fn stat_at_most(subject: Subject, stat: impl Into<String>, max: f64) -> Self {
        Self::StatInRange {
            subject,
            stat: stat.into(),
            min: None,
            max: Some(max),
        }
    }

    /// Wrap in [`Precondition::Not`].
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not {
            precondition: Box::new(self),
        }
    }

    /// Evaluate against `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::TraitNotFound`] for an undefined trait,
    /// [`SocialError::Stat`] for a missing stat, and
    /// [`SocialError::InvalidSubject`] when the subject does not exist for
    /// this kind of target.
    pub fn evaluate(&self, engine: &SocialEngine, target: RuleTarget) -> Result<bool, SocialError> {
        match self {
            Self::HasTrait { subject, trait_id } => {
                let holder = engine.resolve_subject(target, *subject)?;
                engine.has_trait(holder, trait_id)
            }
            Self::StatInRange {
                subject,
                stat,
                min,
                max,
            } => {
                let holder = engine.resolve_subject(target, *subject)?;
                let value = engine.stats_of(holder)?.value(stat)?;
                let above_min = min.is_none_or(|lo| value >= lo);
                let below_max = max.is_none_or(|hi| value <= hi);
                Ok(above_min && below_max)
            }
            Self::Not { precondition } => precondition.evaluate(engine, target).map(|b| !b),
        }
    }

    /// Human-readable description for tooling.
    pub fn description(&self) -> String {
        match self {
            Self::HasTrait { subject, trait_id } => {
                format!("{} has trait {trait_id}", subject.as_str())
            }
            Self::StatInRange {
                subject,
                stat,
                min,
                max,
            } => match (min, max) {
                (Some(lo), Some(hi)) => format!("{lo} <= {} {stat} <= {hi}", subject.as_str()),
                (Some(lo), None) => format!("{} {stat} >= {lo}", subject.as_str()),
                (None, Some(hi)) => format!("{} {stat} <= {hi}", subject.as_str()),
                (None, None) => format!("{} has stat {stat}", subject.as_str()),
            },
            Self::Not { precondition } => format!("not ({})", precondition.description()),
        }
    }

    /// Trait IDs referenced by this precondition, for load-time validation.
    pub fn referenced_traits(&self) -> Vec<&TraitId> {
        match self {
            Self::HasTrait { trait_id, .. } => vec![trait_id],
            Self::StatInRange { .. } => Vec::new(),
            Self::Not { precondition } => precondition.referenced_traits(),
        }
    }
}
