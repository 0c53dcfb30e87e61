//! Social rules: precondition-gated bundles of effects.
//!
//! A rule is immutable once built and is shared between holders through
//! [`Arc`](std::sync::Arc). Its [`orientation`](SocialRule::orientation)
//! decides which relationships of the holder it is matched against; the
//! matching itself lives in the [`SocialEngine`](crate::SocialEngine).

use tdrs_types::{RuleId, RuleOrientation, SourceId};

use crate::effect::{self, Effect};
use crate::engine::SocialEngine;
use crate::error::SocialError;
use crate::precondition::Precondition;
use crate::target::RuleTarget;

/// Conjunctive preconditions plus the effects they unlock.
#[derive(Debug, Clone)]
pub struct SocialRule {
    id: RuleId,
    description: String,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
    orientation: RuleOrientation,
}

impl SocialRule {
    /// Create a rule with a fresh identity.
    pub fn new(
        preconditions: Vec<Precondition>,
        effects: Vec<Effect>,
        orientation: RuleOrientation,
    ) -> Self {
        Self {
            id: RuleId::new(),
            description: String::new(),
            preconditions,
            effects,
            orientation,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Unique identity.
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Free-form description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Which side of a relationship the rule applies to.
    pub const fn orientation(&self) -> RuleOrientation {
        self.orientation
    }

    /// Preconditions in evaluation order.
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Effects in application order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Whether every precondition holds for `target`.
    ///
    /// An empty precondition list always matches. Evaluation stops at the
    /// first precondition that fails.
    pub fn check_preconditions(
        &self,
        engine: &SocialEngine,
        target: RuleTarget,
    ) -> Result<bool, SocialError> {
        for precondition in &self.preconditions {
            if !precondition.evaluate(engine, target)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Apply every effect to `target`, tagging what it creates with `source`.
    ///
    /// `source` must be unique to this application. The engine draws a
    /// fresh one each time it activates the rule on a relationship.
    ///
    /// Preconditions are not checked. If an effect fails, the effects
    /// applied before it are removed again and the error is returned.
    /// Relationships affected by the effects are queued for re-evaluation
    /// by the next engine operation.
    pub fn apply(
        &self,
        engine: &mut SocialEngine,
        target: RuleTarget,
        source: SourceId,
    ) -> Result<(), SocialError> {
        effect::apply_all(&self.effects, engine, target, source)
    }

    /// Remove the effects of the application made with `source` from `target`.
    ///
    /// All effects are attempted; the first failure is returned.
    pub fn remove(
        &self,
        engine: &mut SocialEngine,
        target: RuleTarget,
        source: SourceId,
    ) -> Result<(), SocialError> {
        effect::remove_all(&self.effects, engine, target, source)
    }
}
