//! Stat modifiers: sourced adjustments to a stat's derived value.
//!
//! A [`StatModifier`] is immutable once built, except for its remaining
//! duration which counts down once per simulation tick. Expiry policy lives
//! with the owner of the stat ([`Stat::tick_modifiers`]), not here.
//!
//! [`Stat::tick_modifiers`]: crate::Stat::tick_modifiers

use tdrs_types::{ModifierId, SourceId, StatModifierData, StatModifierType};

/// One adjustment to a named stat.
#[derive(Debug, Clone, PartialEq)]
pub struct StatModifier {
    id: ModifierId,
    stat: String,
    reason: String,
    value: f64,
    modifier_type: StatModifierType,
    order: i32,
    duration: Option<u32>,
    source: Option<SourceId>,
}

impl StatModifier {
    /// Create an unsourced, unbounded modifier with the mode's default order.
    pub fn new(stat: impl Into<String>, value: f64, modifier_type: StatModifierType) -> Self {
        Self {
            id: ModifierId::new(),
            stat: stat.into(),
            reason: String::new(),
            value,
            modifier_type,
            order: modifier_type.default_order(),
            duration: None,
            source: None,
        }
    }

    /// Build a modifier from declarative data, tagged with `source`.
    pub fn from_data(data: &StatModifierData, source: Option<SourceId>) -> Self {
        Self {
            id: ModifierId::new(),
            stat: data.stat.clone(),
            reason: data.reason.clone(),
            value: data.value,
            modifier_type: data.modifier_type,
            order: data.resolved_order(),
            duration: data.duration,
            source,
        }
    }

    /// Set the human-readable reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Override the evaluation order.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Limit the modifier to `ticks` simulation ticks.
    #[must_use]
    pub const fn with_duration(mut self, ticks: u32) -> Self {
        self.duration = Some(ticks);
        self
    }

    /// Tag the modifier with the source that created it.
    #[must_use]
    pub const fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    /// Unique identity of this modifier.
    pub const fn id(&self) -> ModifierId {
        self.id
    }

    /// Name of the stat this modifier targets.
    pub fn stat(&self) -> &str {
        &self.stat
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Magnitude.
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Combination mode.
    pub const fn modifier_type(&self) -> StatModifierType {
        self.modifier_type
    }

    /// Evaluation order key (ascending).
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// Remaining ticks, or `None` when unbounded.
    pub const fn duration(&self) -> Option<u32> {
        self.duration
    }

    /// Source that created this modifier, if any.
    pub const fn source(&self) -> Option<SourceId> {
        self.source
    }

    /// Count down one tick. Returns `false` once the duration has run out.
    ///
    /// Unbounded modifiers always return `true`. A modifier built with a
    /// duration of zero expires on its first tick.
    pub const fn tick(&mut self) -> bool {
        match self.duration {
            None => true,
            Some(remaining) => {
                let next = remaining.saturating_sub(1);
                self.duration = Some(next);
                next > 0
            }
        }
    }
}
