//! A single numeric stat with ordered modifier stacking.
//!
//! The derived value is computed from the base value by walking the
//! modifiers in ascending evaluation order:
//!
//! ```text
//! result = base
//! Flat            -> result += value
//! PercentAdd run  -> sum the run, then result *= (1 + sum)
//! PercentMultiply -> result *= (1 + value)      (each one individually)
//! clamp to [min, max], then floor if discrete (a NaN result becomes min)
//! ```
//!
//! A "run" of percent-add modifiers is a maximal sequence of adjacent
//! percent-add modifiers in evaluation order. The derived value is memoized
//! in a single cache cell that every mutation clears, so repeated reads
//! between mutations perform the reduction once.

use std::cell::Cell;

use tdrs_types::{ModifierId, SourceId, StatModifierType, StatSchema};

use crate::error::StatError;
use crate::modifier::StatModifier;

/// A named-by-owner numeric attribute with bounds and stacked modifiers.
#[derive(Debug, Clone)]
pub struct Stat {
    base_value: f64,
    min_value: f64,
    max_value: f64,
    is_discrete: bool,
    /// Sorted by `order` ascending; ties keep insertion order.
    modifiers: Vec<StatModifier>,
    /// Memoized derived value. `None` means dirty.
    cached: Cell<Option<f64>>,
    recomputations: Cell<u64>,
}

impl Stat {
    /// Create a stat with the given base value and clamp bounds.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFinite`] if any argument is NaN or infinite,
    /// or [`StatError::InvalidBounds`] if `min_value > max_value`.
    pub fn new(
        base_value: f64,
        min_value: f64,
        max_value: f64,
        is_discrete: bool,
    ) -> Result<Self, StatError> {
        for (field, v) in [
            ("base_value", base_value),
            ("min_value", min_value),
            ("max_value", max_value),
        ] {
            if !v.is_finite() {
                return Err(StatError::NotFinite { field });
            }
        }
        if min_value > max_value {
            return Err(StatError::InvalidBounds {
                min: min_value,
                max: max_value,
            });
        }

        Ok(Self {
            base_value,
            min_value,
            max_value,
            is_discrete,
            modifiers: Vec::new(),
            cached: Cell::new(None),
            recomputations: Cell::new(0),
        })
    }

    /// Create a stat from a declarative schema.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::InvalidSchema`] wrapping the constructor error.
    pub fn from_schema(schema: &StatSchema) -> Result<Self, StatError> {
        Self::new(
            schema.base_value,
            schema.min_value,
            schema.max_value,
            schema.is_discrete,
        )
        .map_err(|e| StatError::InvalidSchema {
            name: schema.name.clone(),
            source: Box::new(e),
        })
    }

    /// The undecorated base value.
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Replace the base value.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFinite`] if `value` is NaN or infinite. The
    /// stat is left unchanged.
    pub fn set_base_value(&mut self, value: f64) -> Result<(), StatError> {
        if !value.is_finite() {
            return Err(StatError::NotFinite { field: "base_value" });
        }
        self.base_value = value;
        self.invalidate();
        Ok(())
    }

    /// The derived value after modifiers, clamping, and truncation.
    pub fn value(&self) -> f64 {
        if let Some(value) = self.cached.get() {
            return value;
        }
        let value = self.compute();
        self.cached.set(Some(value));
        self.recomputations
            .set(self.recomputations.get().saturating_add(1));
        value
    }

    /// Lower clamp bound.
    pub const fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Upper clamp bound.
    pub const fn max_value(&self) -> f64 {
        self.max_value
    }

    /// Whether the derived value is floored to an integer.
    pub const fn is_discrete(&self) -> bool {
        self.is_discrete
    }

    /// The derived value mapped onto `[0, 1]` across the bounds.
    ///
    /// Returns `0.0` when the bounds are equal or span an infinite range.
    pub fn normalized(&self) -> f64 {
        let range = self.max_value - self.min_value;
        if !range.is_finite() || range.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.value() - self.min_value) / range
    }

    /// Whether the next [`value`](Self::value) read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.cached.get().is_none()
    }

    /// Number of times the derived value has been recomputed.
    pub fn recompute_count(&self) -> u64 {
        self.recomputations.get()
    }

    /// Active modifiers in evaluation order.
    pub fn modifiers(&self) -> &[StatModifier] {
        &self.modifiers
    }

    /// Insert a modifier, keeping the list sorted by evaluation order.
    ///
    /// The sort is stable, so modifiers with equal order keep the order
    /// in which they were added.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NonFiniteModifier`] if the modifier's value is
    /// NaN or infinite.
    pub fn add_modifier(&mut self, modifier: StatModifier) -> Result<(), StatError> {
        if !modifier.value().is_finite() {
            return Err(StatError::NonFiniteModifier {
                stat: modifier.stat().to_owned(),
                value: modifier.value(),
            });
        }
        self.modifiers.push(modifier);
        self.modifiers.sort_by_key(StatModifier::order);
        self.invalidate();
        Ok(())
    }

    /// Remove the modifier with the given identity.
    ///
    /// Returns `true` if a modifier was removed.
    pub fn remove_modifier(&mut self, id: ModifierId) -> bool {
        let Some(position) = self.modifiers.iter().position(|m| m.id() == id) else {
            return false;
        };
        self.modifiers.remove(position);
        self.invalidate();
        true
    }

    /// Remove every modifier created by `source`.
    ///
    /// Returns `true` if at least one modifier was removed. The stat is only
    /// marked dirty when something was removed.
    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.source() != Some(source));
        let removed = self.modifiers.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Advance every duration-bounded modifier by one tick.
    ///
    /// Modifiers whose duration runs out are removed and returned in
    /// evaluation order.
    pub fn tick_modifiers(&mut self) -> Vec<StatModifier> {
        if self.modifiers.iter().all(|m| m.duration().is_none()) {
            return Vec::new();
        }

        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.modifiers.len());
        for mut modifier in self.modifiers.drain(..) {
            if modifier.tick() {
                kept.push(modifier);
            } else {
                expired.push(modifier);
            }
        }
        self.modifiers = kept;

        if !expired.is_empty() {
            self.invalidate();
        }
        expired
    }

    fn invalidate(&self) {
        self.cached.set(None);
    }

    fn compute(&self) -> f64 {
        let mut result = self.base_value;
        let mut percent_add_sum = 0.0;

        let mut iter = self.modifiers.iter().peekable();
        while let Some(modifier) = iter.next() {
            match modifier.modifier_type() {
                StatModifierType::Flat => result += modifier.value(),
                StatModifierType::PercentAdd => {
                    percent_add_sum += modifier.value();
                    let run_ends = iter
                        .peek()
                        .is_none_or(|next| next.modifier_type() != StatModifierType::PercentAdd);
                    if run_ends {
                        result *= 1.0 + percent_add_sum;
                        percent_add_sum = 0.0;
                    }
                }
                StatModifierType::PercentMultiply => result *= 1.0 + modifier.value(),
            }
        }

        // Finite inputs can still overflow into `inf * 0`.
        if result.is_nan() {
            return self.min_value;
        }
        let clamped = result.clamp(self.min_value, self.max_value);
        if self.is_discrete {
            clamped.floor()
        } else {
            clamped
        }
    }
}
