//! Named stats owned by one entity or relationship.
//!
//! Stats are stored in a [`BTreeMap`] keyed by name so iteration (and
//! therefore tick processing) is deterministic.

use std::collections::BTreeMap;

use tdrs_types::{ModifierId, SourceId, StatSchema};
use tracing::debug;

use crate::error::StatError;
use crate::modifier::StatModifier;
use crate::stat::Stat;

/// A set of named stats.
#[derive(Debug, Clone, Default)]
pub struct StatCollection {
    stats: BTreeMap<String, Stat>,
}

impl StatCollection {
    /// Create an empty collection.
    pub const fn new() -> Self {
        Self {
            stats: BTreeMap::new(),
        }
    }

    /// Build a collection with one stat per schema.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::InvalidSchema`] for a schema with bad bounds, or
    /// [`StatError::DuplicateStat`] if two schemas share a name.
    pub fn from_schemas<'a>(
        schemas: impl IntoIterator<Item = &'a StatSchema>,
    ) -> Result<Self, StatError> {
        let mut collection = Self::new();
        for schema in schemas {
            collection.add_stat(schema.name.clone(), Stat::from_schema(schema)?)?;
        }
        Ok(collection)
    }

    /// Add a stat under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::DuplicateStat`] if the name is already taken.
    pub fn add_stat(&mut self, name: String, stat: Stat) -> Result<(), StatError> {
        if self.stats.contains_key(&name) {
            return Err(StatError::DuplicateStat(name));
        }
        self.stats.insert(name, stat);
        Ok(())
    }

    /// Whether a stat with this name exists.
    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    /// Look up a stat by name.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFound`] if there is no such stat.
    pub fn get_stat(&self, name: &str) -> Result<&Stat, StatError> {
        self.stats
            .get(name)
            .ok_or_else(|| StatError::NotFound(String::from(name)))
    }

    /// Look up a stat by name, returning `None` when absent.
    pub fn try_get_stat(&self, name: &str) -> Option<&Stat> {
        self.stats.get(name)
    }

    /// Look up a stat by name for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFound`] if there is no such stat.
    pub fn get_stat_mut(&mut self, name: &str) -> Result<&mut Stat, StatError> {
        self.stats
            .get_mut(name)
            .ok_or_else(|| StatError::NotFound(String::from(name)))
    }

    /// The derived value of the named stat.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFound`] if there is no such stat.
    pub fn value(&self, name: &str) -> Result<f64, StatError> {
        self.get_stat(name).map(Stat::value)
    }

    /// Attach a modifier to the stat it names.
    ///
    /// Returns the modifier's identity for later removal.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::NotFound`] if the modifier targets a missing stat,
    /// or [`StatError::NonFiniteModifier`] if its value is NaN or infinite.
    pub fn add_modifier(&mut self, modifier: StatModifier) -> Result<ModifierId, StatError> {
        let id = modifier.id();
        let stat = self.get_stat_mut(modifier.stat())?;
        stat.add_modifier(modifier)?;
        Ok(id)
    }

    /// Remove a modifier by identity from whichever stat holds it.
    pub fn remove_modifier(&mut self, id: ModifierId) -> bool {
        self.stats
            .values_mut()
            .any(|stat| stat.remove_modifier(id))
    }

    /// Remove every modifier created by `source` across all stats.
    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> bool {
        let mut removed = false;
        for stat in self.stats.values_mut() {
            removed |= stat.remove_modifiers_from_source(source);
        }
        removed
    }

    /// Advance every stat's modifiers by one tick, returning those that expired.
    pub fn tick(&mut self) -> Vec<StatModifier> {
        let mut expired = Vec::new();
        for (name, stat) in &mut self.stats {
            let stat_expired = stat.tick_modifiers();
            if !stat_expired.is_empty() {
                debug!(
                    stat = name.as_str(),
                    expired = stat_expired.len(),
                    "Stat modifiers expired"
                );
                expired.extend(stat_expired);
            }
        }
        expired
    }

    /// Iterate over `(name, stat)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Stat)> {
        self.stats.iter().map(|(name, stat)| (name.as_str(), stat))
    }

    /// Number of stats.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether the collection has no stats.
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tdrs_types::{StatModifierData, StatModifierType};

    use super::*;

    fn relationship_stats() -> StatCollection {
        let schemas = [
            StatSchema::new("Friendship", 0.0, -100.0, 100.0),
            StatSchema::new("Romance", 0.0, -100.0, 100.0).discrete(),
        ];
        StatCollection::from_schemas(&schemas).unwrap()
    }

    #[test]
    fn from_schemas_builds_each_stat() {
        let stats = relationship_stats();
        assert_eq!(stats.len(), 2);
        assert!(stats.has_stat("Friendship"));
        assert!(stats.try_get_stat("Romance").is_some_and(Stat::is_discrete));
    }

    #[test]
    fn duplicate_schema_names_are_rejected() {
        let schemas = [
            StatSchema::new("Friendship", 0.0, -100.0, 100.0),
            StatSchema::new("Friendship", 5.0, -100.0, 100.0),
        ];
        let result = StatCollection::from_schemas(&schemas);
        assert!(matches!(result, Err(StatError::DuplicateStat(ref n)) if n == "Friendship"));
    }

    #[test]
    fn missing_stat_is_not_found() {
        let stats = relationship_stats();
        assert!(matches!(stats.get_stat("Trust"), Err(StatError::NotFound(_))));
        assert!(stats.try_get_stat("Trust").is_none());
        assert!(stats.value("Trust").is_err());
    }

    #[test]
    fn add_modifier_routes_by_stat_name() {
        let mut stats = relationship_stats();
        stats
            .add_modifier(StatModifier::new("Romance", 7.5, StatModifierType::Flat))
            .unwrap();
        assert!((stats.value("Romance").unwrap() - 7.0).abs() < 1e-9);
        assert!(stats.value("Friendship").unwrap().abs() < 1e-9);
    }

    #[test]
    fn add_modifier_to_missing_stat_fails() {
        let mut stats = relationship_stats();
        let result = stats.add_modifier(StatModifier::new("Trust", 1.0, StatModifierType::Flat));
        assert!(matches!(result, Err(StatError::NotFound(ref n)) if n == "Trust"));
    }

    #[test]
    fn infinite_modifier_from_data_is_rejected() {
        let mut stats = relationship_stats();
        let data = StatModifierData::new("Friendship", f64::INFINITY, StatModifierType::Flat);
        let result = stats.add_modifier(StatModifier::from_data(&data, Some(SourceId::new())));
        assert!(matches!(result, Err(StatError::NonFiniteModifier { ref stat, .. }) if stat == "Friendship"));
        assert!(stats.get_stat("Friendship").unwrap().modifiers().is_empty());
        assert!(stats.value("Friendship").unwrap().abs() < 1e-9);
    }

    #[test]
    fn remove_by_id_and_source_span_stats() {
        let mut stats = relationship_stats();
        let source = SourceId::new();
        stats
            .add_modifier(StatModifier::new("Friendship", 5.0, StatModifierType::Flat).with_source(source))
            .unwrap();
        stats
            .add_modifier(StatModifier::new("Romance", 5.0, StatModifierType::Flat).with_source(source))
            .unwrap();
        let lone = stats
            .add_modifier(StatModifier::new("Romance", 1.0, StatModifierType::Flat))
            .unwrap();

        assert!(stats.remove_modifiers_from_source(source));
        assert!(!stats.remove_modifiers_from_source(source));
        assert!(stats.value("Friendship").unwrap().abs() < 1e-9);
        assert!((stats.value("Romance").unwrap() - 1.0).abs() < 1e-9);

        assert!(stats.remove_modifier(lone));
        assert!(stats.value("Romance").unwrap().abs() < 1e-9);
    }

    #[test]
    fn tick_collects_expired_across_stats() {
        let mut stats = relationship_stats();
        stats
            .add_modifier(StatModifier::new("Friendship", 5.0, StatModifierType::Flat).with_duration(1))
            .unwrap();
        stats
            .add_modifier(StatModifier::new("Romance", 5.0, StatModifierType::Flat).with_duration(1))
            .unwrap();
        let expired = stats.tick();
        assert_eq!(expired.len(), 2);
        assert!(stats.tick().is_empty());
    }
}
