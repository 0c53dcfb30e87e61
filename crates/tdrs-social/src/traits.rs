//! Trait definitions, the trait library, and per-holder trait collections.
//!
//! A [`TraitDefinition`] is authored content: an ID, descriptive text, the
//! kind of holder it applies to, the effects it grants while held, and the
//! traits it cannot coexist with. The [`TraitLibrary`] is the registry of
//! definitions. A [`TraitCollection`] records which traits one entity or
//! relationship currently holds, each as a [`HeldTrait`] instance with its
//! own source token.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tdrs_types::{SourceId, TraitId, TraitKind};

use crate::effect::Effect;
use crate::error::SocialError;

// ---------------------------------------------------------------------------
// TraitDefinition
// ---------------------------------------------------------------------------

/// Authored description of a trait.
#[derive(Debug, Clone)]
pub struct TraitDefinition {
    /// Unique content identifier.
    pub id: TraitId,
    /// Name shown to players.
    pub display_name: String,
    /// Longer description for tooling.
    pub description: String,
    /// Whether entities or relationships hold this trait.
    pub kind: TraitKind,
    /// Effects applied to the holder while the trait is held.
    pub effects: Vec<Effect>,
    /// Traits that cannot be held at the same time as this one.
    pub conflicts_with: BTreeSet<TraitId>,
}

impl TraitDefinition {
    /// Create a definition with no effects or conflicts.
    ///
    /// The display name defaults to the ID.
    pub fn new(id: impl Into<TraitId>, kind: TraitKind) -> Self {
        let id = id.into();
        Self {
            display_name: id.0.clone(),
            id,
            description: String::new(),
            kind,
            effects: Vec::new(),
            conflicts_with: BTreeSet::new(),
        }
    }

    /// Add an effect granted while the trait is held.
    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Declare a conflicting trait.
    #[must_use]
    pub fn with_conflict(mut self, other: impl Into<TraitId>) -> Self {
        self.conflicts_with.insert(other.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ---------------------------------------------------------------------------
// TraitLibrary
// ---------------------------------------------------------------------------

/// Registry of every trait definition known to the engine.
#[derive(Debug, Clone, Default)]
pub struct TraitLibrary {
    traits: BTreeMap<TraitId, Arc<TraitDefinition>>,
}

impl TraitLibrary {
    /// Create an empty library.
    pub const fn new() -> Self {
        Self {
            traits: BTreeMap::new(),
        }
    }

    /// Register a definition.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::DuplicateTrait`] if the ID is already registered.
    pub fn add(&mut self, definition: TraitDefinition) -> Result<(), SocialError> {
        if self.traits.contains_key(&definition.id) {
            return Err(SocialError::DuplicateTrait(definition.id));
        }
        self.traits
            .insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    /// Whether a definition with this ID exists.
    pub fn contains(&self, id: &TraitId) -> bool {
        self.traits.contains_key(id)
    }

    /// Look up a definition.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::TraitNotFound`] if there is no such trait.
    pub fn get(&self, id: &TraitId) -> Result<&Arc<TraitDefinition>, SocialError> {
        self.traits
            .get(id)
            .ok_or_else(|| SocialError::TraitNotFound(id.clone()))
    }

    /// Look up a definition, returning `None` when absent.
    pub fn try_get(&self, id: &TraitId) -> Option<&Arc<TraitDefinition>> {
        self.traits.get(id)
    }

    /// Confirm that `id` is registered.
    ///
    /// # Errors
    ///
    /// Returns [`SocialError::TraitNotFound`] if there is no such trait.
    pub fn require(&self, id: &TraitId) -> Result<(), SocialError> {
        self.get(id).map(|_| ())
    }

    /// Whether two traits are declared as conflicting, in either direction.
    pub fn conflicts(&self, a: &TraitId, b: &TraitId) -> bool {
        let declared =
            |x: &TraitId, y: &TraitId| self.traits.get(x).is_some_and(|d| d.conflicts_with.contains(y));
        declared(a, b) || declared(b, a)
    }

    /// Iterate over definitions in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TraitDefinition>> {
        self.traits.values()
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TraitCollection
// ---------------------------------------------------------------------------

/// One trait currently held by an entity or relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldTrait {
    /// Source token for the effects this instance applied.
    pub instance: SourceId,
    /// Remaining ticks, or `None` when held until removed.
    pub duration: Option<u32>,
    /// The source that added the trait, if it was added by an effect.
    pub added_by: Option<SourceId>,
    /// Other sources that granted the trait while it was already held.
    pub also_granted_by: BTreeSet<SourceId>,
}

impl HeldTrait {
    /// A fresh instance with no other claims.
    pub fn new(duration: Option<u32>, added_by: Option<SourceId>) -> Self {
        Self {
            instance: SourceId::new(),
            duration,
            added_by,
            also_granted_by: BTreeSet::new(),
        }
    }

    /// Record `source` granting the trait again. The longer duration wins.
    pub(crate) fn share(&mut self, source: SourceId, duration: Option<u32>) {
        if self.added_by != Some(source) {
            self.also_granted_by.insert(source);
        }
        self.duration = match (self.duration, duration) {
            (Some(current), Some(requested)) => Some(current.max(requested)),
            _ => None,
        };
    }
}

/// The traits held by one entity or relationship.
#[derive(Debug, Clone, Default)]
pub struct TraitCollection {
    held: BTreeMap<TraitId, HeldTrait>,
}

impl TraitCollection {
    /// Create an empty collection.
    pub const fn new() -> Self {
        Self {
            held: BTreeMap::new(),
        }
    }

    /// Whether the trait is held.
    pub fn contains(&self, id: &TraitId) -> bool {
        self.held.contains_key(id)
    }

    /// The held instance of a trait, if any.
    pub fn get(&self, id: &TraitId) -> Option<&HeldTrait> {
        self.held.get(id)
    }

    /// Iterate over held trait IDs in order.
    pub fn ids(&self) -> impl Iterator<Item = &TraitId> {
        self.held.keys()
    }

    /// Iterate over held traits and their instances.
    pub fn iter(&self) -> impl Iterator<Item = (&TraitId, &HeldTrait)> {
        self.held.iter()
    }

    /// Number of held traits.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Whether no traits are held.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub(crate) fn insert(&mut self, id: TraitId, held: HeldTrait) {
        self.held.insert(id, held);
    }

    pub(crate) fn remove(&mut self, id: &TraitId) -> Option<HeldTrait> {
        self.held.remove(id)
    }

    pub(crate) fn get_mut(&mut self, id: &TraitId) -> Option<&mut HeldTrait> {
        self.held.get_mut(id)
    }

    /// Drop `source`'s claim on a held trait.
    ///
    /// Returns `true` when `source` held the last claim, meaning the trait
    /// should now be removed. When another source still claims it, that
    /// source becomes the adder and `false` is returned.
    pub(crate) fn release(&mut self, id: &TraitId, source: SourceId) -> bool {
        let Some(held) = self.held.get_mut(id) else {
            return false;
        };
        if held.added_by != Some(source) {
            held.also_granted_by.remove(&source);
            return false;
        }
        match held.also_granted_by.pop_first() {
            Some(next) => {
                held.added_by = Some(next);
                false
            }
            None => true,
        }
    }

    /// Count down timed traits, returning the IDs whose duration ran out.
    ///
    /// Expired traits are left in place so the caller can retract their
    /// effects through the normal removal path.
    pub(crate) fn tick(&mut self) -> Vec<TraitId> {
        let mut expired = Vec::new();
        for (id, held) in &mut self.held {
            if let Some(remaining) = held.duration {
                let next = remaining.saturating_sub(1);
                held.duration = Some(next);
                if next == 0 {
                    expired.push(id.clone());
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(duration: Option<u32>) -> HeldTrait {
        HeldTrait::new(duration, None)
    }

    #[test]
    fn library_rejects_duplicates() {
        let mut library = TraitLibrary::new();
        assert!(library.add(TraitDefinition::new("honest", TraitKind::Entity)).is_ok());
        let result = library.add(TraitDefinition::new("honest", TraitKind::Entity));
        assert!(matches!(result, Err(SocialError::DuplicateTrait(_))));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn missing_trait_is_not_found() {
        let library = TraitLibrary::new();
        let id = TraitId::new("brave");
        assert!(matches!(library.get(&id), Err(SocialError::TraitNotFound(_))));
        assert!(library.try_get(&id).is_none());
        assert!(library.require(&id).is_err());
    }

    #[test]
    fn conflicts_are_symmetric() {
        let mut library = TraitLibrary::new();
        let _ = library.add(TraitDefinition::new("honest", TraitKind::Entity).with_conflict("deceitful"));
        let _ = library.add(TraitDefinition::new("deceitful", TraitKind::Entity));
        let honest = TraitId::new("honest");
        let deceitful = TraitId::new("deceitful");
        assert!(library.conflicts(&honest, &deceitful));
        assert!(library.conflicts(&deceitful, &honest));
        assert!(!library.conflicts(&honest, &honest));
    }

    #[test]
    fn display_name_defaults_to_id() {
        let def = TraitDefinition::new("kind_hearted", TraitKind::Entity);
        assert_eq!(def.display_name, "kind_hearted");
    }

    #[test]
    fn collection_tick_reports_expired() {
        let mut traits = TraitCollection::new();
        traits.insert(TraitId::new("grieving"), held(Some(2)));
        traits.insert(TraitId::new("honest"), held(None));

        assert!(traits.tick().is_empty());
        assert_eq!(traits.tick(), vec![TraitId::new("grieving")]);
        // Expired traits stay until the engine removes them.
        assert!(traits.contains(&TraitId::new("grieving")));
        assert_eq!(traits.len(), 2);
    }

    #[test]
    fn shared_trait_lasts_until_every_claim_is_released() {
        let first = SourceId::new();
        let second = SourceId::new();
        let honest = TraitId::new("honest");
        let mut traits = TraitCollection::new();
        traits.insert(honest.clone(), HeldTrait::new(Some(2), Some(first)));
        if let Some(entry) = traits.get_mut(&honest) {
            entry.share(second, None);
        }
        assert_eq!(traits.get(&honest).map(|h| h.duration), Some(None));

        assert!(!traits.release(&honest, first));
        assert_eq!(traits.get(&honest).and_then(|h| h.added_by), Some(second));
        assert!(traits.release(&honest, second));
    }

    #[test]
    fn releasing_an_unknown_claim_keeps_the_trait() {
        let honest = TraitId::new("honest");
        let mut traits = TraitCollection::new();
        traits.insert(honest.clone(), held(None));
        assert!(!traits.release(&honest, SourceId::new()));
        assert!(!traits.release(&TraitId::new("brave"), SourceId::new()));
    }
}
