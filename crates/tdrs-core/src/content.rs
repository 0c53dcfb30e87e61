//! Content definitions: traits, social rules, schemas, and scenarios.
//!
//! Content is authored as YAML and deserialized into the `*Def` structs in
//! this module, then resolved into runtime values by [`Content::build`].
//! Resolution is strict. An unknown trait or rule reference, a duplicate
//! ID, or a rule that (directly or through nested rules) grants itself is
//! rejected with a [`ContentError`] before anything reaches the engine.
//!
//! Rules are named in content so traits, entity kinds, and other rules can
//! refer to them. Nested rules (`AddSocialRule`) are built first and shared
//! through [`Arc`], so every reference to a rule name yields the same rule
//! identity.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tdrs_social::{
    Effect, OpinionRule, OpinionSystem, Precondition, SharedTraitBonus, SocialEngine,
    SocialError, SocialRule, TraitDefinition,
};
use tdrs_types::{
    EntitySchema, RelationshipSchema, RuleOrientation, StatModifierData, StatSchema, Subject,
    TraitId, TraitKind,
};
use tracing::debug;

use crate::config::OpinionConfig;

/// Errors that can occur while loading or resolving content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Failed to read the content file from disk.
    #[error("failed to read content file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse content YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A trait was referenced but never defined.
    #[error("unknown trait {trait_id} referenced by {context}")]
    UnknownTrait {
        /// The missing trait.
        trait_id: TraitId,
        /// Where the reference appeared.
        context: String,
    },

    /// A rule was referenced but never defined.
    #[error("unknown rule {name} referenced by {context}")]
    UnknownRule {
        /// The missing rule name.
        name: String,
        /// Where the reference appeared.
        context: String,
    },

    /// Rules grant each other in a cycle.
    #[error("rule {name} grants itself through nested rules")]
    RuleCycle {
        /// A rule on the cycle.
        name: String,
    },

    /// Two definitions share an identifier.
    #[error("duplicate {what}: {name}")]
    Duplicate {
        /// What kind of definition was duplicated.
        what: &'static str,
        /// The duplicated identifier.
        name: String,
    },

    /// A stat modifier carries a NaN or infinite value.
    #[error("modifier for stat {stat} in {context} has non-finite value {value}")]
    NonFiniteModifier {
        /// The stat the modifier targets.
        stat: String,
        /// The rejected value.
        value: f64,
        /// Where the modifier appeared.
        context: String,
    },

    /// A scenario entity uses an entity kind that is not defined.
    #[error("scenario entity {entity} has unknown kind {kind}")]
    UnknownKind {
        /// The missing kind.
        kind: String,
        /// The scenario entity that used it.
        entity: String,
    },

    /// A scenario refers to an entity name it never declared.
    #[error("unknown scenario entity: {0}")]
    UnknownEntity(String),

    /// The social engine rejected a definition.
    #[error("social error: {source}")]
    Social {
        /// The underlying social error.
        #[from]
        source: SocialError,
    },
}

impl From<serde_yml::Error> for ContentError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Serialized definitions
// ---------------------------------------------------------------------------

/// A content file as authored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentFile {
    /// Trait definitions.
    #[serde(default)]
    pub traits: Vec<TraitDef>,

    /// Named social rules.
    #[serde(default)]
    pub rules: Vec<RuleDef>,

    /// Entity kinds with their stats, default traits, and rules.
    #[serde(default)]
    pub entity_kinds: Vec<EntityKindDef>,

    /// Stats and default traits of every relationship.
    #[serde(default)]
    pub relationship: RelationshipSchema,

    /// Trait-driven opinion rules.
    #[serde(default)]
    pub opinion_rules: Vec<OpinionRule>,

    /// Flat opinion bonuses for traits both parties hold.
    #[serde(default)]
    pub shared_traits: Vec<SharedTraitBonus>,

    /// Starting population.
    #[serde(default)]
    pub scenario: ScenarioDef,
}

/// A trait as authored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraitDef {
    /// Unique trait ID.
    pub id: TraitId,
    /// Display name; defaults to the ID.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Entity or relationship trait.
    pub kind: TraitKind,
    /// Effects granted while held.
    #[serde(default)]
    pub effects: Vec<EffectDef>,
    /// Traits that cannot be held alongside this one.
    #[serde(default)]
    pub conflicts_with: Vec<TraitId>,
}

/// An effect as authored. Nested rules are referenced by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum EffectDef {
    /// See [`Effect::AddStatModifier`].
    AddStatModifier {
        /// Whose stats receive the modifier.
        #[serde(default)]
        subject: Subject,
        /// The modifier.
        modifier: StatModifierData,
    },
    /// See [`Effect::AddTrait`].
    AddTrait {
        /// Who receives the trait.
        #[serde(default)]
        subject: Subject,
        /// The trait to add.
        trait_id: TraitId,
        /// Ticks the trait lasts.
        #[serde(default)]
        duration: Option<u32>,
    },
    /// See [`Effect::AddSocialRule`].
    AddSocialRule {
        /// The entity that receives the rule.
        #[serde(default)]
        subject: Subject,
        /// Name of the rule to attach.
        rule: String,
    },
}

/// A named social rule as authored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleDef {
    /// Unique rule name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Which side of a relationship the rule applies to.
    #[serde(default)]
    pub orientation: RuleOrientation,
    /// Conjunctive preconditions.
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    /// Effects applied while the preconditions hold.
    #[serde(default)]
    pub effects: Vec<EffectDef>,
}

/// An entity kind as authored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityKindDef {
    /// Kind name.
    pub kind: String,
    /// Stats every entity of this kind starts with.
    #[serde(default)]
    pub stats: Vec<StatSchema>,
    /// Traits every entity of this kind starts with.
    #[serde(default)]
    pub traits: Vec<TraitId>,
    /// Rules attached to every entity of this kind.
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Starting population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScenarioDef {
    /// Named entities to create.
    #[serde(default)]
    pub entities: Vec<ScenarioEntity>,
    /// Relationships between named entities.
    #[serde(default)]
    pub relationships: Vec<ScenarioRelationship>,
}

/// One entity of the starting population.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioEntity {
    /// Unique name within the scenario.
    pub name: String,
    /// Entity kind.
    pub kind: String,
    /// Traits beyond the kind's defaults.
    #[serde(default)]
    pub traits: Vec<TraitId>,
}

/// One relationship of the starting population.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioRelationship {
    /// Owner entity name.
    pub owner: String,
    /// Target entity name.
    pub target: String,
    /// Relationship traits beyond the schema defaults.
    #[serde(default)]
    pub traits: Vec<TraitId>,
}

// ---------------------------------------------------------------------------
// Resolved content
// ---------------------------------------------------------------------------

/// An entity kind ready for registration.
#[derive(Debug, Clone)]
pub struct EntityKind {
    /// Stats and default traits.
    pub schema: EntitySchema,
    /// Rules attached to every entity of this kind.
    pub rules: Vec<Arc<SocialRule>>,
}

/// Fully resolved content.
#[derive(Debug, Clone)]
pub struct Content {
    /// Trait definitions in authored order.
    pub traits: Vec<TraitDefinition>,
    /// Rules by name.
    pub rules: BTreeMap<String, Arc<SocialRule>>,
    /// Entity kinds by name.
    pub entity_kinds: BTreeMap<String, EntityKind>,
    /// Relationship schema.
    pub relationship: RelationshipSchema,
    /// Opinion rules.
    pub opinion_rules: Vec<OpinionRule>,
    /// Shared-trait opinion bonuses.
    pub shared_traits: Vec<SharedTraitBonus>,
    /// Starting population.
    pub scenario: ScenarioDef,
}

impl Content {
    /// Load and resolve content from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Io`] if the file cannot be read, or any error
    /// from [`Content::parse`].
    pub fn from_file(path: &Path) -> Result<Self, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and resolve content from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Yaml`] for malformed YAML, or any error from
    /// [`Content::build`].
    pub fn parse(yaml: &str) -> Result<Self, ContentError> {
        let file: ContentFile = serde_yml::from_str(yaml)?;
        Self::build(file)
    }

    /// Resolve authored definitions into runtime values.
    ///
    /// # Errors
    ///
    /// Returns a [`ContentError`] for duplicate IDs, unknown trait or rule
    /// references, or cyclic nested rules.
    pub fn build(file: ContentFile) -> Result<Self, ContentError> {
        let trait_ids = collect_unique(file.traits.iter().map(|t| t.id.as_str()), "trait")?;
        let known = |trait_id: &TraitId, context: &str| {
            if trait_ids.contains(trait_id.as_str()) {
                Ok(())
            } else {
                Err(ContentError::UnknownTrait {
                    trait_id: trait_id.clone(),
                    context: context.to_owned(),
                })
            }
        };

        collect_unique(file.rules.iter().map(|r| r.name.as_str()), "rule")?;
        let mut resolver = RuleResolver {
            defs: file.rules.iter().map(|r| (r.name.as_str(), r)).collect(),
            built: BTreeMap::new(),
            visiting: BTreeSet::new(),
        };
        for def in &file.rules {
            let context = format!("rule {}", def.name);
            for precondition in &def.preconditions {
                for trait_id in precondition.referenced_traits() {
                    known(trait_id, &context)?;
                }
            }
            check_effects(&def.effects, &context, &known)?;
            resolver.resolve(&def.name, &context)?;
        }

        let mut traits = Vec::with_capacity(file.traits.len());
        for def in &file.traits {
            let context = format!("trait {}", def.id);
            check_effects(&def.effects, &context, &known)?;
            for other in &def.conflicts_with {
                known(other, &context)?;
            }
            let mut definition = TraitDefinition::new(def.id.clone(), def.kind)
                .with_description(def.description.clone());
            if let Some(name) = &def.display_name {
                definition.display_name.clone_from(name);
            }
            for effect in &def.effects {
                definition = definition.with_effect(resolver.effect(effect, &context)?);
            }
            for other in &def.conflicts_with {
                definition = definition.with_conflict(other.clone());
            }
            traits.push(definition);
        }

        collect_unique(file.entity_kinds.iter().map(|k| k.kind.as_str()), "entity kind")?;
        let mut entity_kinds = BTreeMap::new();
        for def in &file.entity_kinds {
            let context = format!("entity kind {}", def.kind);
            for trait_id in &def.traits {
                known(trait_id, &context)?;
            }
            let mut rules = Vec::with_capacity(def.rules.len());
            for name in &def.rules {
                rules.push(resolver.resolve(name, &context)?);
            }
            let schema = EntitySchema {
                kind: def.kind.clone(),
                stats: def.stats.clone(),
                traits: def.traits.clone(),
            };
            entity_kinds.insert(def.kind.clone(), EntityKind { schema, rules });
        }

        for trait_id in &file.relationship.traits {
            known(trait_id, "relationship schema")?;
        }
        for rule in &file.opinion_rules {
            let context = format!("opinion rule '{}'", rule.description);
            for trait_id in rule.subject_trait.iter().chain(&rule.object_trait) {
                known(trait_id, &context)?;
            }
        }
        for bonus in &file.shared_traits {
            known(&bonus.trait_id, "shared trait bonus")?;
        }

        let names =
            collect_unique(file.scenario.entities.iter().map(|e| e.name.as_str()), "scenario entity")?;
        for entity in &file.scenario.entities {
            if !entity_kinds.contains_key(&entity.kind) {
                return Err(ContentError::UnknownKind {
                    kind: entity.kind.clone(),
                    entity: entity.name.clone(),
                });
            }
            for trait_id in &entity.traits {
                known(trait_id, &format!("scenario entity {}", entity.name))?;
            }
        }
        for relationship in &file.scenario.relationships {
            for name in [&relationship.owner, &relationship.target] {
                if !names.contains(name.as_str()) {
                    return Err(ContentError::UnknownEntity(name.clone()));
                }
            }
            for trait_id in &relationship.traits {
                known(
                    trait_id,
                    &format!("relationship {} -> {}", relationship.owner, relationship.target),
                )?;
            }
        }

        debug!(
            traits = traits.len(),
            rules = resolver.built.len(),
            entity_kinds = entity_kinds.len(),
            "Content resolved"
        );

        Ok(Self {
            traits,
            rules: resolver.built,
            entity_kinds,
            relationship: file.relationship,
            opinion_rules: file.opinion_rules,
            shared_traits: file.shared_traits,
            scenario: file.scenario,
        })
    }

    /// Register traits and schemas with `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Social`] if the engine rejects a definition
    /// (for example a stat schema with `min_value > max_value`).
    pub fn install(&self, engine: &mut SocialEngine) -> Result<(), ContentError> {
        for definition in &self.traits {
            engine.add_trait_definition(definition.clone())?;
        }
        for kind in self.entity_kinds.values() {
            engine.add_entity_schema(kind.schema.clone())?;
        }
        engine.set_relationship_schema(self.relationship.clone())?;
        Ok(())
    }

    /// Build the opinion system described by the content and `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Social`] for invalid bounds or rules.
    pub fn opinion_system(
        &self,
        config: &OpinionConfig,
        engine: &SocialEngine,
    ) -> Result<OpinionSystem, ContentError> {
        let mut system = OpinionSystem::new(config.base, config.min, config.max)?;
        for rule in &self.opinion_rules {
            system.add_rule(rule.clone(), engine.trait_library())?;
        }
        for bonus in &self.shared_traits {
            system.add_shared_trait(bonus.trait_id.clone(), bonus.value, engine.trait_library())?;
        }
        Ok(system)
    }

    /// The named rule, if defined.
    pub fn rule(&self, name: &str) -> Option<&Arc<SocialRule>> {
        self.rules.get(name)
    }
}

fn collect_unique<'a>(
    names: impl Iterator<Item = &'a str>,
    what: &'static str,
) -> Result<BTreeSet<&'a str>, ContentError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ContentError::Duplicate {
                what,
                name: name.to_owned(),
            });
        }
    }
    Ok(seen)
}

fn check_effects(
    effects: &[EffectDef],
    context: &str,
    known: &impl Fn(&TraitId, &str) -> Result<(), ContentError>,
) -> Result<(), ContentError> {
    for effect in effects {
        match effect {
            EffectDef::AddTrait { trait_id, .. } => known(trait_id, context)?,
            EffectDef::AddStatModifier { modifier, .. } if !modifier.value.is_finite() => {
                return Err(ContentError::NonFiniteModifier {
                    stat: modifier.stat.clone(),
                    value: modifier.value,
                    context: context.to_owned(),
                });
            }
            EffectDef::AddStatModifier { .. } | EffectDef::AddSocialRule { .. } => {}
        }
    }
    Ok(())
}

/// Builds named rules depth-first so nested rules exist before their parents.
struct RuleResolver<'a> {
    defs: BTreeMap<&'a str, &'a RuleDef>,
    built: BTreeMap<String, Arc<SocialRule>>,
    visiting: BTreeSet<&'a str>,
}

impl<'a> RuleResolver<'a> {
    fn resolve(&mut self, name: &str, context: &str) -> Result<Arc<SocialRule>, ContentError> {
        if let Some(rule) = self.built.get(name) {
            return Ok(Arc::clone(rule));
        }
        let Some((&key, &def)) = self.defs.get_key_value(name) else {
            return Err(ContentError::UnknownRule {
                name: name.to_owned(),
                context: context.to_owned(),
            });
        };
        if !self.visiting.insert(key) {
            return Err(ContentError::RuleCycle {
                name: name.to_owned(),
            });
        }

        let rule_context = format!("rule {key}");
        let mut effects = Vec::with_capacity(def.effects.len());
        for effect in &def.effects {
            effects.push(self.effect(effect, &rule_context)?);
        }
        self.visiting.remove(key);

        let rule = Arc::new(
            SocialRule::new(def.preconditions.clone(), effects, def.orientation)
                .with_description(def.description.clone()),
        );
        self.built.insert(key.to_owned(), Arc::clone(&rule));
        Ok(rule)
    }

    fn effect(&mut self, def: &EffectDef, context: &str) -> Result<Effect, ContentError> {
        Ok(match def {
            EffectDef::AddStatModifier { subject, modifier } => {
                Effect::add_stat_modifier(*subject, modifier.clone())
            }
            EffectDef::AddTrait {
                subject,
                trait_id,
                duration,
            } => Effect::AddTrait {
                subject: *subject,
                trait_id: trait_id.clone(),
                duration: *duration,
            },
            EffectDef::AddSocialRule { subject, rule } => {
                Effect::add_social_rule(*subject, self.resolve(rule, context)?)
            }
        })
    }
}
