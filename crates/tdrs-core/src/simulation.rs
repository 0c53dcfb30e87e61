//! The tick driver.
//!
//! A [`Simulation`] pairs a [`SocialEngine`] with the content it was built
//! from. It knows entities by their scenario names, attaches each kind's
//! rules when an entity is spawned, and advances the engine one tick at a
//! time, logging a summary per tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tdrs_social::{
    Opinion, OpinionSystem, RuleTarget, SocialEngine, SocialError, SocialRule, TickReport,
};
use tdrs_types::{EntityId, SourceId};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::content::{Content, ContentError, ScenarioDef};

/// Errors that can occur while driving a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Content could not be installed.
    #[error("content error: {source}")]
    Content {
        /// The underlying content error.
        #[from]
        source: ContentError,
    },

    /// The social engine reported an error.
    #[error("social error: {source}")]
    Social {
        /// The underlying social error.
        #[from]
        source: SocialError,
    },

    /// No entity has the given name.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// An entity with the given name already exists.
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    /// Tick counter would overflow.
    #[error("tick counter overflow")]
    TickOverflow,
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// The tick that just completed (1-based).
    pub tick: u64,
    /// What the social engine did during the tick.
    pub report: TickReport,
}

/// Point-in-time view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    /// Scenario name.
    pub name: String,
    /// Entity kind.
    pub kind: String,
    /// Held trait IDs.
    pub traits: Vec<String>,
    /// Current stat values by name.
    pub stats: BTreeMap<String, f64>,
}

/// Point-in-time view of one relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipSnapshot {
    /// Owner name.
    pub owner: String,
    /// Target name.
    pub target: String,
    /// Held trait IDs.
    pub traits: Vec<String>,
    /// Current stat values by name.
    pub stats: BTreeMap<String, f64>,
    /// Number of social rules currently applied.
    pub active_rules: usize,
    /// The owner's opinion of the target.
    pub opinion: f64,
}

/// Point-in-time view of the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    /// Ticks completed so far.
    pub tick: u64,
    /// Entities in name order.
    pub entities: Vec<EntitySnapshot>,
    /// Relationships in owner, target name order.
    pub relationships: Vec<RelationshipSnapshot>,
}

/// A social engine driven tick by tick.
#[derive(Debug)]
pub struct Simulation {
    engine: SocialEngine,
    opinions: OpinionSystem,
    kind_rules: BTreeMap<String, Vec<Arc<SocialRule>>>,
    names: BTreeMap<String, EntityId>,
    /// Source recorded on rules attached because of an entity's kind.
    kind_source: SourceId,
    tick: u64,
}

impl Simulation {
    /// Build an empty simulation from configuration and resolved content.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Content`] if the engine rejects the content.
    pub fn new(config: &SimulationConfig, content: &Content) -> Result<Self, SimulationError> {
        let mut engine = SocialEngine::with_settings(config.engine.settings());
        content.install(&mut engine)?;
        let opinions = content.opinion_system(&config.opinion, &engine)?;
        let kind_rules = content
            .entity_kinds
            .iter()
            .map(|(kind, def)| (kind.clone(), def.rules.clone()))
            .collect();

        info!(
            traits = engine.trait_library().len(),
            entity_kinds = content.entity_kinds.len(),
            rules = content.rules.len(),
            "Simulation initialized"
        );

        Ok(Self {
            engine,
            opinions,
            kind_rules,
            names: BTreeMap::new(),
            kind_source: SourceId::new(),
            tick: 0,
        })
    }

    /// The underlying engine.
    pub const fn engine(&self) -> &SocialEngine {
        &self.engine
    }

    /// The underlying engine, for direct mutation.
    pub const fn engine_mut(&mut self) -> &mut SocialEngine {
        &mut self.engine
    }

    /// Ticks completed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// The entity registered under `name`.
    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<EntityId, SimulationError> {
        self.entity_id(name)
            .ok_or_else(|| SimulationError::UnknownEntity(name.to_owned()))
    }

    /// Create an entity of `kind` under `name` and attach the kind's rules.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::DuplicateEntity`] if the name is taken, or
    /// [`SimulationError::Social`] if the engine rejects the entity.
    pub fn spawn(&mut self, name: &str, kind: &str) -> Result<EntityId, SimulationError> {
        if self.names.contains_key(name) {
            return Err(SimulationError::DuplicateEntity(name.to_owned()));
        }
        let id = self.engine.add_entity(kind)?;
        let rules = self.kind_rules.get(kind).cloned().unwrap_or_default();
        for rule in rules {
            self.engine.add_social_rule(id, rule, Some(self.kind_source))?;
        }
        self.names.insert(name.to_owned(), id);
        debug!(name, kind, entity_id = %id, "Entity spawned");
        Ok(id)
    }

    /// Connect two named entities.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownEntity`] for an unknown name, or
    /// [`SimulationError::Social`] if the engine rejects the relationship.
    pub fn connect(&mut self, owner: &str, target: &str) -> Result<(), SimulationError> {
        let owner = self.require(owner)?;
        let target = self.require(target)?;
        self.engine.add_relationship(owner, target)?;
        Ok(())
    }

    /// Create a scenario's entities, traits, and relationships.
    ///
    /// # Errors
    ///
    /// Returns the first spawn, trait, or relationship failure.
    pub fn populate(&mut self, scenario: &ScenarioDef) -> Result<(), SimulationError> {
        for entity in &scenario.entities {
            let id = self.spawn(&entity.name, &entity.kind)?;
            for trait_id in &entity.traits {
                self.engine
                    .add_trait(RuleTarget::Entity(id), trait_id, None, None)?;
            }
        }
        for relationship in &scenario.relationships {
            let owner = self.require(&relationship.owner)?;
            let target = self.require(&relationship.target)?;
            let id = self.engine.add_relationship(owner, target)?;
            for trait_id in &relationship.traits {
                self.engine
                    .add_trait(RuleTarget::Relationship(id), trait_id, None, None)?;
            }
        }
        info!(
            entities = self.engine.entity_count(),
            relationships = self.engine.relationship_count(),
            "Scenario populated"
        );
        Ok(())
    }

    /// What `subject` thinks of `object`, by name.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownEntity`] for an unknown name.
    pub fn opinion_of(&self, subject: &str, object: &str) -> Result<Opinion, SimulationError> {
        let subject = self.require(subject)?;
        let object = self.require(object)?;
        Ok(self.opinions.opinion_of(&self.engine, subject, object)?)
    }

    /// Advance one tick.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::TickOverflow`] if the counter would
    /// overflow, or [`SimulationError::Social`] if the engine fails.
    pub fn step(&mut self) -> Result<TickSummary, SimulationError> {
        let tick = self
            .tick
            .checked_add(1)
            .ok_or(SimulationError::TickOverflow)?;
        let report = self.engine.tick()?;
        self.tick = tick;

        info!(
            tick,
            expired_modifiers = report.expired_modifiers,
            expired_traits = report.expired_traits,
            rules_applied = report.rules_applied,
            rules_removed = report.rules_removed,
            "Tick completed"
        );
        Ok(TickSummary { tick, report })
    }

    /// Advance `ticks` ticks, returning each summary.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failing tick.
    pub fn run(&mut self, ticks: u64) -> Result<Vec<TickSummary>, SimulationError> {
        let mut summaries = Vec::new();
        for _ in 0..ticks {
            summaries.push(self.step()?);
        }
        Ok(summaries)
    }

    /// A serializable view of every entity and relationship.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Social`] if an opinion cannot be computed.
    pub fn snapshot(&self) -> Result<WorldSnapshot, SimulationError> {
        let by_id: BTreeMap<EntityId, &str> = self
            .names
            .iter()
            .map(|(name, id)| (*id, name.as_str()))
            .collect();
        let name_of = |id: EntityId| {
            by_id
                .get(&id)
                .map_or_else(|| id.to_string(), |name| (*name).to_owned())
        };

        let mut entities = Vec::with_capacity(self.names.len());
        for (name, id) in &self.names {
            let entity = self.engine.get_entity(*id)?;
            entities.push(EntitySnapshot {
                name: name.clone(),
                kind: entity.kind().to_owned(),
                traits: entity.traits().ids().map(ToString::to_string).collect(),
                stats: entity
                    .stats()
                    .iter()
                    .map(|(stat, value)| (stat.to_owned(), value.value()))
                    .collect(),
            });
        }

        let mut relationships = Vec::with_capacity(self.engine.relationship_count());
        for relationship in self.engine.relationships() {
            let opinion = self
                .opinions
                .opinion_of(&self.engine, relationship.owner(), relationship.target())?;
            relationships.push(RelationshipSnapshot {
                owner: name_of(relationship.owner()),
                target: name_of(relationship.target()),
                traits: relationship.traits().ids().map(ToString::to_string).collect(),
                stats: relationship
                    .stats()
                    .iter()
                    .map(|(stat, value)| (stat.to_owned(), value.value()))
                    .collect(),
                active_rules: relationship.active_rules().len(),
                opinion: opinion.value,
            });
        }
        relationships.sort_by(|a, b| (&a.owner, &a.target).cmp(&(&b.owner, &b.target)));

        Ok(WorldSnapshot {
            tick: self.tick,
            entities,
            relationships,
        })
    }
}
