//! Integration tests for the shipped village content.
//!
//! Loads `content/village.yaml` from the repository root, populates its
//! scenario, and checks the settled world before and after ticking.

// Integration tests use unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use tdrs_core::config::SimulationConfig;
use tdrs_core::content::Content;
use tdrs_core::simulation::{Simulation, WorldSnapshot};

fn repo_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

fn village() -> Simulation {
    let config = SimulationConfig::parse("{}").unwrap();
    let content = Content::from_file(&repo_file("content/village.yaml")).unwrap();
    let mut sim = Simulation::new(&config, &content).unwrap();
    sim.populate(&content.scenario).unwrap();
    sim
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn edge_stat(snapshot: &WorldSnapshot, owner: &str, target: &str, stat: &str) -> f64 {
    snapshot
        .relationships
        .iter()
        .find(|r| r.owner == owner && r.target == target)
        .and_then(|r| r.stats.get(stat).copied())
        .unwrap()
}

fn entity_stat(snapshot: &WorldSnapshot, name: &str, stat: &str) -> f64 {
    snapshot
        .entities
        .iter()
        .find(|e| e.name == name)
        .and_then(|e| e.stats.get(stat).copied())
        .unwrap()
}

#[test]
fn shipped_config_parses() {
    let config = SimulationConfig::from_file(&repo_file("tdrs-config.yaml"));
    assert!(config.is_ok());
}

#[test]
fn village_settles_into_expected_relationships() {
    let snapshot = village().snapshot().unwrap();

    // Bo trusts honest Ada (10), and her incoming admiration deepens it by half.
    assert!(approx(edge_stat(&snapshot, "bo", "ada", "Friendship"), 15.0));
    assert!(approx(edge_stat(&snapshot, "bo", "ada", "Romance"), 20.0));
    // Ada, trusted, is warm to everyone; Cal is deceitful.
    assert!(approx(edge_stat(&snapshot, "ada", "bo", "Friendship"), 2.0));
    assert!(approx(edge_stat(&snapshot, "ada", "cal", "Friendship"), -13.0));
    // Rivalry outweighs Cal's trust, so admiration never takes hold.
    assert!(approx(edge_stat(&snapshot, "cal", "ada", "Friendship"), -20.0));

    // Cheerful (+10) then smitten (+50%), and the crush adds stress.
    assert!(approx(entity_stat(&snapshot, "bo", "Mood"), 30.0));
    assert!(approx(entity_stat(&snapshot, "bo", "Stress"), 25.0));
    assert!(approx(entity_stat(&snapshot, "ada", "Mood"), 10.0));
}

#[test]
fn village_is_stable_across_ticks() {
    let mut sim = village();
    let before = sim.snapshot().unwrap();
    let summaries = sim.run(5).unwrap();
    let after = sim.snapshot().unwrap();

    assert_eq!(summaries.last().map(|s| s.tick), Some(5));
    assert!(summaries.iter().all(|s| s.report.rules_applied == 0));
    assert_eq!(before.entities, after.entities);
    assert_eq!(before.relationships, after.relationships);
}

#[test]
fn village_opinions() {
    let sim = village();
    assert!(approx(sim.opinion_of("bo", "ada").unwrap().value, 20.0));
    assert!(approx(sim.opinion_of("ada", "cal").unwrap().value, -30.0));
    // Deceitful Cal halves the respect honesty earns.
    assert!(approx(sim.opinion_of("cal", "ada").unwrap().value, 10.0));
    assert!(approx(sim.opinion_of("ada", "bo").unwrap().value, 0.0));
}
