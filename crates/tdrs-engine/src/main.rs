//! Command-line driver for TDRS.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the first argument, `TDRS_CONFIG`, or
//!    `tdrs-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate content
//! 4. Populate the scenario
//! 5. Run `engine.ticks` ticks
//! 6. Print the final world snapshot as JSON

mod error;

use std::path::{Path, PathBuf};

use tdrs_core::config::{LoggingConfig, SimulationConfig};
use tdrs_core::content::Content;
use tdrs_core::simulation::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "tdrs-config.yaml";

fn main() -> Result<(), EngineError> {
    let config = load_config()?;
    init_logging(&config.logging);

    info!(
        ticks = config.engine.ticks,
        reevaluate_rules_on_tick = config.engine.reevaluate_rules_on_tick,
        max_cascade_passes = config.engine.max_cascade_passes,
        content = %config.content.path,
        "Configuration loaded"
    );

    let content = Content::from_file(Path::new(&config.content.path))?;
    info!(
        traits = content.traits.len(),
        rules = content.rules.len(),
        entity_kinds = content.entity_kinds.len(),
        "Content loaded"
    );

    let mut simulation = Simulation::new(&config, &content)?;
    simulation.populate(&content.scenario)?;

    let summaries = simulation.run(config.engine.ticks)?;
    let activity = simulation.engine().activity();
    info!(
        ticks = summaries.len(),
        rules_applied = activity.applied,
        rules_removed = activity.removed,
        "Simulation finished"
    );

    let snapshot = simulation.snapshot()?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration, falling back to defaults when no file exists.
///
/// The first command-line argument names the file; otherwise `TDRS_CONFIG`,
/// otherwise `tdrs-config.yaml` in the working directory.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TDRS_CONFIG").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(SimulationConfig::from_file(&path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
