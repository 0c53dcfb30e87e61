//! Configuration loading and typed config structures for TDRS.
//!
//! The canonical configuration lives in `tdrs-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file) yields a
//! working configuration.

use std::path::Path;

use serde::Deserialize;
use tdrs_social::EngineSettings;
use tdrs_social::engine::DEFAULT_MAX_CASCADE_PASSES;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidOverride {
        /// The environment variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Tick loop and rule re-evaluation settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Base and bounds for computed opinions.
    #[serde(default)]
    pub opinion: OpinionConfig,

    /// Where content is loaded from.
    #[serde(default)]
    pub content: ContentConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TDRS_LOG_LEVEL` overrides `logging.level`
    /// - `TDRS_TICKS` overrides `engine.ticks`
    /// - `TDRS_CONTENT` overrides `content.path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for an unparseable override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for an unparseable override.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `TDRS_TICKS` is not an integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Override values using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `TDRS_TICKS` is not an integer.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = lookup("TDRS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(ticks) = lookup("TDRS_TICKS") {
            self.engine.ticks = ticks
                .trim()
                .parse()
                .map_err(|_parse| ConfigError::InvalidOverride {
                    var: "TDRS_TICKS",
                    value: ticks.clone(),
                })?;
        }
        if let Some(path) = lookup("TDRS_CONTENT") {
            self.content.path = path;
        }
        Ok(())
    }
}

/// Tick loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Number of ticks the engine binary runs.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Re-evaluate every relationship at the end of each tick.
    #[serde(default = "default_true")]
    pub reevaluate_rules_on_tick: bool,

    /// Bound on relationship reconciliations per settle.
    #[serde(default = "default_max_cascade_passes")]
    pub max_cascade_passes: u32,
}

impl EngineConfig {
    /// The social engine settings this config describes.
    pub const fn settings(&self) -> EngineSettings {
        EngineSettings {
            reevaluate_rules_on_tick: self.reevaluate_rules_on_tick,
            max_cascade_passes: self.max_cascade_passes,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            reevaluate_rules_on_tick: true,
            max_cascade_passes: default_max_cascade_passes(),
        }
    }
}

/// Opinion computation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OpinionConfig {
    /// Opinion before any rule applies.
    #[serde(default)]
    pub base: f64,

    /// Lowest possible opinion.
    #[serde(default = "default_opinion_min")]
    pub min: f64,

    /// Highest possible opinion.
    #[serde(default = "default_opinion_max")]
    pub max: f64,
}

impl Default for OpinionConfig {
    fn default() -> Self {
        Self {
            base: 0.0,
            min: default_opinion_min(),
            max: default_opinion_max(),
        }
    }
}

/// Content location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentConfig {
    /// Path to the content YAML file.
    #[serde(default = "default_content_path")]
    pub path: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            path: default_content_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_ticks() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

const fn default_max_cascade_passes() -> u32 {
    DEFAULT_MAX_CASCADE_PASSES
}

const fn default_opinion_min() -> f64 {
    -100.0
}

const fn default_opinion_max() -> f64 {
    100.0
}

fn default_content_path() -> String {
    "content/village.yaml".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.engine.ticks, 10);
        assert!(config.engine.reevaluate_rules_on_tick);
        assert_eq!(config.engine.max_cascade_passes, DEFAULT_MAX_CASCADE_PASSES);
        assert!((config.opinion.min + 100.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.content.path, "content/village.yaml");
    }

    #[test]
    fn parse_partial_yaml_fills_defaults() {
        let yaml = r"
engine:
  ticks: 3
  reevaluate_rules_on_tick: false
opinion:
  base: 5.0
  max: 50.0
";
        let parsed: Result<SimulationConfig, _> = serde_yml::from_str(yaml);
        assert!(parsed.is_ok());
        let config = parsed.ok().unwrap_or_default();
        assert_eq!(config.engine.ticks, 3);
        assert!(!config.engine.reevaluate_rules_on_tick);
        assert_eq!(config.engine.max_cascade_passes, DEFAULT_MAX_CASCADE_PASSES);
        assert!((config.opinion.base - 5.0).abs() < f64::EPSILON);
        assert!((config.opinion.min + 100.0).abs() < f64::EPSILON);
        assert!((config.opinion.max - 50.0).abs() < f64::EPSILON);
        assert!(!config.engine.settings().reevaluate_rules_on_tick);
    }

    #[test]
    fn empty_yaml_is_default() {
        let parsed: Result<SimulationConfig, _> = serde_yml::from_str("{}");
        assert_eq!(parsed.ok(), Some(SimulationConfig::default()));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = SimulationConfig::parse("engine: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = SimulationConfig::default();
        let env = |var: &str| match var {
            "TDRS_LOG_LEVEL" => Some("debug".to_owned()),
            "TDRS_TICKS" => Some(" 42 ".to_owned()),
            "TDRS_CONTENT" => Some("other.yaml".to_owned()),
            _ => None,
        };
        assert!(config.apply_overrides(env).is_ok());
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.engine.ticks, 42);
        assert_eq!(config.content.path, "other.yaml");

        let mut untouched = SimulationConfig::default();
        assert!(untouched.apply_overrides(no_env).is_ok());
        assert_eq!(untouched, SimulationConfig::default());
    }

    #[test]
    fn bad_tick_override_is_rejected() {
        let mut config = SimulationConfig::default();
        let result = config.apply_overrides(|var| (var == "TDRS_TICKS").then(|| "many".to_owned()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride { var: "TDRS_TICKS", .. })
        ));
    }
}
