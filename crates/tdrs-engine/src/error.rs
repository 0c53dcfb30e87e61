//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode between startup and the final
//! snapshot so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tdrs_core::config::ConfigError,
    },

    /// Content loading or validation failed.
    #[error("content error: {source}")]
    Content {
        /// The underlying content error.
        #[from]
        source: tdrs_core::content::ContentError,
    },

    /// The simulation failed while populating or ticking.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: tdrs_core::simulation::SimulationError,
    },

    /// The final snapshot could not be serialized.
    #[error("output error: {source}")]
    Output {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
