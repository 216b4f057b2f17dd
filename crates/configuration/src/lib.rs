use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{
    AggregationConfig, BinningConfig, Config, EventStudyConfig, EventWindow, HitStudyConfig,
    LoggingConfig, ScoreWeights, ScoringConfig,
};

/// Prefix of the environment variables that override file settings,
/// e.g. `REVENUE_LAB__AGGREGATION__TRIM_FRACTION=0.05`.
const ENV_PREFIX: &str = "REVENUE_LAB";

/// Loads the application configuration from a TOML file.
///
/// This function is the primary entry point for this crate. It reads the configuration file,
/// layers environment overrides on top, deserializes it into our strongly-typed `Config`
/// struct and validates it. A missing file is not an error: every section has defaults
/// except the scoring weights.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    finish(builder)
}

/// Parses a configuration from TOML text. Used for embedded presets and tests.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    finish(builder)
}

fn finish(builder: config::Config) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(
        metric = ?config.aggregation.metric,
        trim_fraction = config.aggregation.trim_fraction,
        scoring = config.scoring.is_some(),
        "Configuration loaded."
    );
    Ok(config)
}
