pub mod resilience;

use std::path::Path;

pub use resilience::{BackoffKind, CircuitBreakerSettings, ResilienceConfig, RetrySettings};

/// Prefix for environment overrides, e.g. `LIGHTER_RESILIENCE__RETRY__MAX_RETRIES=3`
pub const ENV_PREFIX: &str = "LIGHTER_RESILIENCE";

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Validation of deserialized settings
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Load the resilience configuration from `config/` and the environment
pub fn load() -> Result<ResilienceConfig, ConfigError> {
    load_from("config")
}

/// Load configuration from files in `dir` and environment variables
///
/// Configuration loading follows this precedence (highest to lowest):
/// 1. Environment variables: LIGHTER_RESILIENCE__CIRCUIT_BREAKER__RESET_TIMEOUT=30
/// 2. {dir}/local.toml (git-ignored, developer overrides)
/// 3. {dir}/{APP_ENV}.toml (development/staging/production)
/// 4. {dir}/default.toml (base defaults)
///
/// Every file is optional; missing keys fall back to the built-in defaults.
pub fn load_from(dir: impl AsRef<Path>) -> Result<ResilienceConfig, ConfigError> {
    use ::config::{Config, Environment, File};

    let dir = dir.as_ref();
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let source = |name: &str| File::with_name(&dir.join(name).to_string_lossy()).required(false);

    let config = Config::builder()
        .add_source(source("default"))
        .add_source(source(&env))
        .add_source(source("local"))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let resilience: ResilienceConfig = config.try_deserialize()?;
    resilience.validate()?;

    tracing::debug!(
        config_dir = %dir.display(),
        environment = %env,
        "Loaded resilience configuration"
    );

    Ok(resilience)
}
