use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{ConfigError, Validate};
use crate::resilience::{
    BackoffPolicy, CircuitBreakerConfig, CircuitState, Exponential, FixedDelay, RetryConfig,
};

/// Resilience configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Circuit breaker settings
    #[serde(default = "CircuitBreakerSettings::default")]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Retry settings
    #[serde(default = "RetrySettings::default")]
    pub retry: RetrySettings,
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Failures inside the window that open the circuit
    #[serde(default = "default_exception_threshold")]
    pub exception_threshold: u32,
    /// Window in seconds in which failures are counted
    #[serde(default = "default_exception_window")]
    pub exception_window: u64,
    /// Seconds since the last failure before a trial call is allowed
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: u64,
    /// State a new breaker starts in
    #[serde(default)]
    pub initial_state: CircuitState,
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff strategy
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Delay in milliseconds for the fixed strategy
    #[serde(default)]
    pub delay: u64,
}

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// attempt² seconds
    Exponential,
}

fn default_exception_threshold() -> u32 {
    1
}

fn default_exception_window() -> u64 {
    2 // seconds
}

fn default_reset_timeout() -> u64 {
    5 // seconds
}

fn default_max_retries() -> u32 {
    5
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            exception_threshold: default_exception_threshold(),
            exception_window: default_exception_window(),
            reset_timeout: default_reset_timeout(),
            initial_state: CircuitState::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffKind::default(),
            delay: 0,
        }
    }
}

impl CircuitBreakerSettings {
    /// Runtime breaker configuration with the system clock and no ignore predicate
    pub fn to_config<E>(&self) -> CircuitBreakerConfig<E> {
        CircuitBreakerConfig {
            exception_threshold: self.exception_threshold,
            exception_window: Duration::from_secs(self.exception_window),
            reset_timeout: Duration::from_secs(self.reset_timeout),
            initial_state: self.initial_state,
            ..CircuitBreakerConfig::default()
        }
    }
}

impl RetrySettings {
    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        match self.backoff {
            BackoffKind::Fixed => Arc::new(FixedDelay::new(Duration::from_millis(self.delay))),
            BackoffKind::Exponential => Arc::new(Exponential),
        }
    }

    pub fn to_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: self.backoff_policy(),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        settings.to_config()
    }
}

impl Validate for ResilienceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

impl Validate for CircuitBreakerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.exception_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "circuit_breaker.exception_threshold must be > 0".to_string(),
            ));
        }
        if self.exception_window == 0 {
            return Err(ConfigError::ValidationError(
                "circuit_breaker.exception_window must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for RetrySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be > 0".to_string(),
            ));
        }
        if self.backoff == BackoffKind::Exponential && self.delay != 0 {
            tracing::warn!(
                delay_ms = self.delay,
                "retry.delay is ignored by the exponential backoff"
            );
        }
        Ok(())
    }
}
