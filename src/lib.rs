//! Resilience toolkit: circuit breaker, bounded retry and fallback chains,
//! with file/environment configuration and metrics through the `metrics`
//! facade.

pub mod config;
pub mod metrics;
pub mod resilience;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ResilienceConfig, Validate};
pub use resilience::{
    BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    Exponential, Fallback, FixedDelay, Retry, RetryConfig,
};
