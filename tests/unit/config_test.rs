//! Configuration loading tests
//!
//! Every test touches process-wide environment variables, so they run
//! serially and clean up after themselves.

use lighter_resilience::config::*;
use lighter_resilience::resilience::CircuitState;
use serial_test::serial;
use std::env;
use std::time::Duration;
use tempfile::TempDir;

mod utils {
    use std::fs;
    use std::path::Path;

    /// Write `content` to `name` inside `dir`
    pub fn write_config(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    /// Clean up environment variables with the LIGHTER_RESILIENCE prefix
    pub fn clean_env_vars() {
        let keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(super::ENV_PREFIX))
            .map(|(k, _)| k)
            .collect();

        for key in keys {
            unsafe { std::env::remove_var(&key) };
        }
        unsafe { std::env::remove_var("APP_ENV") };
    }
}

#[test]
#[serial]
fn test_missing_files_yield_defaults() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();

    let config = load_from(dir.path()).unwrap();

    assert_eq!(config, ResilienceConfig::default());
}

#[test]
#[serial]
fn test_default_file_is_loaded() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();
    utils::write_config(
        dir.path(),
        "default.toml",
        r#"
        [circuit_breaker]
        exception_threshold = 3
        exception_window = 10
        reset_timeout = 30

        [retry]
        max_retries = 4
        backoff = "exponential"
        "#,
    );

    let config = load_from(dir.path()).unwrap();

    assert_eq!(config.circuit_breaker.exception_threshold, 3);
    assert_eq!(config.circuit_breaker.exception_window, 10);
    assert_eq!(config.circuit_breaker.reset_timeout, 30);
    assert_eq!(config.circuit_breaker.initial_state, CircuitState::Closed);
    assert_eq!(config.retry.max_retries, 4);
    assert_eq!(config.retry.backoff, BackoffKind::Exponential);
}

#[test]
#[serial]
fn test_precedence_env_over_local_over_app_env_over_default() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();
    utils::write_config(
        dir.path(),
        "default.toml",
        "[circuit_breaker]\nexception_threshold = 2\nreset_timeout = 10\nexception_window = 4\n",
    );
    utils::write_config(
        dir.path(),
        "staging.toml",
        "[circuit_breaker]\nexception_threshold = 5\nreset_timeout = 20\n",
    );
    utils::write_config(dir.path(), "local.toml", "[circuit_breaker]\nreset_timeout = 40\n");

    unsafe {
        env::set_var("APP_ENV", "staging");
        env::set_var("LIGHTER_RESILIENCE__RETRY__MAX_RETRIES", "2");
        env::set_var("LIGHTER_RESILIENCE__CIRCUIT_BREAKER__INITIAL_STATE", "open");
    }

    let config = load_from(dir.path());
    utils::clean_env_vars();
    let config = config.unwrap();

    assert_eq!(config.circuit_breaker.exception_window, 4);
    assert_eq!(config.circuit_breaker.exception_threshold, 5);
    assert_eq!(config.circuit_breaker.reset_timeout, 40);
    assert_eq!(config.circuit_breaker.initial_state, CircuitState::Open);
    assert_eq!(config.retry.max_retries, 2);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();
    utils::write_config(dir.path(), "default.toml", "[retry]\nmax_retries = 0\n");

    let err = load_from(dir.path()).unwrap_err();

    match err {
        ConfigError::ValidationError(message) => assert!(message.contains("retry.max_retries")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_malformed_values_are_load_errors() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();
    utils::write_config(dir.path(), "default.toml", "[retry]\nbackoff = \"fibonacci\"\n");

    let err = load_from(dir.path()).unwrap_err();

    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
#[serial]
fn test_loaded_settings_build_runtime_policies() {
    utils::clean_env_vars();
    let dir = TempDir::new().unwrap();
    utils::write_config(
        dir.path(),
        "default.toml",
        "[circuit_breaker]\nreset_timeout = 12\n\n[retry]\nbackoff = \"fixed\"\ndelay = 50\n",
    );

    let config = load_from(dir.path()).unwrap();
    let breaker: lighter_resilience::CircuitBreakerConfig<std::io::Error> =
        config.circuit_breaker.to_config();
    let retry = config.retry.to_config();

    assert_eq!(breaker.reset_timeout, Duration::from_secs(12));
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.backoff.delay(1), Duration::from_millis(50));
}
