//! Bounded retry with pluggable backoff.
//!
//! `max_retries` is the total number of attempts, the first one included.
//! Between attempts the caller waits `backoff.delay(n)`, `n` being the 1-based
//! number of the attempt that just failed. There is no wait after the final
//! attempt, whose failure is returned unchanged.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backoff::{BackoffPolicy, FixedDelay};
use crate::metrics::record_retry_attempt;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_retries: u32,
    /// Delay policy between attempts
    pub backoff: Arc<dyn BackoffPolicy>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Arc::new(FixedDelay::default()),
        }
    }
}

impl RetryConfig {
    /// Build a config by mutating the defaults
    pub fn configure(f: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        f(&mut config);
        config
    }

    /// Build a config from a factory function
    pub fn from_factory(factory: impl FnOnce() -> Self) -> Self {
        factory()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }
}

/// Retry policy for executing operations with retries
#[derive(Debug, Clone, Default)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Attempts that will be made before giving up
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    /// Bind this policy to an operation
    pub fn wrap<F>(self, operation: F) -> Retrying<F> {
        Retrying {
            retry: self,
            operation,
        }
    }

    /// Run a blocking operation, sleeping the current thread between attempts
    pub fn run<F, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Debug,
    {
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(attempt, &err) {
                    Some(delay) => {
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Run an async operation, suspending on `tokio::time::sleep` between attempts
    pub async fn run_async<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Debug,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(attempt, &err) {
                    Some(delay) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Delay before the attempt after `attempt`, or `None` once exhausted
    fn next_delay<E: Debug>(&self, attempt: u32, err: &E) -> Option<Duration> {
        let max_attempts = self.max_attempts();
        if attempt >= max_attempts {
            warn!(attempts = attempt, error = ?err, "Giving up after final attempt");
            return None;
        }

        let delay = self.config.backoff.delay(attempt);
        debug!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = ?err,
            "Retrying after failure"
        );
        record_retry_attempt();

        Some(delay)
    }
}

/// An operation bound to its retry policy
#[derive(Debug)]
pub struct Retrying<F> {
    retry: Retry,
    operation: F,
}

impl<F> Retrying<F> {
    pub fn policy(&self) -> &Retry {
        &self.retry
    }

    /// Invoke the blocking operation with retries
    pub fn call<T, E>(&self) -> Result<T, E>
    where
        F: Fn() -> Result<T, E>,
        E: Debug,
    {
        self.retry.run(&self.operation)
    }

    /// Invoke the async operation with retries
    pub async fn call_async<Fut, T, E>(&self) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Debug,
    {
        self.retry.run_async(&self.operation).await
    }
}

/// Wrap `operation` in a retry policy
pub fn wrap<F>(operation: F, config: RetryConfig) -> Retrying<F> {
    Retry::new(config).wrap(operation)
}
