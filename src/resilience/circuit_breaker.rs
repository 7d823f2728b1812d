//! Circuit Breaker Pattern Implementation
//!
//! The circuit breaker counts failures of one protected operation inside a
//! sliding time window. Once the count reaches the configured threshold the
//! circuit opens and further calls fail fast without touching the operation.
//! After the reset timeout has elapsed since the last failure, a single trial
//! call is let through: success closes the circuit, failure reopens it.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐
//! │ Closed  │ ◄──────────────────────┐
//! │ (Normal)│                        │
//! └────┬────┘                        │
//!      │ exception_threshold         │ trial call
//!      │ failures in window          │ succeeds
//!      ▼                             │
//! ┌─────────┐  reset timeout  ┌──────┴────────┐
//! │  Open   │─────────────────► PartiallyOpen │
//! │(Failing)│                 │   (Probing)   │
//! └─────────┘◄────────────────└───────────────┘
//!               trial call fails
//! ```
//!
//! # Example
//!
//! ```rust
//! use lighter_resilience::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::<std::io::Error>::default()
//!     .with_exception_threshold(3)
//!     .with_exception_window(Duration::from_secs(10))
//!     .with_reset_timeout(Duration::from_secs(30));
//!
//! let cb = CircuitBreaker::with_config("inventory-api", config);
//!
//! let result = cb.call_sync(|| Ok::<_, std::io::Error>("in stock"));
//!
//! assert_eq!(result.unwrap(), "in stock");
//! assert_eq!(cb.current_state(), CircuitState::Closed);
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::state::{CircuitState, CircuitStateMachine};
use crate::metrics::{self as resilience_metrics, CallOutcome};

/// Decides whether the reset timeout has expired, given the time elapsed
/// since the most recent failure
pub type ResetPredicate = Arc<dyn Fn(Duration) -> bool + Send + Sync>;

/// Returns `true` for failures the breaker should not count
pub type IgnorePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Circuit breaker configuration
///
/// Fields are public so the config can be built with struct-update syntax;
/// once handed to a [`CircuitBreaker`] it can no longer be changed.
pub struct CircuitBreakerConfig<E = anyhow::Error> {
    /// Number of failures inside `exception_window` that trips the circuit
    pub exception_threshold: u32,
    /// Sliding window in which failures are counted
    pub exception_window: Duration,
    /// Time since the last failure before a trial call is allowed
    pub reset_timeout: Duration,
    /// Replaces the default `elapsed > reset_timeout` check when set
    pub has_timeout_expired: Option<ResetPredicate>,
    /// State the breaker starts in
    pub initial_state: CircuitState,
    /// Failures matching this predicate are propagated but never counted
    pub ignore: Option<IgnorePredicate<E>>,
    /// Timestamp source
    pub clock: Arc<dyn Clock>,
}

impl<E> Default for CircuitBreakerConfig<E> {
    fn default() -> Self {
        Self {
            exception_threshold: 1,
            exception_window: Duration::from_secs(2),
            reset_timeout: Duration::from_secs(5),
            has_timeout_expired: None,
            initial_state: CircuitState::Closed,
            ignore: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<E> Clone for CircuitBreakerConfig<E> {
    fn clone(&self) -> Self {
        Self {
            exception_threshold: self.exception_threshold,
            exception_window: self.exception_window,
            reset_timeout: self.reset_timeout,
            has_timeout_expired: self.has_timeout_expired.clone(),
            initial_state: self.initial_state,
            ignore: self.ignore.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<E> fmt::Debug for CircuitBreakerConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("exception_threshold", &self.exception_threshold)
            .field("exception_window", &self.exception_window)
            .field("reset_timeout", &self.reset_timeout)
            .field("custom_timeout_predicate", &self.has_timeout_expired.is_some())
            .field("initial_state", &self.initial_state)
            .field("ignores_failures", &self.ignore.is_some())
            .finish()
    }
}

impl<E> CircuitBreakerConfig<E> {
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

    pub fn with_exception_threshold(mut self, threshold: u32) -> Self {
        self.exception_threshold = threshold;
        self
    }

    pub fn with_exception_window(mut self, window: Duration) -> Self {
        self.exception_window = window;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Use a custom predicate instead of `elapsed > reset_timeout`
    pub fn with_timeout_predicate(
        mut self,
        predicate: impl Fn(Duration) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.has_timeout_expired = Some(Arc::new(predicate));
        self
    }

    pub fn with_initial_state(mut self, state: CircuitState) -> Self {
        self.initial_state = state;
        self
    }

    /// Exclude failures matching `predicate` from counting and transitions
    pub fn ignore_when(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.ignore = Some(Arc::new(predicate));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn timeout_expired(&self, elapsed: Duration) -> bool {
        match &self.has_timeout_expired {
            Some(predicate) => predicate(elapsed),
            None => elapsed > self.reset_timeout,
        }
    }

    fn is_ignored(&self, err: &E) -> bool {
        self.ignore.as_ref().is_some_and(|ignore| ignore(err))
    }
}

/// Raised when a call is rejected because the circuit is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct CircuitOpenError;

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not invoked
    #[error("circuit breaker is open")]
    Open,
    /// The operation's own failure, unchanged
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    /// The operation's failure, if there was one
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Open => None,
            CircuitBreakerError::Inner(err) => Some(err),
        }
    }

    /// Convert into `anyhow::Error`; rejections become [`CircuitOpenError`]
    pub fn into_anyhow(self) -> anyhow::Error
    where
        E: Into<anyhow::Error>,
    {
        match self {
            CircuitBreakerError::Open => anyhow::Error::new(CircuitOpenError),
            CircuitBreakerError::Inner(err) => err.into(),
        }
    }
}

/// Mutable state shared by every invocation of one breaker
#[derive(Debug)]
struct BreakerState {
    machine: CircuitStateMachine,
    /// Failure timestamps, oldest first
    errors: VecDeque<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn new(initial: CircuitState) -> Self {
        Self {
            machine: CircuitStateMachine::new(initial),
            errors: VecDeque::new(),
            trial_in_flight: false,
        }
    }

    fn elapsed_since_last_error(&self, now: DateTime<Utc>) -> Duration {
        self.errors
            .back()
            .and_then(|last| (now - *last).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Insert a failure keeping the queue ordered by time
    fn record_error(&mut self, stamp: DateTime<Utc>) {
        let at = self.errors.partition_point(|recorded| *recorded <= stamp);
        self.errors.insert(at, stamp);
    }

    /// Drop leading entries that can no longer fall inside the window,
    /// always keeping the most recent failure.
    fn prune(&mut self, window_start: DateTime<Utc>) {
        while self.errors.len() > 1
            && self.errors.front().is_some_and(|s| *s <= window_start)
        {
            self.errors.pop_front();
        }
    }
}

/// Circuit breaker guarding one operation
///
/// # Thread Safety
///
/// Clones share state. Admission (including the Open → PartiallyOpen
/// transition) happens under one lock scope and the bookkeeping after the
/// call under another; the lock is never held while the operation runs.
/// While partially open only one trial call is in flight at a time, other
/// callers are rejected until it settles. Only the trial closes or reopens a
/// partially open circuit; calls admitted before the circuit opened just add
/// their failure, stamped when the call completes, to the window.
pub struct CircuitBreaker<E = anyhow::Error> {
    /// Name for logging and metrics
    name: String,
    state: Arc<Mutex<BreakerState>>,
    config: Arc<CircuitBreakerConfig<E>>,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E> CircuitBreaker<E> {
    /// Create a circuit breaker with default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig<E>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(BreakerState::new(config.initial_state))),
            config: Arc::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig<E> {
        &self.config
    }

    /// Current state. Never triggers a transition.
    pub fn current_state(&self) -> CircuitState {
        self.state.lock().machine.current()
    }

    /// Number of failure timestamps currently retained
    pub fn recorded_failures(&self) -> usize {
        self.state.lock().errors.len()
    }

    /// Bind this breaker to an operation
    pub fn wrap<F>(self, operation: F) -> Guarded<F, E> {
        Guarded {
            breaker: self,
            operation,
        }
    }

    /// Execute a synchronous operation protected by the circuit breaker
    pub fn call_sync<F, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.admit()?;

        match operation() {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                permit.fail(&err);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Execute a future protected by the circuit breaker.
    ///
    /// The future is only polled when the breaker admits the call.
    pub async fn call<Fut, T>(&self, future: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(|| future).await
    }

    /// Like [`call`](Self::call), but the future is only created once admitted
    pub async fn call_with<F, Fut, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit()?;

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                permit.fail(&err);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn admit(&self) -> Result<Permit<'_, E>, CircuitBreakerError<E>> {
        let now = self.config.clock.now();
        let mut state = self.state.lock();

        let elapsed = state.elapsed_since_last_error(now);
        if state.machine.is_open()
            && self.config.timeout_expired(elapsed)
            && state.machine.attempt_reset()
        {
            tracing::info!(
                circuit_breaker = %self.name,
                state = "Open -> PartiallyOpen",
                elapsed_ms = elapsed.as_millis() as u64,
                "Circuit breaker allowing a trial call"
            );
            resilience_metrics::record_transition(&self.name, CircuitState::PartiallyOpen);
        }

        let trial = match state.machine.current() {
            CircuitState::Closed => false,
            CircuitState::PartiallyOpen if !state.trial_in_flight => {
                state.trial_in_flight = true;
                true
            }
            current => {
                tracing::debug!(
                    circuit_breaker = %self.name,
                    state = %current,
                    "Circuit breaker rejected call"
                );
                resilience_metrics::record_rejection(&self.name);
                return Err(CircuitBreakerError::Open);
            }
        };

        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut state = self.state.lock();
        if trial {
            state.trial_in_flight = false;
        }

        match state.machine.current() {
            CircuitState::Closed => state.errors.clear(),
            // only the trial decides the outcome of a partially open circuit
            CircuitState::PartiallyOpen if trial => {
                if state.machine.reset() {
                    tracing::info!(
                        circuit_breaker = %self.name,
                        state = "PartiallyOpen -> Closed",
                        "Circuit breaker closed after successful trial"
                    );
                    resilience_metrics::record_transition(&self.name, CircuitState::Closed);
                }
            }
            CircuitState::PartiallyOpen | CircuitState::Open => {}
        }

        resilience_metrics::record_call(&self.name, CallOutcome::Success);
    }

    fn on_failure(&self, trial: bool, err: &E) {
        if self.config.is_ignored(err) {
            if trial {
                self.state.lock().trial_in_flight = false;
            }
            tracing::debug!(circuit_breaker = %self.name, "Ignoring failure");
            resilience_metrics::record_call(&self.name, CallOutcome::Ignored);
            return;
        }

        let now = self.config.clock.now();
        let mut state = self.state.lock();
        if trial {
            state.trial_in_flight = false;
        }

        state.record_error(now);

        let window_start = chrono::Duration::from_std(self.config.exception_window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let failures_in_window = state
            .errors
            .iter()
            .filter(|stamp| **stamp > window_start)
            .count();
        let from = state.machine.current();

        let should_trip = match from {
            CircuitState::Closed => failures_in_window >= self.config.exception_threshold as usize,
            CircuitState::PartiallyOpen => trial,
            CircuitState::Open => false,
        };

        if should_trip && state.machine.trip() {
            if from == CircuitState::PartiallyOpen {
                tracing::warn!(
                    circuit_breaker = %self.name,
                    state = "PartiallyOpen -> Open",
                    "Circuit breaker re-opened after failed trial"
                );
            } else {
                tracing::warn!(
                    circuit_breaker = %self.name,
                    state = "Closed -> Open",
                    failures_in_window,
                    exception_threshold = self.config.exception_threshold,
                    "Circuit breaker opened due to failures in window"
                );
            }
            resilience_metrics::record_transition(&self.name, CircuitState::Open);
        }

        state.prune(window_start);
        resilience_metrics::record_call(&self.name, CallOutcome::Failure);
    }
}

impl<E> fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &state.machine.current())
            .field("recorded_failures", &state.errors.len())
            .field("trial_in_flight", &state.trial_in_flight)
            .field("config", &self.config)
            .finish()
    }
}

/// Admission ticket for one call.
///
/// Dropping an unsettled trial permit (panic, cancelled future) frees the
/// trial slot without touching the state.
struct Permit<'a, E> {
    breaker: &'a CircuitBreaker<E>,
    trial: bool,
    settled: bool,
}

impl<E> Permit<'_, E> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    fn fail(mut self, err: &E) {
        self.settled = true;
        self.breaker.on_failure(self.trial, err);
    }
}

impl<E> Drop for Permit<'_, E> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.state.lock().trial_in_flight = false;
        }
    }
}

/// An operation bound to its circuit breaker
pub struct Guarded<F, E = anyhow::Error> {
    breaker: CircuitBreaker<E>,
    operation: F,
}

impl<F, E> Guarded<F, E> {
    pub fn breaker(&self) -> &CircuitBreaker<E> {
        &self.breaker
    }

    pub fn current_state(&self) -> CircuitState {
        self.breaker.current_state()
    }

    /// Invoke the synchronous operation through the breaker
    pub fn call<T>(&self) -> Result<T, CircuitBreakerError<E>>
    where
        F: Fn() -> Result<T, E>,
    {
        self.breaker.call_sync(&self.operation)
    }

    /// Invoke the asynchronous operation through the breaker
    pub async fn call_async<Fut, T>(&self) -> Result<T, CircuitBreakerError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker.call_with(&self.operation).await
    }
}

impl<F, E> fmt::Debug for Guarded<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

/// Wrap `operation` in a new circuit breaker named `name`
pub fn wrap<F, E>(
    name: impl Into<String>,
    operation: F,
    config: CircuitBreakerConfig<E>,
) -> Guarded<F, E> {
    CircuitBreaker::with_config(name, config).wrap(operation)
}
