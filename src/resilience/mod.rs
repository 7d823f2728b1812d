//! Resilience patterns for fault-tolerant services
//!
//! # Available Patterns
//!
//! - **Circuit Breaker**: counts failures in a sliding window and fails fast
//!   once a threshold is reached, testing recovery with a single trial call
//!   after a reset timeout.
//! - **Retry**: re-runs a failing operation a bounded number of times with a
//!   pluggable [`BackoffPolicy`] between attempts.
//! - **Fallback**: tries alternative actions in order until one succeeds.
//!
//! Policies compose by nesting; a retry around a breaker sees rejections as
//! ordinary failures.
//!
//! # Example
//!
//! ```rust
//! use lighter_resilience::resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, Retry, RetryConfig,
//! };
//!
//! # async fn example() -> Result<(), CircuitBreakerError<std::io::Error>> {
//! let cb = CircuitBreaker::with_config(
//!     "payment-api",
//!     CircuitBreakerConfig::default().with_exception_threshold(5),
//! );
//! let retry = Retry::new(RetryConfig::default().with_max_retries(3));
//!
//! let receipt = retry
//!     .run_async(|| cb.call(async { Ok::<_, std::io::Error>("receipt-17") }))
//!     .await?;
//! # assert_eq!(receipt, "receipt-17");
//! # Ok(())
//! # }
//! ```

mod backoff;
pub mod circuit_breaker;
mod clock;
pub mod fallback;
pub mod retry;
mod state;

pub use backoff::{BackoffPolicy, Exponential, FixedDelay};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitOpenError, Guarded,
    IgnorePredicate, ResetPredicate,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fallback::Fallback;
pub use retry::{Retry, RetryConfig, Retrying};
pub use state::{CircuitState, CircuitStateMachine};

