//! Backoff policies used between retry attempts.

use std::fmt::Debug;
use std::time::Duration;

/// Maps a retry attempt number to the delay before the next attempt
pub trait BackoffPolicy: Send + Sync + Debug {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Constant delay regardless of attempt (zero by default)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedDelay {
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Square-power backoff: `attempt²` seconds.
///
/// Attempts 0, 1, 2, 3, 4 wait 0, 1, 4, 9 and 16 seconds. Despite the name
/// the growth is polynomial, not `base^attempt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exponential;

impl BackoffPolicy for Exponential {
    fn delay(&self, attempt: u32) -> Duration {
        let attempt = u64::from(attempt);
        Duration::from_secs(attempt.saturating_mul(attempt))
    }
}
