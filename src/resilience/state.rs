//! Circuit state and its legal transitions.
//!
//! ```text
//!            trip                 attempt_reset
//! ┌────────┐ ─────► ┌──────┐ ────────────────► ┌───────────────┐
//! │ Closed │        │ Open │                   │ PartiallyOpen │
//! └────────┘ ◄───┐  └──────┘ ◄──────────────── └───────┬───────┘
//!                │              trip (trial failed)    │
//!                └─────────────────────────────────────┘
//!                        reset (trial succeeded)
//! ```
//!
//! The machine carries no timing logic; the circuit breaker decides *when*
//! to call each transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls flow through
    #[default]
    Closed,
    /// Probing: a single trial call decides whether to close or reopen
    PartiallyOpen,
    /// Failing fast, calls are rejected without running
    Open,
}

impl CircuitState {
    /// Gauge value exported through the metrics facade
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::PartiallyOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::PartiallyOpen => write!(f, "PartiallyOpen"),
            CircuitState::Open => write!(f, "Open"),
        }
    }
}

/// Holds the current [`CircuitState`] and only allows legal transitions.
///
/// Every transition returns `true` when the state actually changed, so
/// callers can log and count real transitions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStateMachine {
    current: CircuitState,
}

impl CircuitStateMachine {
    pub fn new(initial: CircuitState) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> CircuitState {
        self.current
    }

    pub fn is_closed(&self) -> bool {
        self.current == CircuitState::Closed
    }

    pub fn is_open(&self) -> bool {
        self.current == CircuitState::Open
    }

    pub fn is_partially_open(&self) -> bool {
        self.current == CircuitState::PartiallyOpen
    }

    /// `Closed | PartiallyOpen` → `Open`
    pub fn trip(&mut self) -> bool {
        match self.current {
            CircuitState::Closed | CircuitState::PartiallyOpen => {
                self.current = CircuitState::Open;
                true
            }
            CircuitState::Open => false,
        }
    }

    /// `Open` → `PartiallyOpen`
    pub fn attempt_reset(&mut self) -> bool {
        match self.current {
            CircuitState::Open => {
                self.current = CircuitState::PartiallyOpen;
                true
            }
            _ => false,
        }
    }

    /// `Open | PartiallyOpen` → `Closed`
    pub fn reset(&mut self) -> bool {
        match self.current {
            CircuitState::Open | CircuitState::PartiallyOpen => {
                self.current = CircuitState::Closed;
                true
            }
            CircuitState::Closed => false,
        }
    }
}

impl Default for CircuitStateMachine {
    fn default() -> Self {
        Self::new(CircuitState::Closed)
    }
}
