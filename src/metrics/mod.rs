//! Metrics emitted by the resilience policies.
//!
//! Everything goes through the [`metrics`] facade, so nothing is recorded
//! until the host application installs a recorder. With the `prometheus`
//! feature, [`PrometheusMetrics`] installs one and renders the exposition
//! text.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::Once;

use crate::resilience::CircuitState;

pub const CIRCUIT_BREAKER_CALLS_TOTAL: &str = "resilience_circuit_breaker_calls_total";
pub const CIRCUIT_BREAKER_REJECTIONS_TOTAL: &str = "resilience_circuit_breaker_rejections_total";
pub const CIRCUIT_BREAKER_TRANSITIONS_TOTAL: &str = "resilience_circuit_breaker_transitions_total";
pub const CIRCUIT_BREAKER_STATE: &str = "resilience_circuit_breaker_state";
pub const RETRY_ATTEMPTS_TOTAL: &str = "resilience_retry_attempts_total";
pub const FALLBACK_HANDOFFS_TOTAL: &str = "resilience_fallback_handoffs_total";

static DESCRIBE: Once = Once::new();

/// Outcome label for a call that went through a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Ignored,
}

impl CallOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Ignored => "ignored",
        }
    }
}

/// Register descriptions for every metric. Safe to call repeatedly.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            CIRCUIT_BREAKER_CALLS_TOTAL,
            "Calls that reached the protected operation, by outcome"
        );
        describe_counter!(
            CIRCUIT_BREAKER_REJECTIONS_TOTAL,
            "Calls rejected without running because the circuit was open"
        );
        describe_counter!(
            CIRCUIT_BREAKER_TRANSITIONS_TOTAL,
            "Circuit state transitions, by target state"
        );
        describe_gauge!(
            CIRCUIT_BREAKER_STATE,
            "Current circuit state (0 closed, 1 partially open, 2 open)"
        );
        describe_counter!(
            RETRY_ATTEMPTS_TOTAL,
            "Retry attempts made after a failed first attempt"
        );
        describe_counter!(
            FALLBACK_HANDOFFS_TOTAL,
            "Times a fallback chain moved on to its next action"
        );
    });
}

pub(crate) fn record_call(breaker: &str, outcome: CallOutcome) {
    counter!(
        CIRCUIT_BREAKER_CALLS_TOTAL,
        "circuit_breaker" => breaker.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub(crate) fn record_rejection(breaker: &str) {
    counter!(CIRCUIT_BREAKER_REJECTIONS_TOTAL, "circuit_breaker" => breaker.to_string())
        .increment(1);
}

pub(crate) fn record_transition(breaker: &str, to: CircuitState) {
    counter!(
        CIRCUIT_BREAKER_TRANSITIONS_TOTAL,
        "circuit_breaker" => breaker.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
    gauge!(CIRCUIT_BREAKER_STATE, "circuit_breaker" => breaker.to_string())
        .set(to.as_metric_value());
}

pub(crate) fn record_retry_attempt() {
    counter!(RETRY_ATTEMPTS_TOTAL).increment(1);
}

pub(crate) fn record_fallback_handoff(action: usize) {
    counter!(FALLBACK_HANDOFFS_TOTAL, "action" => action.to_string()).increment(1);
}

#[cfg(feature = "prometheus")]
pub use prometheus::PrometheusMetrics;

#[cfg(feature = "prometheus")]
mod prometheus {
    use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
    use std::sync::{Arc, OnceLock};

    static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    /// Process-wide Prometheus recorder for the resilience metrics
    #[derive(Clone)]
    pub struct PrometheusMetrics {
        prometheus_handle: Arc<PrometheusHandle>,
    }

    impl PrometheusMetrics {
        /// Install the recorder on first use; later calls reuse it
        pub fn install() -> Result<Self, BuildError> {
            if let Some(handle) = PROMETHEUS_HANDLE.get() {
                return Ok(Self {
                    prometheus_handle: Arc::new(handle.clone()),
                });
            }

            let handle = PrometheusBuilder::new().install_recorder()?;
            super::describe_metrics();
            let handle = PROMETHEUS_HANDLE.get_or_init(|| handle);

            Ok(Self {
                prometheus_handle: Arc::new(handle.clone()),
            })
        }

        pub fn render(&self) -> String {
            self.prometheus_handle.render()
        }
    }

}
