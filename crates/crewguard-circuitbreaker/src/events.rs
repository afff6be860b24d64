use crate::CircuitState;
use crewguard_core::CrewEvent;
use std::time::Instant;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        breaker: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was allowed through.
    CallPermitted {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without invoking the protected function.
    CallRejected {
        breaker: String,
        timestamp: Instant,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A qualifying failure was recorded.
    FailureRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
        failure_count: u32,
    },
    /// An error outside the configured failure set passed through.
    ErrorIgnored {
        breaker: String,
        timestamp: Instant,
    },
}

impl CrewEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::ErrorIgnored { .. } => "error_ignored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::ErrorIgnored { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { breaker, .. }
            | CircuitBreakerEvent::CallPermitted { breaker, .. }
            | CircuitBreakerEvent::CallRejected { breaker, .. }
            | CircuitBreakerEvent::SuccessRecorded { breaker, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker, .. }
            | CircuitBreakerEvent::ErrorIgnored { breaker, .. } => breaker,
        }
    }
}
