use crate::config::Settings;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is probing recovery; calls are allowed and any failure
    /// re-opens it.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive qualifying failures since the last reset.
    pub failure_count: u32,
    /// Successes recorded while half-open.
    pub success_count: u32,
    /// Time since the most recent recorded failure, if any.
    pub since_last_failure: Option<Duration>,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    last_state_change: Instant,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            last_state_change: Instant::now(),
        }
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            since_last_failure: self.last_failure_at.map(|at| at.elapsed()),
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Decides whether a call may proceed, moving an open circuit to
    /// half-open once the recovery timeout has passed.
    pub(crate) fn try_acquire(&mut self, settings: &Settings) -> bool {
        if self.state == CircuitState::Open {
            let recovered = self
                .last_failure_at
                .map(|at| at.elapsed() >= settings.config.recovery_timeout)
                .unwrap_or(true);

            if !recovered {
                settings
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        breaker: settings.name.clone(),
                        timestamp: std::time::Instant::now(),
                    });

                #[cfg(feature = "tracing")]
                tracing::debug!(circuitbreaker = %settings.name, "call rejected by open circuit");

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => settings.name.clone(), "outcome" => "rejected").increment(1);

                return false;
            }

            self.transition_to(CircuitState::HalfOpen, settings);
        }

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::CallPermitted {
                breaker: settings.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });
        true
    }

    pub(crate) fn record_success(&mut self, settings: &Settings, duration: Duration) {
        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                breaker: settings.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => settings.name.clone(), "outcome" => "success").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => settings.name.clone())
                .record(duration.as_secs_f64());
        }
        #[cfg(not(feature = "metrics"))]
        let _ = duration;

        match self.state {
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= settings.config.success_threshold {
                    self.transition_to(CircuitState::Closed, settings);
                }
            }
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(&mut self, settings: &Settings, duration: Duration) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(Instant::now());

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                breaker: settings.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                failure_count: self.failure_count,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => settings.name.clone(), "outcome" => "failure").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => settings.name.clone())
                .record(duration.as_secs_f64());
        }
        #[cfg(not(feature = "metrics"))]
        let _ = duration;

        match self.state {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open, settings),
            CircuitState::Closed if self.failure_count >= settings.config.failure_threshold => {
                self.transition_to(CircuitState::Open, settings)
            }
            _ => {}
        }
    }

    pub(crate) fn force_open(&mut self, settings: &Settings) {
        self.last_failure_at = Some(Instant::now());
        self.transition_to(CircuitState::Open, settings);
    }

    pub(crate) fn reset(&mut self, settings: &Settings) {
        self.transition_to(CircuitState::Closed, settings);
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure_at = None;
    }

    fn transition_to(&mut self, state: CircuitState, settings: &Settings) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                breaker: settings.name.clone(),
                timestamp: std::time::Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        match state {
            CircuitState::Open => tracing::warn!(
                circuitbreaker = %settings.name,
                from = ?from_state,
                failures = self.failure_count,
                "circuit opened"
            ),
            _ => tracing::info!(
                circuitbreaker = %settings.name,
                from = ?from_state,
                to = ?state,
                "circuit state transition"
            ),
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => settings.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => settings.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.success_count = 0;
        if state == CircuitState::Closed {
            self.failure_count = 0;
        }
    }
}
