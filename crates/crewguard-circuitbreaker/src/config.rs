use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use crewguard_core::{ConfigError, ErrorMatcher, EventListeners};
use std::time::Duration;

/// Thresholds governing a circuit breaker's state machine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CircuitBreakerConfig {
    /// Consecutive qualifying failures that open a closed circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls after the last failure.
    pub recovery_timeout: Duration,
    /// Successful half-open calls needed to close the circuit again.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Checks that every threshold is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "failure_threshold",
                "must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid(
                "success_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

/// Everything a breaker needs besides its mutable circuit.
pub(crate) struct Settings {
    pub(crate) name: String,
    pub(crate) config: CircuitBreakerConfig,
    pub(crate) failures: ErrorMatcher,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
    failures: ErrorMatcher,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            failures: ErrorMatcher::any(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Replaces all thresholds at once.
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of consecutive failures that opens the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open after the most recent failure.
    ///
    /// Default: 60 seconds
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    /// Sets the number of half-open successes required to close the circuit.
    ///
    /// Default: 3
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    /// Restricts which errors count as failures.
    ///
    /// Errors outside the set are passed through to the caller without
    /// touching the circuit.
    ///
    /// Default: every error counts
    pub fn record_failures(mut self, matcher: ErrorMatcher) -> Self {
        self.failures = matcher;
        self
    }

    /// Registers a callback for state transitions.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Registers a callback for calls rejected by an open circuit.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                f();
            }
        });
        self
    }

    /// Registers a callback invoked with the failure count after each
    /// recorded failure.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::FailureRecorded { failure_count, .. } = event {
                f(*failure_count);
            }
        });
        self
    }

    /// Registers a callback for recorded successes.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a raw event listener receiving every breaker event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Validates the configuration and builds the breaker.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.config.validate()?;
        Ok(CircuitBreaker::from_settings(Settings {
            name: self.name,
            config: self.config,
            failures: self.failures,
            event_listeners: self.event_listeners,
        }))
    }
}
