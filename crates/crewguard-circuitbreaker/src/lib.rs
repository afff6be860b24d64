//! Consecutive-failure circuit breaker for crewguard resources.
//!
//! A [`CircuitBreaker`] guards a named resource. While the resource keeps
//! failing, the breaker stops calling it and fails fast, giving it time to
//! recover.
//!
//! ## State machine
//!
//! - **Closed**: calls flow through. Every qualifying failure increments the
//!   failure count and any success resets it to zero. Reaching
//!   `failure_threshold` opens the circuit.
//! - **Open**: calls are rejected with [`CircuitBreakerError::OpenCircuit`]
//!   without invoking the protected function. The first call attempted after
//!   `recovery_timeout` has elapsed since the last failure moves the circuit
//!   to half-open.
//! - **Half-open**: calls flow through. `success_threshold` successes close
//!   the circuit; a single failure re-opens it.
//!
//! State changes happen under a per-breaker mutex, so concurrent callers
//! observe a linearizable sequence of transitions. The current state is
//! mirrored into an atomic for lock-free reads.
//!
//! ## Example
//!
//! ```rust
//! use crewguard_circuitbreaker::{CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder("inventory-db")
//!     .failure_threshold(2)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//!
//! for _ in 0..2 {
//!     let _ = breaker
//!         .call(|| async { Err::<(), _>(std::io::Error::other("connection refused")) })
//!         .await;
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.call(|| async { Ok::<_, std::io::Error>(()) }).await;
//! assert!(rejected.unwrap_err().is_circuit_open());
//! # }
//! ```

mod circuit;
mod config;
mod error;
mod events;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerBuilder, CircuitBreakerConfig};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;

use circuit::Circuit;
use config::Settings;
use crewguard_core::ConfigError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// A shareable circuit breaker for one named resource.
///
/// Cloning is cheap; clones share the same circuit.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    circuit: Mutex<Circuit>,
    state: Arc<AtomicU8>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given thresholds, counting every error as
    /// a failure.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        Self::builder(name).config(config).build()
    }

    /// Starts building a breaker for the named resource.
    pub fn builder(name: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(name)
    }

    pub(crate) fn from_settings(settings: Settings) -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(Arc::clone(&state));
        Self {
            inner: Arc::new(Inner {
                settings,
                circuit: Mutex::new(circuit),
                state,
            }),
        }
    }

    /// Runs `f` under the breaker's protection.
    ///
    /// If the circuit is open and the recovery timeout has not elapsed, `f`
    /// is never invoked and [`CircuitBreakerError::OpenCircuit`] is returned.
    /// Errors outside the configured failure set are returned as
    /// [`CircuitBreakerError::Inner`] without affecting the circuit.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        if !self.circuit().try_acquire(&self.inner.settings) {
            return Err(CircuitBreakerError::OpenCircuit {
                name: self.inner.settings.name.clone(),
            });
        }

        let start = Instant::now();
        match f().await {
            Ok(value) => {
                self.circuit()
                    .record_success(&self.inner.settings, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                if self.inner.settings.failures.matches(&err) {
                    self.circuit()
                        .record_failure(&self.inner.settings, start.elapsed());
                } else {
                    self.inner
                        .settings
                        .event_listeners
                        .emit(&CircuitBreakerEvent::ErrorIgnored {
                            breaker: self.inner.settings.name.clone(),
                            timestamp: std::time::Instant::now(),
                        });
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Returns the resource name this breaker guards.
    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    /// Returns the breaker's thresholds.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.settings.config
    }

    /// Returns the current state without taking the lock.
    ///
    /// An open circuit whose recovery timeout has passed still reports
    /// [`CircuitState::Open`] until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns true if the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.circuit().metrics()
    }

    /// Opens the circuit immediately, starting a fresh recovery timeout.
    pub fn force_open(&self) {
        self.circuit().force_open(&self.inner.settings);
    }

    /// Closes the circuit and clears all counters.
    pub fn reset(&self) {
        self.circuit().reset(&self.inner.settings);
    }

    fn circuit(&self) -> MutexGuard<'_, Circuit> {
        self.inner
            .circuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.settings.name)
            .field("state", &self.state())
            .field("config", &self.inner.settings.config)
            .finish()
    }
}
