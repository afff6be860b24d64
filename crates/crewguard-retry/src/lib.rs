//! Retry policies with bounded, multi-strategy backoff.
//!
//! A [`RetryPolicy`] re-invokes an async operation until it succeeds, fails
//! with an error outside the policy's retry set, or runs out of attempts.
//!
//! # Strategies
//!
//! For the failed attempt `n` (0-indexed) the delay before the next attempt is:
//!
//! - [`RetryStrategy::Fixed`]: `base_delay`
//! - [`RetryStrategy::Linear`]: `base_delay × (n + 1)`
//! - [`RetryStrategy::Exponential`]: `base_delay × multiplier^n`
//! - [`RetryStrategy::Random`]: uniform in `[base_delay, max_delay]`
//!
//! With jitter enabled, uniform noise of ±10% is added before the result is
//! clamped to `max_delay`. No delay follows the final attempt.
//!
//! # Examples
//!
//! ```
//! use crewguard_retry::{RetryPolicy, RetryStrategy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder("model-api")
//!     .max_attempts(4)
//!     .base_delay(Duration::from_millis(100))
//!     .strategy(RetryStrategy::Linear)
//!     .jitter(false)
//!     .build()
//!     .unwrap();
//!
//! let value = policy
//!     .retry(|| async { Ok::<_, std::io::Error>(42) })
//!     .await
//!     .unwrap();
//! assert_eq!(value, 42);
//! # }
//! ```

mod backoff;
mod config;
mod events;

pub use backoff::RetryStrategy;
pub use config::{RetryConfig, RetryPolicyBuilder};
pub use events::RetryEvent;

use crewguard_core::{ConfigError, ErrorMatcher, EventListeners};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A named, stateless retry policy.
///
/// Each call to [`retry`](Self::retry) keeps its own attempt counter, so one
/// policy can be shared freely between concurrent callers.
#[derive(Clone)]
pub struct RetryPolicy {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: RetryConfig,
    retry_on: ErrorMatcher,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryPolicy {
    /// Creates a policy that retries every error.
    pub fn new(name: impl Into<String>, config: RetryConfig) -> Result<Self, ConfigError> {
        Self::builder(name).config(config).build()
    }

    /// Starts building a named policy.
    pub fn builder(name: impl Into<String>) -> RetryPolicyBuilder {
        RetryPolicyBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        config: RetryConfig,
        retry_on: ErrorMatcher,
        event_listeners: EventListeners<RetryEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                config,
                retry_on,
                event_listeners,
            }),
        }
    }

    /// Returns the policy name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the policy configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    /// Returns true if `err` is in this policy's retry set.
    pub fn should_retry<E: 'static>(&self, err: &E) -> bool {
        self.inner.retry_on.matches(err)
    }

    /// Computes the delay after failed attempt `attempt` (0-indexed).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        self.inner.config.compute_delay(attempt)
    }

    /// Runs `f` until it succeeds, fails with an error outside the retry
    /// set, or `max_attempts` attempts have failed. The last error is
    /// returned unchanged.
    pub async fn retry<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        self.retry_if(f, |err: &E| self.should_retry(err)).await
    }

    /// Like [`retry`](Self::retry), but `should_retry` decides which errors
    /// are retried instead of the configured matcher.
    pub async fn retry_if<F, Fut, T, E, P>(&self, mut f: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.inner.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match f().await {
                Ok(value) => {
                    self.emit(RetryEvent::Success {
                        policy: self.inner.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt + 1,
                    });

                    #[cfg(feature = "tracing")]
                    if attempt > 0 {
                        tracing::info!(retry = %self.inner.name, attempts = attempt + 1, "succeeded after retry");
                    }

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => self.inner.name.clone(), "outcome" => "success").increment(1);

                    return Ok(value);
                }
                Err(err) => {
                    if !should_retry(&err) {
                        self.emit(RetryEvent::IgnoredError {
                            policy: self.inner.name.clone(),
                            timestamp: Instant::now(),
                            attempt: attempt + 1,
                        });

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => self.inner.name.clone(), "outcome" => "not_retryable").increment(1);

                        return Err(err);
                    }

                    if attempt + 1 >= max_attempts {
                        self.emit(RetryEvent::Error {
                            policy: self.inner.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::error!(retry = %self.inner.name, attempts = attempt + 1, "all attempts failed");

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => self.inner.name.clone(), "outcome" => "exhausted").increment(1);

                        return Err(err);
                    }

                    let delay = self.inner.config.compute_delay(attempt);
                    attempt += 1;

                    self.emit(RetryEvent::Retry {
                        policy: self.inner.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        retry = %self.inner.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => self.inner.name.clone()).increment(1);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn emit(&self, event: RetryEvent) {
        if !self.inner.event_listeners.is_empty() {
            self.inner.event_listeners.emit(&event);
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("retry_on", &self.inner.retry_on)
            .finish()
    }
}
