use crate::backoff::{Backoff, RetryStrategy};
use crate::events::RetryEvent;
use crate::RetryPolicy;
use crewguard_core::{ConfigError, ErrorMatcher, EventListeners};
use rand::Rng;
use std::time::Duration;

/// Bounds and strategy for a retry policy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Starting delay for every strategy.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Delay growth strategy.
    pub strategy: RetryStrategy,
    /// Growth factor for [`RetryStrategy::Exponential`].
    pub multiplier: f64,
    /// Adds uniform noise of ±10% to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::Exponential,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Checks that the bounds are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "multiplier",
                format!("must be a positive finite number, got {}", self.multiplier),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::Conflict(format!(
                "base_delay {:?} exceeds max_delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Computes the delay after failed attempt `attempt` (0-indexed) using
    /// the thread-local random generator for jitter and the random strategy.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        self.compute_delay_with(attempt, &mut rand::rng())
    }

    /// Like [`compute_delay`](Self::compute_delay) with a caller-supplied
    /// random source.
    pub fn compute_delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.backoff().delay(attempt, rng).min(self.max_delay)
    }

    fn backoff(&self) -> Backoff {
        Backoff {
            strategy: self.strategy,
            base: self.base_delay.as_secs_f64(),
            max: self.max_delay.as_secs_f64(),
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}

/// Builder for a [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    name: String,
    config: RetryConfig,
    retry_on: ErrorMatcher,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryPolicyBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RetryConfig::default(),
            retry_on: ErrorMatcher::any(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the total number of attempts.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay.
    ///
    /// Default: 1 second
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Sets the maximum delay between attempts.
    ///
    /// Default: 60 seconds
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Sets the backoff strategy.
    ///
    /// Default: [`RetryStrategy::Exponential`]
    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Sets the exponential growth factor.
    ///
    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    /// Enables or disables ±10% jitter.
    ///
    /// Default: true
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Restricts which errors are retried. Others are returned on first
    /// occurrence.
    ///
    /// Default: every error is retried
    pub fn retry_on(mut self, matcher: ErrorMatcher) -> Self {
        self.retry_on = matcher;
        self
    }

    /// Registers a callback invoked before each retry with the upcoming
    /// attempt number (1-indexed retries) and the delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        });
        self
    }

    /// Registers a callback invoked when all attempts are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a raw listener for every retry event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Validates the configuration and builds the policy.
    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        self.config.validate()?;
        Ok(RetryPolicy::from_parts(
            self.name,
            self.config,
            self.retry_on,
            self.event_listeners,
        ))
    }
}
