use rand::Rng;
use std::time::Duration;

/// Fraction of the computed delay used as the jitter amplitude.
pub(crate) const JITTER_FRACTION: f64 = 0.1;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RetryStrategy {
    /// Always `base_delay`.
    Fixed,
    /// `base_delay × (attempt + 1)`.
    Linear,
    /// `base_delay × multiplier^attempt`.
    Exponential,
    /// Uniform in `[base_delay, max_delay]`.
    Random,
}

/// Inputs for one delay computation, in seconds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    pub(crate) strategy: RetryStrategy,
    pub(crate) base: f64,
    pub(crate) max: f64,
    pub(crate) multiplier: f64,
    pub(crate) jitter: bool,
}

impl Backoff {
    /// Computes the delay to wait after the failed attempt `attempt`
    /// (0-indexed).
    ///
    /// Jitter is applied before clamping, so the result never exceeds the
    /// maximum delay.
    pub(crate) fn delay<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let raw = match self.strategy {
            RetryStrategy::Fixed => self.base,
            RetryStrategy::Linear => self.base * (f64::from(attempt) + 1.0),
            RetryStrategy::Exponential => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                self.base * self.multiplier.powi(exponent)
            }
            RetryStrategy::Random => {
                if self.max > self.base {
                    rng.random_range(self.base..=self.max)
                } else {
                    self.base
                }
            }
        };

        let jittered = if self.jitter && raw.is_finite() && raw > 0.0 {
            let amplitude = raw * JITTER_FRACTION;
            raw + rng.random_range(-amplitude..=amplitude)
        } else {
            raw
        };

        let clamped = if jittered.is_nan() {
            self.max
        } else {
            jittered.clamp(0.0, self.max)
        };
        // Caps near Duration::MAX do not survive the round trip through f64.
        Duration::try_from_secs_f64(clamped).unwrap_or(Duration::MAX)
    }
}
