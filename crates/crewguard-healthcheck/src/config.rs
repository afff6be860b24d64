//! Configuration for the health monitor.

use crewguard_core::ConfigError;
use std::time::Duration;

/// Timing settings for a [`HealthMonitor`](crate::HealthMonitor).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthMonitorConfig {
    /// Time between check cycles.
    pub interval: Duration,
    /// Longest a single check may run before it counts as unhealthy.
    pub check_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(10),
        }
    }
}

impl HealthMonitorConfig {
    /// Rejects zero durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid("interval", "must be greater than zero"));
        }
        if self.check_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "check_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
