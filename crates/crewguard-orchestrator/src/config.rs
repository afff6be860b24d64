//! Worker and orchestrator settings.

use crewguard_core::ConfigError;
use std::time::Duration;

/// Capacity settings for one [`Worker`](crate::Worker).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerConfig {
    /// Maximum number of concurrently executing tasks.
    pub capacity: usize,
    /// Longest a task may wait in the overflow queue before it expires.
    pub max_queue_wait: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            max_queue_wait: Duration::from_secs(300),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::invalid("capacity", "must be at least 1"));
        }
        if self.max_queue_wait.is_zero() {
            return Err(ConfigError::invalid(
                "max_queue_wait",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Settings for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrchestratorConfig {
    /// How long shutdown waits for in-flight and queued work.
    pub shutdown_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(30),
        }
    }
}
