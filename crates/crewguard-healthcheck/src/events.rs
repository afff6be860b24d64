use crewguard_core::CrewEvent;
use std::time::Instant;

/// Events emitted by a health monitor.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// A check's result differed from its previous status.
    StatusChanged {
        check: String,
        timestamp: Instant,
        healthy: bool,
    },
    /// A recovery action ran after a check became unhealthy.
    RecoveryAttempted {
        check: String,
        timestamp: Instant,
        successful: bool,
    },
}

impl CrewEvent for HealthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HealthEvent::StatusChanged { .. } => "health_status_changed",
            HealthEvent::RecoveryAttempted { .. } => "recovery_attempted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HealthEvent::StatusChanged { timestamp, .. }
            | HealthEvent::RecoveryAttempted { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            HealthEvent::StatusChanged { check, .. }
            | HealthEvent::RecoveryAttempted { check, .. } => check,
        }
    }
}
