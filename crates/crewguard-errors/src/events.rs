use crewguard_core::{CrewEvent, Severity};
use std::time::Instant;

/// Events emitted by an [`ErrorLog`](crate::ErrorLog).
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    /// A failure was appended to the log.
    ErrorRecorded {
        component: String,
        timestamp: Instant,
        record_id: String,
        error_type: String,
        severity: Severity,
    },
    /// The recovery outcome of a record was set.
    RecoveryResolved {
        component: String,
        timestamp: Instant,
        record_id: String,
        successful: bool,
    },
}

impl CrewEvent for ErrorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ErrorEvent::ErrorRecorded { .. } => "error_recorded",
            ErrorEvent::RecoveryResolved { .. } => "recovery_resolved",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ErrorEvent::ErrorRecorded { timestamp, .. }
            | ErrorEvent::RecoveryResolved { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            ErrorEvent::ErrorRecorded { component, .. }
            | ErrorEvent::RecoveryResolved { component, .. } => component,
        }
    }
}
