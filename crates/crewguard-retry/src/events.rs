use crewguard_core::CrewEvent;
use std::time::{Duration, Instant};

/// Events emitted by a retry policy.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A failed attempt will be retried after `delay`.
    Retry {
        policy: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// The operation succeeded, on the first try or after retries.
    Success {
        policy: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed.
    Error {
        policy: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// An error outside the retry set was returned without retrying.
    IgnoredError {
        policy: String,
        timestamp: Instant,
        attempt: u32,
    },
}

impl CrewEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Error { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            RetryEvent::Retry { policy, .. }
            | RetryEvent::Success { policy, .. }
            | RetryEvent::Error { policy, .. }
            | RetryEvent::IgnoredError { policy, .. } => policy,
        }
    }
}
