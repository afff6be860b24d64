use std::fmt;
use tokio::time::Instant;

/// Scheduling priority of a [`Task`].
///
/// Priority is carried for executors and reporting; workers start queued
/// tasks in submission order regardless of priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Lowercase label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work, routed to the worker whose id equals its routing key.
///
/// Tasks are immutable once created. The payload is opaque to crewguard and
/// handed to the worker's executor as part of the task.
#[derive(Debug, Clone)]
pub struct Task<P> {
    id: String,
    routing_key: String,
    priority: Priority,
    payload: P,
    enqueued_at: Instant,
}

impl<P> Task<P> {
    /// Creates a medium-priority task.
    pub fn new(id: impl Into<String>, routing_key: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            routing_key: routing_key.into(),
            priority: Priority::default(),
            payload,
            enqueued_at: Instant::now(),
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// When the task was created.
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Consumes the task, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}
