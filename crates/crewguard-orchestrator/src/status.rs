//! Worker status and aggregate reporting.

use std::fmt;
use std::time::{Duration, SystemTime};

/// Reported state of a worker.
///
/// Precedence when several apply: `Offline`, then `Error`, then `Busy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WorkerStatus {
    /// Nothing in flight.
    Idle,
    /// At least one task in flight.
    Busy,
    /// Shut down; new tasks are rejected.
    Offline,
    /// Flagged by [`Worker::mark_error`](crate::Worker::mark_error).
    /// Tasks still run.
    Error,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
            WorkerStatus::Error => "error",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerReport {
    pub id: String,
    pub name: String,
    pub status: WorkerStatus,
    pub capacity: usize,
    pub in_flight: usize,
    pub queued: usize,
    /// Tasks whose executor ran to completion, successfully or not.
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Queued tasks dropped for waiting too long.
    pub expired: u64,
    /// Queued tasks withdrawn before they started.
    pub cancelled: u64,
    /// Queued tasks dropped by shutdown.
    pub discarded: u64,
    /// `succeeded / executed` as a percentage, 0 when nothing executed.
    pub success_rate: f64,
    /// Mean execution time over executed tasks.
    pub average_duration: Duration,
    /// Reason given to `mark_error`, if the error flag is set.
    pub error: Option<String>,
}

/// Orchestrator-wide status, aggregated from per-worker snapshots.
///
/// Each worker is captured atomically; the aggregate is not atomic across
/// workers. Equality ignores `captured_at`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateStatus {
    pub total_workers: usize,
    pub idle_count: usize,
    pub busy_count: usize,
    pub offline_count: usize,
    pub error_count: usize,
    pub total_in_flight: usize,
    pub total_capacity: usize,
    /// `total_in_flight / total_capacity`, 0 without workers.
    pub load_ratio: f64,
    pub queued_total: usize,
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub expired: u64,
    /// Tasks that missed a batch deadline.
    pub timed_out: u64,
    /// Tasks whose routing key matched no worker.
    pub routing_errors: u64,
    pub captured_at: SystemTime,
}

impl AggregateStatus {
    pub(crate) fn from_reports(reports: &[WorkerReport], timed_out: u64, routing_errors: u64) -> Self {
        let count = |status: WorkerStatus| reports.iter().filter(|r| r.status == status).count();
        let total_in_flight: usize = reports.iter().map(|r| r.in_flight).sum();
        let total_capacity: usize = reports.iter().map(|r| r.capacity).sum();

        Self {
            total_workers: reports.len(),
            idle_count: count(WorkerStatus::Idle),
            busy_count: count(WorkerStatus::Busy),
            offline_count: count(WorkerStatus::Offline),
            error_count: count(WorkerStatus::Error),
            total_in_flight,
            total_capacity,
            load_ratio: if total_capacity == 0 {
                0.0
            } else {
                total_in_flight as f64 / total_capacity as f64
            },
            queued_total: reports.iter().map(|r| r.queued).sum(),
            executed: reports.iter().map(|r| r.executed).sum(),
            succeeded: reports.iter().map(|r| r.succeeded).sum(),
            failed: reports.iter().map(|r| r.failed).sum(),
            expired: reports.iter().map(|r| r.expired).sum(),
            timed_out,
            routing_errors,
            captured_at: SystemTime::now(),
        }
    }
}

impl PartialEq for AggregateStatus {
    fn eq(&self, other: &Self) -> bool {
        self.total_workers == other.total_workers
            && self.idle_count == other.idle_count
            && self.busy_count == other.busy_count
            && self.offline_count == other.offline_count
            && self.error_count == other.error_count
            && self.total_in_flight == other.total_in_flight
            && self.total_capacity == other.total_capacity
            && self.load_ratio == other.load_ratio
            && self.queued_total == other.queued_total
            && self.executed == other.executed
            && self.succeeded == other.succeeded
            && self.failed == other.failed
            && self.expired == other.expired
            && self.timed_out == other.timed_out
            && self.routing_errors == other.routing_errors
    }
}
