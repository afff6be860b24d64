use crewguard_core::CrewEvent;
use std::time::{Duration, Instant};

/// Task lifecycle events emitted by workers and the orchestrator.
///
/// `worker` is the emitting worker's id, or `"orchestrator"` for events
/// raised before a task reaches a worker.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A worker admitted the task, either starting it or queueing it.
    TaskDispatched {
        worker: String,
        timestamp: Instant,
        task_id: String,
        queued: bool,
    },
    /// The executor was invoked for the task.
    TaskStarted {
        worker: String,
        timestamp: Instant,
        task_id: String,
    },
    /// The executor finished, successfully or not.
    TaskCompleted {
        worker: String,
        timestamp: Instant,
        task_id: String,
        success: bool,
        duration: Duration,
    },
    /// A queued task waited too long and was dropped.
    TaskExpired {
        worker: String,
        timestamp: Instant,
        task_id: String,
        waited: Duration,
    },
    /// The task was refused without running.
    TaskRejected {
        worker: String,
        timestamp: Instant,
        task_id: String,
        reason: String,
    },
    /// A batch deadline passed before the task completed.
    TaskTimedOut {
        worker: String,
        timestamp: Instant,
        task_id: String,
    },
}

impl CrewEvent for TaskEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::TaskDispatched { .. } => "task_dispatched",
            TaskEvent::TaskStarted { .. } => "task_started",
            TaskEvent::TaskCompleted { .. } => "task_completed",
            TaskEvent::TaskExpired { .. } => "task_expired",
            TaskEvent::TaskRejected { .. } => "task_rejected",
            TaskEvent::TaskTimedOut { .. } => "task_timed_out",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TaskEvent::TaskDispatched { timestamp, .. }
            | TaskEvent::TaskStarted { timestamp, .. }
            | TaskEvent::TaskCompleted { timestamp, .. }
            | TaskEvent::TaskExpired { timestamp, .. }
            | TaskEvent::TaskRejected { timestamp, .. }
            | TaskEvent::TaskTimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            TaskEvent::TaskDispatched { worker, .. }
            | TaskEvent::TaskStarted { worker, .. }
            | TaskEvent::TaskCompleted { worker, .. }
            | TaskEvent::TaskExpired { worker, .. }
            | TaskEvent::TaskRejected { worker, .. }
            | TaskEvent::TaskTimedOut { worker, .. } => worker,
        }
    }
}

impl TaskEvent {
    /// The id of the task this event concerns.
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::TaskDispatched { task_id, .. }
            | TaskEvent::TaskStarted { task_id, .. }
            | TaskEvent::TaskCompleted { task_id, .. }
            | TaskEvent::TaskExpired { task_id, .. }
            | TaskEvent::TaskRejected { task_id, .. }
            | TaskEvent::TaskTimedOut { task_id, .. } => task_id,
        }
    }
}
