use std::time::Duration;

/// Why a task did not produce a value.
///
/// The `Display` form is the user-visible error message of a failed
/// [`TaskResult`] and is never empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskError {
    /// The batch deadline passed before the task completed.
    #[error("timeout")]
    Timeout,

    /// The task waited in the overflow queue longer than allowed.
    #[error("task expired after waiting {waited:?} in the queue")]
    Expired {
        /// Time spent queued.
        waited: Duration,
    },

    /// No worker is registered for the task's routing key.
    #[error("no worker for routing key '{routing_key}'")]
    Routing {
        /// The unmatched key.
        routing_key: String,
    },

    /// The executor returned an error or panicked.
    #[error("{0}")]
    Execution(String),

    /// The task was not admitted.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The task was withdrawn from the queue before it started.
    #[error("cancelled before it started")]
    Cancelled,

    /// The task was still queued when its worker shut down.
    #[error("discarded during shutdown")]
    Discarded,
}

impl TaskError {
    /// An execution failure with `message`, or a generic message if it is
    /// empty.
    pub fn execution(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            TaskError::Execution("task failed".to_string())
        } else {
            TaskError::Execution(message)
        }
    }

    /// Returns true for [`TaskError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout)
    }
}

/// Outcome of one task.
///
/// Exactly one result is produced for every task handed to a worker or
/// orchestrator, whether it succeeded, failed, timed out or was never run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskResult<R> {
    pub task_id: String,
    /// The worker that handled the task; `None` when routing failed.
    pub worker_id: Option<String>,
    pub success: bool,
    /// Executor output, present only on success.
    pub value: Option<R>,
    /// Failure reason, present only on failure.
    pub error: Option<TaskError>,
    /// Execution time, or time waited for timeouts and expiries.
    pub duration: Duration,
}

impl<R> TaskResult<R> {
    /// A successful result.
    pub fn success(
        task_id: impl Into<String>,
        worker_id: impl Into<String>,
        value: R,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            worker_id: Some(worker_id.into()),
            success: true,
            value: Some(value),
            error: None,
            duration,
        }
    }

    /// A failed result.
    pub fn failure(
        task_id: impl Into<String>,
        worker_id: Option<String>,
        error: TaskError,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            worker_id,
            success: false,
            value: None,
            error: Some(error),
            duration,
        }
    }

    /// Returns true if the task failed because the batch deadline passed.
    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(TaskError::is_timeout)
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<R, TaskError> {
        match (self.value, self.error) {
            (Some(value), None) => Ok(value),
            (_, Some(error)) => Err(error),
            (None, None) => Err(TaskError::execution("")),
        }
    }
}
