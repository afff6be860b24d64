//! Bounded-concurrency workers and fan-out/fan-in task orchestration.
//!
//! A [`Worker`] executes [`Task`]s through a tower service, at most
//! `capacity` at a time. Tasks beyond capacity wait in a FIFO overflow queue
//! and are started as slots free up; a task that waited longer than
//! `max_queue_wait` expires instead of running.
//!
//! An [`Orchestrator`] owns a fixed set of workers, routes each task to the
//! worker whose id equals the task's routing key, and collects one
//! [`TaskResult`] per task in input order. A batch has one deadline: tasks
//! still unfinished when it passes fail with [`TaskError::Timeout`].
//!
//! Execution failures never escape as errors. They become failed results
//! and, when an [`ErrorReporter`](crewguard_errors::ErrorReporter) is
//! configured, are reported before the worker's slot is released.
//!
//! # Worker status
//!
//! | Status    | Meaning                                              |
//! |-----------|------------------------------------------------------|
//! | `Idle`    | nothing executing                                    |
//! | `Busy`    | at least one task executing                          |
//! | `Error`   | flagged with [`Worker::mark_error`]; still executes  |
//! | `Offline` | shut down; rejects new tasks                         |
//!
//! # Examples
//!
//! ```rust
//! use crewguard_orchestrator::{Orchestrator, Task, Worker};
//! use crewguard_core::BoxError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let orchestrator = Orchestrator::builder()
//!     .worker(
//!         Worker::builder("indexer").capacity(4),
//!         tower::service_fn(|task: Task<Vec<u8>>| async move {
//!             Ok::<_, BoxError>(task.payload().len())
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let result = orchestrator
//!     .dispatch(Task::new("doc-1", "indexer", b"hello".to_vec()), Duration::from_secs(5))
//!     .await;
//! assert_eq!(result.value, Some(5));
//!
//! let status = orchestrator.status_snapshot();
//! assert_eq!(status.executed, 1);
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `tracing`: log dispatch, timeouts, expiry and shutdown
//! - `metrics`: `worker_tasks_total{worker,outcome}`,
//!   `worker_task_duration_seconds{worker}`, `worker_in_flight{worker}` and
//!   `worker_queue_depth{worker}`
//! - `serde`: serialize results, reports and configuration

mod config;
mod events;
mod injector;
mod orchestrator;
mod result;
mod status;
mod task;
mod worker;

pub use config::{OrchestratorConfig, WorkerConfig};
pub use events::TaskEvent;
pub use injector::{FailureInjector, FailureInjectorBuilder, FailureInjectorLayer, InjectedFailure};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, ShutdownReport};
pub use result::{TaskError, TaskResult};
pub use status::{AggregateStatus, WorkerReport, WorkerStatus};
pub use task::{Priority, Task};
pub use worker::{Completion, SubmitStatus, Submission, Worker, WorkerBuilder, WorkerShutdown};
