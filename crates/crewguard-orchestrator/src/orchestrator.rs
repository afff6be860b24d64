//! Fan-out/fan-in dispatch across a fixed set of workers.

use crate::config::OrchestratorConfig;
use crate::events::TaskEvent;
use crate::result::{TaskError, TaskResult};
use crate::status::{AggregateStatus, WorkerReport};
use crate::task::Task;
use crate::worker::{Executor, Worker, WorkerBuilder, WorkerShutdown};
use crewguard_core::{BoxError, ConfigError, EventListeners};
use crewguard_errors::ErrorReporter;
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::util::BoxCloneService;
use tower::ServiceExt;
use tower_service::Service;

const ORCHESTRATOR: &str = "orchestrator";

/// Routes tasks to workers by routing key and collects their results.
///
/// The routing table is fixed at construction: a task goes to the worker
/// whose id equals its routing key, and a key with no worker yields a
/// [`TaskError::Routing`] result.
///
/// # Examples
///
/// ```
/// use crewguard_orchestrator::{Orchestrator, Task, Worker};
/// use crewguard_core::BoxError;
/// use std::time::Duration;
///
/// # async fn example() {
/// let echo = tower::service_fn(|task: Task<String>| async move {
///     Ok::<_, BoxError>(task.into_payload())
/// });
///
/// let orchestrator = Orchestrator::builder()
///     .worker(Worker::builder("frontend").capacity(2), echo)
///     .worker(Worker::builder("backend").capacity(3), echo)
///     .build()
///     .unwrap();
///
/// let results = orchestrator
///     .dispatch_batch(
///         vec![
///             Task::new("t-1", "backend", "schema".to_string()),
///             Task::new("t-2", "frontend", "layout".to_string()),
///             Task::new("t-3", "mobile", "app".to_string()),
///         ],
///         Duration::from_secs(30),
///     )
///     .await;
///
/// assert!(results[0].success);
/// assert!(results[1].success);
/// assert!(!results[2].success);
/// # }
/// ```
pub struct Orchestrator<P, R> {
    workers: HashMap<String, Worker<P, R>>,
    config: OrchestratorConfig,
    accepting: AtomicBool,
    timed_out: AtomicU64,
    routing_errors: AtomicU64,
    event_listeners: EventListeners<TaskEvent>,
}

/// Outcome of [`Orchestrator::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Per-worker outcomes, sorted by worker id.
    pub workers: Vec<WorkerShutdown>,
}

impl ShutdownReport {
    /// True if every worker finished its work within the grace period.
    pub fn drained(&self) -> bool {
        self.workers.iter().all(|w| w.drained)
    }
}

enum Slot<R> {
    Ready(TaskResult<R>),
    Pending {
        worker: String,
        task_id: String,
        completion: crate::worker::Completion<R>,
    },
}

impl<P, R> Orchestrator<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Starts building an orchestrator.
    pub fn builder() -> OrchestratorBuilder<P, R> {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the worker registered under `id`.
    pub fn worker(&self, id: &str) -> Option<&Worker<P, R>> {
        self.workers.get(id)
    }

    /// Returns all workers, sorted by id.
    pub fn workers(&self) -> Vec<&Worker<P, R>> {
        let mut workers: Vec<_> = self.workers.values().collect();
        workers.sort_by(|a, b| a.id().cmp(b.id()));
        workers
    }

    /// Returns false once shutdown has begun.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Dispatches every task to its worker and waits for all of them, or
    /// until `timeout` has elapsed.
    ///
    /// The returned results are in input order, one per task. Tasks that
    /// have not completed by the deadline yield [`TaskError::Timeout`].
    /// Timed-out tasks that are still queued are withdrawn; running ones are
    /// left to finish and their results are dropped.
    pub async fn dispatch_batch<I>(&self, tasks: I, timeout: Duration) -> Vec<TaskResult<R>>
    where
        I: IntoIterator<Item = Task<P>>,
    {
        let started = Instant::now();
        let deadline = started + timeout;

        let slots: Vec<Slot<R>> = tasks.into_iter().map(|task| self.route(task)).collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(tasks = slots.len(), timeout_ms = timeout.as_millis() as u64, "batch dispatched");

        join_all(slots.into_iter().map(|slot| async move {
            match slot {
                Slot::Ready(result) => result,
                Slot::Pending {
                    worker,
                    task_id,
                    completion,
                } => match tokio::time::timeout_at(deadline, completion).await {
                    Ok(result) => result,
                    Err(_) => self.time_out(worker, task_id, started.elapsed()),
                },
            }
        }))
        .await
    }

    /// Dispatches a single task. Equivalent to a one-task batch.
    pub async fn dispatch(&self, task: Task<P>, timeout: Duration) -> TaskResult<R> {
        let task_id = task.id().to_string();
        self.dispatch_batch(std::iter::once(task), timeout)
            .await
            .pop()
            .unwrap_or_else(|| {
                TaskResult::failure(task_id, None, TaskError::Timeout, timeout)
            })
    }

    fn route(&self, task: Task<P>) -> Slot<R> {
        if !self.is_accepting() {
            return Slot::Ready(TaskResult::failure(
                task.id(),
                None,
                TaskError::Rejected("orchestrator is shutting down".to_string()),
                Duration::ZERO,
            ));
        }

        let Some(worker) = self.workers.get(task.routing_key()) else {
            self.routing_errors.fetch_add(1, Ordering::Relaxed);

            #[cfg(feature = "tracing")]
            tracing::warn!(task = %task.id(), routing_key = %task.routing_key(), "no worker for routing key");

            self.emit(TaskEvent::TaskRejected {
                worker: ORCHESTRATOR.to_string(),
                timestamp: std::time::Instant::now(),
                task_id: task.id().to_string(),
                reason: "unknown routing key".to_string(),
            });
            return Slot::Ready(TaskResult::failure(
                task.id(),
                None,
                TaskError::Routing {
                    routing_key: task.routing_key().to_string(),
                },
                Duration::ZERO,
            ));
        };

        let task_id = task.id().to_string();
        let completion = worker.submit(task).into_completion();
        Slot::Pending {
            worker: worker.id().to_string(),
            task_id,
            completion,
        }
    }

    fn time_out(&self, worker: String, task_id: String, waited: Duration) -> TaskResult<R> {
        if let Some(w) = self.workers.get(&worker) {
            w.cancel_queued(&task_id);
        }
        self.timed_out.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::warn!(worker = %worker, task = %task_id, "task missed the batch deadline");

        self.emit(TaskEvent::TaskTimedOut {
            worker: worker.clone(),
            timestamp: std::time::Instant::now(),
            task_id: task_id.clone(),
        });
        TaskResult::failure(task_id, Some(worker), TaskError::Timeout, waited)
    }

    /// Aggregates a snapshot of every worker.
    ///
    /// Never waits on running tasks: each worker's lock is held only long
    /// enough to copy its counters.
    pub fn status_snapshot(&self) -> AggregateStatus {
        AggregateStatus::from_reports(
            &self.worker_reports(),
            self.timed_out.load(Ordering::Relaxed),
            self.routing_errors.load(Ordering::Relaxed),
        )
    }

    /// Returns a report for every worker, sorted by id.
    pub fn worker_reports(&self) -> Vec<WorkerReport> {
        self.workers().into_iter().map(Worker::report).collect()
    }

    /// Shuts down with the configured grace period.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown_with_grace(self.config.shutdown_grace).await
    }

    /// Stops accepting batches, waits up to `grace` for running and queued
    /// work, then takes every worker offline.
    pub async fn shutdown_with_grace(&self, grace: Duration) -> ShutdownReport {
        self.accepting.store(false, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(workers = self.workers.len(), grace_ms = grace.as_millis() as u64, "orchestrator shutting down");

        let mut workers = join_all(self.workers.values().map(|w| w.shutdown(grace))).await;
        workers.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        ShutdownReport { workers }
    }

    fn emit(&self, event: TaskEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}

impl<P, R> fmt::Debug for Orchestrator<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.workers.keys().collect();
        ids.sort();
        f.debug_struct("Orchestrator")
            .field("workers", &ids)
            .field("config", &self.config)
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .finish()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder<P, R> {
    config: OrchestratorConfig,
    workers: Vec<(WorkerBuilder<P, R>, Executor<P, R>)>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    event_listeners: EventListeners<TaskEvent>,
}

impl<P, R> OrchestratorBuilder<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            workers: Vec::new(),
            reporter: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Adds a worker executing its tasks through `executor`.
    ///
    /// Workers without their own error reporter use the orchestrator's.
    pub fn worker<S>(mut self, worker: WorkerBuilder<P, R>, executor: S) -> Self
    where
        S: Service<Task<P>, Response = R> + Clone + Send + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        let executor = BoxCloneService::new(executor.map_err(|e: S::Error| -> BoxError { e.into() }));
        self.workers.push((worker, executor));
        self
    }

    /// Sets where execution failures are reported.
    ///
    /// Default: none
    pub fn error_reporter<E>(mut self, reporter: E) -> Self
    where
        E: ErrorReporter + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Sets the grace period used by [`Orchestrator::shutdown`].
    ///
    /// Default: 30 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Registers a callback for completed tasks on any worker.
    ///
    /// The callback receives the worker id, task id and success flag.
    pub fn on_task_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &TaskEvent| {
            if let TaskEvent::TaskCompleted {
                worker,
                task_id,
                success,
                ..
            } = event
            {
                f(worker, task_id, *success);
            }
        });
        self
    }

    /// Registers a listener for every task event, from every worker.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds every worker and the routing table.
    ///
    /// Fails if no worker was added, if two workers share an id, or if any
    /// worker configuration is invalid.
    pub fn build(self) -> Result<Orchestrator<P, R>, ConfigError> {
        if self.workers.is_empty() {
            return Err(ConfigError::invalid("workers", "at least one worker is required"));
        }

        let mut workers = HashMap::with_capacity(self.workers.len());
        for (mut builder, executor) in self.workers {
            if workers.contains_key(builder.id()) {
                return Err(ConfigError::Conflict(format!(
                    "worker id '{}' is registered twice",
                    builder.id()
                )));
            }
            if builder.reporter.is_none() {
                builder.reporter = self.reporter.clone();
            }
            builder.event_listeners.extend(&self.event_listeners);

            let worker = builder.build_boxed(executor)?;
            workers.insert(worker.id().to_string(), worker);
        }

        Ok(Orchestrator {
            workers,
            config: self.config,
            accepting: AtomicBool::new(true),
            timed_out: AtomicU64::new(0),
            routing_errors: AtomicU64::new(0),
            event_listeners: self.event_listeners,
        })
    }
}
