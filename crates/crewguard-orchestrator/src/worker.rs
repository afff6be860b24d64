//! Bounded-concurrency worker with an overflow queue.

use crate::config::WorkerConfig;
use crate::events::TaskEvent;
use crate::result::{TaskError, TaskResult};
use crate::status::{WorkerReport, WorkerStatus};
use crate::task::Task;
use crewguard_core::{BoxError, ConfigError, EventListeners};
use crewguard_errors::{ErrorReporter, FailureContext};
use crewguard_healthcheck::HealthCheck;
use futures::FutureExt;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tower::util::BoxCloneService;
use tower::ServiceExt;
use tower_service::Service;

pub(crate) type Executor<P, R> = BoxCloneService<Task<P>, R, BoxError>;

type CompletionSender<R> = oneshot::Sender<TaskResult<R>>;

/// How a worker admitted a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Execution started immediately.
    Accepted,
    /// The worker was at capacity; the task waits in the overflow queue.
    Queued,
    /// The task was refused. Its completion resolves to a `Rejected` result.
    Rejected,
}

/// A submitted task: how it was admitted, and its eventual result.
///
/// Awaiting a `Submission` awaits its [`Completion`].
pub struct Submission<R> {
    status: SubmitStatus,
    completion: Completion<R>,
}

impl<R> Submission<R> {
    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    pub fn into_completion(self) -> Completion<R> {
        self.completion
    }
}

impl<R> IntoFuture for Submission<R> {
    type Output = TaskResult<R>;
    type IntoFuture = Completion<R>;

    fn into_future(self) -> Self::IntoFuture {
        self.completion
    }
}

impl<R> fmt::Debug for Submission<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("status", &self.status)
            .field("task_id", &self.completion.task_id)
            .finish()
    }
}

/// Resolves to the [`TaskResult`] of a submitted task.
///
/// Dropping a `Completion` does not cancel the task.
pub struct Completion<R> {
    rx: oneshot::Receiver<TaskResult<R>>,
    task_id: String,
    worker_id: String,
}

impl<R> Completion<R> {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl<R> Future for Completion<R> {
    type Output = TaskResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        Pin::new(&mut this.rx).poll(cx).map(|received| {
            // The sender only disappears if the runtime dropped the worker task.
            received.unwrap_or_else(|_| {
                TaskResult::failure(
                    this.task_id.clone(),
                    Some(this.worker_id.clone()),
                    TaskError::Discarded,
                    Duration::ZERO,
                )
            })
        })
    }
}

/// Outcome of [`Worker::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerShutdown {
    pub worker_id: String,
    /// True if all work finished within the grace period.
    pub drained: bool,
    /// Queued tasks dropped at the deadline.
    pub discarded: usize,
    /// Tasks still executing at the deadline. They run to completion.
    pub abandoned: usize,
}

/// Executes tasks through a tower service with at most `capacity` running
/// at once.
///
/// Tasks submitted while the worker is at capacity wait in a FIFO overflow
/// queue. Whenever a task completes, the head of the queue is started; a
/// head that waited longer than `max_queue_wait` resolves to
/// [`TaskError::Expired`] instead.
///
/// Every failure is reported to the configured [`ErrorReporter`] before the
/// failed task's slot is released.
///
/// `Worker` is a cheap handle; clones share the same state.
///
/// # Examples
///
/// ```
/// use crewguard_orchestrator::{SubmitStatus, Task, Worker};
/// use crewguard_core::BoxError;
///
/// # async fn example() {
/// let worker = Worker::builder("backend")
///     .capacity(2)
///     .build(tower::service_fn(|task: Task<u32>| async move {
///         Ok::<_, BoxError>(task.into_payload() * 2)
///     }))
///     .unwrap();
///
/// let submission = worker.submit(Task::new("t-1", "backend", 21));
/// assert_eq!(submission.status(), SubmitStatus::Accepted);
///
/// let result = submission.await;
/// assert_eq!(result.value, Some(42));
/// # }
/// ```
pub struct Worker<P, R> {
    shared: Arc<Shared<P, R>>,
}

impl<P, R> Clone for Worker<P, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<P, R> {
    id: String,
    name: String,
    config: WorkerConfig,
    executor: Mutex<Executor<P, R>>,
    state: Mutex<State<P, R>>,
    idle: Notify,
    reporter: Option<Arc<dyn ErrorReporter>>,
    event_listeners: EventListeners<TaskEvent>,
}

struct State<P, R> {
    in_flight: HashSet<String>,
    queue: VecDeque<Queued<P, R>>,
    stats: Stats,
    draining: bool,
    offline: bool,
    error: Option<String>,
}

struct Queued<P, R> {
    task: Task<P>,
    queued_at: Instant,
    completion: CompletionSender<R>,
}

#[derive(Debug, Default)]
struct Stats {
    executed: u64,
    succeeded: u64,
    failed: u64,
    expired: u64,
    cancelled: u64,
    discarded: u64,
    mean_secs: f64,
}

impl Stats {
    fn record(&mut self, success: bool, duration: Duration) {
        self.executed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        // Incremental mean: stable without keeping a running sum.
        self.mean_secs += (duration.as_secs_f64() - self.mean_secs) / self.executed as f64;
    }
}

enum Admission<P, R> {
    Start(Task<P>, CompletionSender<R>),
    Queued(usize),
    Rejected(&'static str, CompletionSender<R>),
}

type Promotions<P, R> = (Vec<(Task<P>, CompletionSender<R>)>, Vec<(Queued<P, R>, Duration)>);

impl<P, R> Worker<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Starts building a worker with the given id.
    pub fn builder(id: impl Into<String>) -> WorkerBuilder<P, R> {
        WorkerBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Display name; defaults to the id.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.shared.config
    }

    /// Submits a task.
    ///
    /// Starts it immediately if a slot is free, otherwise appends it to the
    /// overflow queue. Tasks are rejected once the worker is shutting down,
    /// and when a task with the same id is already pending on this worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn submit(&self, task: Task<P>) -> Submission<R> {
        let (tx, rx) = oneshot::channel();
        let task_id = task.id().to_string();
        let completion = Completion {
            rx,
            task_id: task_id.clone(),
            worker_id: self.shared.id.clone(),
        };

        let admission = {
            let mut state = self.shared.lock_state();
            if state.offline || state.draining {
                Admission::Rejected("worker is offline", tx)
            } else if state.in_flight.contains(&task_id)
                || state.queue.iter().any(|q| q.task.id() == task_id)
            {
                Admission::Rejected("a task with this id is already pending", tx)
            } else if state.in_flight.len() < self.shared.config.capacity {
                state.in_flight.insert(task_id.clone());
                self.shared.record_gauges(&state);
                Admission::Start(task, tx)
            } else {
                state.queue.push_back(Queued {
                    task,
                    queued_at: Instant::now(),
                    completion: tx,
                });
                self.shared.record_gauges(&state);
                Admission::Queued(state.queue.len())
            }
        };

        let status = match admission {
            Admission::Start(task, tx) => {
                self.shared.dispatched(&task_id, false);
                tokio::spawn(Arc::clone(&self.shared).execute(task, tx));
                SubmitStatus::Accepted
            }
            Admission::Queued(_depth) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(worker = %self.shared.id, task = %task_id, depth = _depth, "worker at capacity, task queued");

                self.shared.dispatched(&task_id, true);
                SubmitStatus::Queued
            }
            Admission::Rejected(reason, tx) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(worker = %self.shared.id, task = %task_id, reason, "task rejected");

                #[cfg(feature = "metrics")]
                counter!("worker_tasks_total", "worker" => self.shared.id.clone(), "outcome" => "rejected").increment(1);

                self.shared.emit(TaskEvent::TaskRejected {
                    worker: self.shared.id.clone(),
                    timestamp: std::time::Instant::now(),
                    task_id: task_id.clone(),
                    reason: reason.to_string(),
                });
                let _ = tx.send(TaskResult::failure(
                    task_id,
                    Some(self.shared.id.clone()),
                    TaskError::Rejected(reason.to_string()),
                    Duration::ZERO,
                ));
                SubmitStatus::Rejected
            }
        };

        Submission { status, completion }
    }

    /// Withdraws a task that is still waiting in the overflow queue.
    ///
    /// Its completion resolves to [`TaskError::Cancelled`]. Returns false if
    /// the task is not queued on this worker; running tasks are never
    /// interrupted.
    pub fn cancel_queued(&self, task_id: &str) -> bool {
        let withdrawn = {
            let mut state = self.shared.lock_state();
            let position = state.queue.iter().position(|q| q.task.id() == task_id);
            let withdrawn = position.and_then(|i| state.queue.remove(i));
            if withdrawn.is_some() {
                state.stats.cancelled += 1;
                self.shared.record_gauges(&state);
            }
            withdrawn
        };

        match withdrawn {
            Some(queued) => {
                let waited = queued.queued_at.elapsed();
                let _ = queued.completion.send(TaskResult::failure(
                    task_id,
                    Some(self.shared.id.clone()),
                    TaskError::Cancelled,
                    waited,
                ));
                true
            }
            None => false,
        }
    }

    /// Sets the error flag. The worker reports [`WorkerStatus::Error`] until
    /// [`clear_error`](Self::clear_error) is called, but keeps executing.
    pub fn mark_error(&self, reason: impl Into<String>) {
        let reason = reason.into();

        #[cfg(feature = "tracing")]
        tracing::warn!(worker = %self.shared.id, reason = %reason, "worker marked as errored");

        self.shared.lock_state().error = Some(reason);
    }

    /// Clears the error flag.
    pub fn clear_error(&self) {
        let _previous = self.shared.lock_state().error.take();

        #[cfg(feature = "tracing")]
        if _previous.is_some() {
            tracing::info!(worker = %self.shared.id, "worker error cleared");
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.shared.lock_state().status()
    }

    /// Number of tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.shared.lock_state().in_flight.len()
    }

    /// Number of tasks waiting in the overflow queue.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    /// Returns true if `task_id` is executing on this worker.
    pub fn is_running(&self, task_id: &str) -> bool {
        self.shared.lock_state().in_flight.contains(task_id)
    }

    /// Takes a consistent snapshot of this worker.
    pub fn report(&self) -> WorkerReport {
        let state = self.shared.lock_state();
        let stats = &state.stats;
        WorkerReport {
            id: self.shared.id.clone(),
            name: self.shared.name.clone(),
            status: state.status(),
            capacity: self.shared.config.capacity,
            in_flight: state.in_flight.len(),
            queued: state.queue.len(),
            executed: stats.executed,
            succeeded: stats.succeeded,
            failed: stats.failed,
            expired: stats.expired,
            cancelled: stats.cancelled,
            discarded: stats.discarded,
            success_rate: if stats.executed == 0 {
                0.0
            } else {
                stats.succeeded as f64 / stats.executed as f64 * 100.0
            },
            average_duration: Duration::try_from_secs_f64(stats.mean_secs).unwrap_or_default(),
            error: state.error.clone(),
        }
    }

    /// A health check named `worker:<id>` that is healthy while the worker
    /// is neither offline nor flagged with an error.
    pub fn health_check(&self) -> HealthCheck {
        let shared = Arc::downgrade(&self.shared);
        HealthCheck::new(format!("worker:{}", self.shared.id), move || {
            let healthy = shared.upgrade().is_some_and(|shared| {
                let state = shared.lock_state();
                !state.offline && state.error.is_none()
            });
            futures::future::ready(healthy)
        })
    }

    /// Stops accepting tasks and lets queued and running work finish for up
    /// to `grace`. Whatever is still queued at the deadline resolves to
    /// [`TaskError::Discarded`]. The worker then goes offline.
    pub async fn shutdown(&self, grace: Duration) -> WorkerShutdown {
        self.shared.lock_state().draining = true;

        #[cfg(feature = "tracing")]
        tracing::info!(worker = %self.shared.id, grace_ms = grace.as_millis() as u64, "worker shutting down");

        let drained = self.shared.wait_idle(Instant::now() + grace).await;

        let (discarded, abandoned) = {
            let mut state = self.shared.lock_state();
            state.offline = true;
            let discarded: Vec<Queued<P, R>> = state.queue.drain(..).collect();
            state.stats.discarded += discarded.len() as u64;
            self.shared.record_gauges(&state);
            (discarded, state.in_flight.len())
        };

        let discarded_count = discarded.len();
        for queued in discarded {
            let waited = queued.queued_at.elapsed();
            let _ = queued.completion.send(TaskResult::failure(
                queued.task.id(),
                Some(self.shared.id.clone()),
                TaskError::Discarded,
                waited,
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            worker = %self.shared.id,
            drained,
            discarded = discarded_count,
            abandoned,
            "worker offline"
        );

        WorkerShutdown {
            worker_id: self.shared.id.clone(),
            drained,
            discarded: discarded_count,
            abandoned,
        }
    }
}

impl<P, R> fmt::Debug for Worker<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.shared.id)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<P, R> State<P, R> {
    fn status(&self) -> WorkerStatus {
        if self.offline {
            WorkerStatus::Offline
        } else if self.error.is_some() {
            WorkerStatus::Error
        } else if self.in_flight.is_empty() {
            WorkerStatus::Idle
        } else {
            WorkerStatus::Busy
        }
    }
}

impl<P, R> Shared<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<P, R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(self: Arc<Self>, task: Task<P>, completion: CompletionSender<R>) {
        let task_id = task.id().to_string();
        let started = Instant::now();

        self.emit(TaskEvent::TaskStarted {
            worker: self.id.clone(),
            timestamp: std::time::Instant::now(),
            task_id: task_id.clone(),
        });

        let executor = self
            .executor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let outcome = AssertUnwindSafe(executor.oneshot(task)).catch_unwind().await;
        let duration = started.elapsed();

        let result = match outcome {
            Ok(Ok(value)) => TaskResult::success(task_id.clone(), self.id.clone(), value, duration),
            Ok(Err(error)) => {
                self.report_failure(&task_id, &*error).await;
                TaskResult::failure(
                    task_id.clone(),
                    Some(self.id.clone()),
                    TaskError::execution(error.to_string()),
                    duration,
                )
            }
            Err(_) => {
                let error = TaskError::execution("executor panicked");
                self.report_failure(&task_id, &error).await;
                TaskResult::failure(task_id.clone(), Some(self.id.clone()), error, duration)
            }
        };

        self.complete(&task_id, result, completion);
    }

    async fn report_failure(&self, task_id: &str, error: &(dyn Error + Send + Sync + 'static)) {
        #[cfg(feature = "tracing")]
        tracing::error!(worker = %self.id, task = %task_id, error = %error, "task failed");

        if let Some(reporter) = &self.reporter {
            let context = FailureContext::new("worker")
                .worker(self.id.clone())
                .with("task_id", task_id);
            let reported = AssertUnwindSafe(async { reporter.report(error, context).await })
                .catch_unwind()
                .await;
            if reported.is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!(worker = %self.id, task = %task_id, "error reporter panicked");
            }
        }
    }

    fn complete(self: &Arc<Self>, task_id: &str, result: TaskResult<R>, completion: CompletionSender<R>) {
        let success = result.success;
        let duration = result.duration;

        let (promoted, expired) = {
            let mut state = self.lock_state();
            state.in_flight.remove(task_id);
            state.stats.record(success, duration);
            let promotions = self.promote(&mut state);
            if state.in_flight.is_empty() && state.queue.is_empty() {
                self.idle.notify_waiters();
            }
            self.record_gauges(&state);
            promotions
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            worker = %self.id,
            task = %task_id,
            success,
            duration_ms = duration.as_millis() as u64,
            "task completed"
        );

        #[cfg(feature = "metrics")]
        {
            let outcome = if success { "success" } else { "failure" };
            counter!("worker_tasks_total", "worker" => self.id.clone(), "outcome" => outcome).increment(1);
            histogram!("worker_task_duration_seconds", "worker" => self.id.clone())
                .record(duration.as_secs_f64());
        }

        self.emit(TaskEvent::TaskCompleted {
            worker: self.id.clone(),
            timestamp: std::time::Instant::now(),
            task_id: task_id.to_string(),
            success,
            duration,
        });
        let _ = completion.send(result);

        for (queued, waited) in expired {
            self.expire(queued, waited);
        }
        for (task, tx) in promoted {
            tokio::spawn(Arc::clone(self).execute(task, tx));
        }
    }

    /// Moves queue heads into free slots, dropping heads that waited too
    /// long. Must be called with the state lock held.
    fn promote(&self, state: &mut State<P, R>) -> Promotions<P, R> {
        let mut promoted = Vec::new();
        let mut expired = Vec::new();
        let now = Instant::now();

        while !state.offline && state.in_flight.len() < self.config.capacity {
            let Some(next) = state.queue.pop_front() else {
                break;
            };
            let waited = now.saturating_duration_since(next.queued_at);
            if waited > self.config.max_queue_wait {
                state.stats.expired += 1;
                expired.push((next, waited));
                continue;
            }
            state.in_flight.insert(next.task.id().to_string());
            promoted.push((next.task, next.completion));
        }

        (promoted, expired)
    }

    fn expire(&self, queued: Queued<P, R>, waited: Duration) {
        let task_id = queued.task.id().to_string();

        #[cfg(feature = "tracing")]
        tracing::warn!(worker = %self.id, task = %task_id, waited_ms = waited.as_millis() as u64, "queued task expired");

        #[cfg(feature = "metrics")]
        counter!("worker_tasks_total", "worker" => self.id.clone(), "outcome" => "expired").increment(1);

        self.emit(TaskEvent::TaskExpired {
            worker: self.id.clone(),
            timestamp: std::time::Instant::now(),
            task_id: task_id.clone(),
            waited,
        });
        let _ = queued.completion.send(TaskResult::failure(
            task_id,
            Some(self.id.clone()),
            TaskError::Expired { waited },
            waited,
        ));
    }

    /// Waits until nothing is running or queued, or `deadline` passes.
    async fn wait_idle(&self, deadline: Instant) -> bool {
        loop {
            let notified = self.idle.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.lock_state();
                if state.in_flight.is_empty() && state.queue.is_empty() {
                    return true;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    fn dispatched(&self, task_id: &str, queued: bool) {
        self.emit(TaskEvent::TaskDispatched {
            worker: self.id.clone(),
            timestamp: std::time::Instant::now(),
            task_id: task_id.to_string(),
            queued,
        });
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn record_gauges(&self, state: &State<P, R>) {
        #[cfg(feature = "metrics")]
        {
            gauge!("worker_in_flight", "worker" => self.id.clone()).set(state.in_flight.len() as f64);
            gauge!("worker_queue_depth", "worker" => self.id.clone()).set(state.queue.len() as f64);
        }
    }

    fn emit(&self, event: TaskEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}

/// Builder for [`Worker`].
pub struct WorkerBuilder<P, R> {
    id: String,
    name: Option<String>,
    config: WorkerConfig,
    pub(crate) reporter: Option<Arc<dyn ErrorReporter>>,
    pub(crate) event_listeners: EventListeners<TaskEvent>,
    _types: PhantomData<fn(Task<P>) -> R>,
}

impl<P, R> WorkerBuilder<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            config: WorkerConfig::default(),
            reporter: None,
            event_listeners: EventListeners::new(),
            _types: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Sets a display name.
    ///
    /// Default: the worker id
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of concurrently executing tasks.
    ///
    /// Default: 3
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Sets how long a task may wait in the overflow queue.
    ///
    /// Default: 300 seconds
    pub fn max_queue_wait(mut self, wait: Duration) -> Self {
        self.config.max_queue_wait = wait;
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

    /// Registers a callback for completed tasks.
    ///
    /// The callback receives the task id, whether it succeeded, and how long
    /// it ran.
    pub fn on_task_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &TaskEvent| {
            if let TaskEvent::TaskCompleted {
                task_id,
                success,
                duration,
                ..
            } = event
            {
                f(task_id, *success, *duration);
            }
        });
        self
    }

    /// Registers a listener for every task event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds a worker executing tasks through `executor`.
    ///
    /// Each task is run on a clone of the executor, driven to readiness
    /// first.
    pub fn build<S>(self, executor: S) -> Result<Worker<P, R>, ConfigError>
    where
        S: Service<Task<P>, Response = R> + Clone + Send + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        self.build_boxed(BoxCloneService::new(
            executor.map_err(|e: S::Error| -> BoxError { e.into() }),
        ))
    }

    pub(crate) fn build_boxed(self, executor: Executor<P, R>) -> Result<Worker<P, R>, ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::invalid("id", "must not be empty"));
        }
        self.config.validate()?;

        Ok(Worker {
            shared: Arc::new(Shared {
                name: self.name.unwrap_or_else(|| self.id.clone()),
                id: self.id,
                config: self.config,
                executor: Mutex::new(executor),
                state: Mutex::new(State {
                    in_flight: HashSet::new(),
                    queue: VecDeque::new(),
                    stats: Stats::default(),
                    draining: false,
                    offline: false,
                    error: None,
                }),
                idle: Notify::new(),
                reporter: self.reporter,
                event_listeners: self.event_listeners,
            }),
        })
    }
}
