use super::helpers::*;
use crewguard_orchestrator::{Orchestrator, SubmitStatus, Task, TaskError, Worker, WorkerStatus};
use std::time::Duration;
use tower::service_fn;

fn crew() -> Orchestrator<Duration, String> {
    Orchestrator::builder()
        .worker(Worker::builder("frontend").capacity(1), service_fn(sleeper))
        .worker(Worker::builder("backend").capacity(1), service_fn(sleeper))
        .shutdown_grace(Duration::from_secs(10))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn idle_crew_drains_immediately() {
    let orchestrator = crew();
    let report = orchestrator.shutdown().await;

    assert!(report.drained());
    assert_eq!(report.workers.len(), 2);
    assert_eq!(report.workers[0].worker_id, "backend");
    assert_eq!(orchestrator.status_snapshot().offline_count, 2);
}

#[tokio::test(start_paused = true)]
async fn grace_period_lets_queued_work_finish() {
    let orchestrator = crew();
    let backend = orchestrator.worker("backend").unwrap();
    let first = backend.submit(Task::new("a", "backend", Duration::from_secs(2)));
    let second = backend.submit(Task::new("b", "backend", Duration::from_secs(2)));
    assert_eq!(second.status(), SubmitStatus::Queued);

    let report = orchestrator.shutdown().await;
    assert!(report.drained());
    assert!(first.await.success);
    assert!(second.await.success);
    assert_eq!(backend.report().executed, 2);
}

#[tokio::test(start_paused = true)]
async fn work_left_at_the_deadline_is_discarded() {
    let orchestrator = crew();
    let frontend = orchestrator.worker("frontend").unwrap();
    let running = frontend.submit(Task::new("render", "frontend", Duration::from_secs(5)));
    let waiting = frontend.submit(Task::new("polish", "frontend", Duration::from_secs(5)));

    let report = orchestrator.shutdown_with_grace(Duration::from_secs(1)).await;
    assert!(!report.drained());

    let frontend_report = report
        .workers
        .iter()
        .find(|w| w.worker_id == "frontend")
        .unwrap();
    assert_eq!(frontend_report.discarded, 1);
    assert_eq!(frontend_report.abandoned, 1);

    assert_eq!(waiting.await.error, Some(TaskError::Discarded));
    // Running tasks are never interrupted.
    assert!(running.await.success);
    assert_eq!(frontend.report().discarded, 1);
    assert_eq!(frontend.status(), WorkerStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn batches_after_shutdown_are_rejected() {
    let orchestrator = crew();
    orchestrator.shutdown().await;
    assert!(!orchestrator.is_accepting());

    let result = orchestrator
        .dispatch(Task::new("late", "backend", Duration::ZERO), Duration::from_secs(1))
        .await;
    assert!(matches!(result.error, Some(TaskError::Rejected(_))));
    assert_eq!(result.worker_id, None);

    let direct = orchestrator
        .worker("backend")
        .unwrap()
        .submit(Task::new("sneaky", "backend", Duration::ZERO));
    assert_eq!(direct.status(), SubmitStatus::Rejected);
}
