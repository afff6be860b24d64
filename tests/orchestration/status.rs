use super::helpers::*;
use crewguard_orchestrator::{Orchestrator, Task, Worker, WorkerStatus};
use std::time::Duration;
use tower::service_fn;

#[tokio::test]
async fn snapshots_are_idempotent_without_activity() {
    let gates = Gates::default();
    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("frontend").capacity(1), service_fn(gated))
        .worker(Worker::builder("backend").capacity(2), service_fn(gated))
        .build()
        .unwrap();

    let frontend = orchestrator.worker("frontend").unwrap();
    let _running = frontend.submit(gates.task("ui", "frontend"));
    let _waiting = frontend.submit(gates.task("ux", "frontend"));

    let first = orchestrator.status_snapshot();
    let second = orchestrator.status_snapshot();
    assert_eq!(first, second);

    assert_eq!(first.total_workers, 2);
    assert_eq!(first.busy_count, 1);
    assert_eq!(first.idle_count, 1);
    assert_eq!(first.total_in_flight, 1);
    assert_eq!(first.total_capacity, 3);
    assert_eq!(first.queued_total, 1);
    assert!((first.load_ratio - 1.0 / 3.0).abs() < f64::EPSILON);

    gates.release("ui");
    gates.release("ux");
}

#[tokio::test(start_paused = true)]
async fn reports_track_outcomes_per_worker() {
    let orchestrator: Orchestrator<u64, u64> = Orchestrator::builder()
        .worker(
            Worker::builder("math").name("Math Agent"),
            service_fn(|task: Task<u64>| async move {
                let n = task.into_payload();
                tokio::time::sleep(Duration::from_millis(n * 100)).await;
                if n % 2 == 0 {
                    Ok(n / 2)
                } else {
                    Err(std::io::Error::other("odd input"))
                }
            }),
        )
        .worker(
            Worker::builder("idle"),
            service_fn(|task: Task<u64>| async move { Ok::<_, std::io::Error>(task.into_payload()) }),
        )
        .build()
        .unwrap();

    orchestrator
        .dispatch_batch(
            vec![
                Task::new("a", "math", 2),
                Task::new("b", "math", 4),
                Task::new("c", "math", 3),
                Task::new("d", "math", 6),
            ],
            Duration::from_secs(60),
        )
        .await;

    let reports = orchestrator.worker_reports();
    let ids: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["idle", "math"]);

    let math = &reports[1];
    assert_eq!(math.name, "Math Agent");
    assert_eq!(math.status, WorkerStatus::Idle);
    assert_eq!(math.executed, 4);
    assert_eq!(math.succeeded, 3);
    assert_eq!(math.failed, 1);
    assert_eq!(math.success_rate, 75.0);
    assert!(math.average_duration >= Duration::from_millis(375));
    assert!(math.average_duration < Duration::from_millis(380));

    let idle = &reports[0];
    assert_eq!(idle.executed, 0);
    assert_eq!(idle.success_rate, 0.0);
    assert_eq!(idle.average_duration, Duration::ZERO);
}

#[tokio::test]
async fn error_flag_shows_in_the_aggregate() {
    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("a"), service_fn(sleeper))
        .worker(Worker::builder("b"), service_fn(sleeper))
        .build()
        .unwrap();

    orchestrator.worker("b").unwrap().mark_error("rate limited");

    let status = orchestrator.status_snapshot();
    assert_eq!(status.error_count, 1);
    assert_eq!(status.idle_count, 1);

    let reports = orchestrator.worker_reports();
    assert_eq!(reports[1].error.as_deref(), Some("rate limited"));
}
