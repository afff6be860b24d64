use super::helpers::*;
use crewguard_orchestrator::{
    Orchestrator, SubmitStatus, Task, TaskError, Worker, WorkerStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::service_fn;

#[tokio::test]
async fn third_task_waits_for_a_free_slot() {
    let gates = Gates::default();
    let worker = Worker::builder("backend")
        .capacity(2)
        .build(service_fn(gated))
        .unwrap();

    let t1 = worker.submit(gates.task("t1", "backend"));
    let t2 = worker.submit(gates.task("t2", "backend"));
    let t3 = worker.submit(gates.task("t3", "backend"));

    assert_eq!(t1.status(), SubmitStatus::Accepted);
    assert_eq!(t2.status(), SubmitStatus::Accepted);
    assert_eq!(t3.status(), SubmitStatus::Queued);
    assert_eq!(worker.report().queued, 1);

    gates.release("t1");
    assert!(t1.await.success);

    // t3 took the freed slot.
    assert!(worker.is_running("t3"));
    assert!(worker.is_running("t2"));
    assert_eq!(worker.in_flight(), 2);
    assert_eq!(worker.queued(), 0);

    gates.release("t2");
    gates.release("t3");
    assert_eq!(t2.await.value.as_deref(), Some("t2"));
    assert_eq!(t3.await.value.as_deref(), Some("t3"));
    assert_eq!(worker.status(), WorkerStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_capacity() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

    let orchestrator: Orchestrator<u64, ()> = Orchestrator::builder()
        .worker(
            Worker::builder("w").capacity(3),
            service_fn(move |task: Task<u64>| {
                let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(*task.payload())).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(())
                }
            }),
        )
        .build()
        .unwrap();

    let tasks = (0..20u64).map(|i| Task::new(format!("t{i}"), "w", 10 + (i % 7) * 5));
    let results = orchestrator.dispatch_batch(tasks, Duration::from_secs(60)).await;

    assert!(results.iter().all(|r| r.success));
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(orchestrator.status_snapshot().executed, 20);
}

#[tokio::test(start_paused = true)]
async fn queued_tasks_past_their_wait_limit_expire() {
    let orchestrator: Orchestrator<Duration, String> = Orchestrator::builder()
        .worker(
            Worker::builder("w")
                .capacity(1)
                .max_queue_wait(Duration::from_secs(2)),
            service_fn(sleeper),
        )
        .build()
        .unwrap();

    let results = orchestrator
        .dispatch_batch(
            vec![
                Task::new("long", "w", Duration::from_secs(5)),
                Task::new("stale", "w", Duration::from_millis(1)),
            ],
            Duration::from_secs(30),
        )
        .await;

    assert!(results[0].success);
    match &results[1].error {
        Some(TaskError::Expired { waited }) => assert!(*waited >= Duration::from_secs(5)),
        other => panic!("expected expiry, got {other:?}"),
    }

    let status = orchestrator.status_snapshot();
    assert_eq!(status.expired, 1);
    assert_eq!(status.executed, 1);
}

#[tokio::test(start_paused = true)]
async fn queue_is_fifo() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let o = Arc::clone(&order);
    let worker = Worker::builder("w")
        .capacity(1)
        .build(service_fn(move |task: Task<()>| {
            o.lock().unwrap().push(task.id().to_string());
            async { Ok::<_, std::io::Error>(()) }
        }))
        .unwrap();

    let submissions: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|id| worker.submit(Task::new(id, "w", ())))
        .collect();
    for submission in submissions {
        assert!(submission.await.success);
    }

    assert_eq!(*order.lock().unwrap(), ["a", "b", "c", "d"]);
}
