use super::helpers::*;
use crewguard_orchestrator::{Orchestrator, Task, TaskError, TaskEvent, Worker};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::service_fn;

fn crew(capacity: usize) -> Orchestrator<Duration, String> {
    Orchestrator::builder()
        .worker(Worker::builder("frontend").capacity(capacity), service_fn(sleeper))
        .worker(Worker::builder("backend").capacity(capacity), service_fn(sleeper))
        .worker(Worker::builder("qa").capacity(capacity), service_fn(sleeper))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn three_slow_tasks_on_one_slot_all_time_out_in_order() {
    let orchestrator: Orchestrator<Duration, String> = Orchestrator::builder()
        .worker(Worker::builder("solo").capacity(1), service_fn(sleeper))
        .build()
        .unwrap();

    let tasks = ["a", "b", "c"]
        .into_iter()
        .map(|id| Task::new(id, "solo", Duration::from_secs(10)));
    let results = orchestrator.dispatch_batch(tasks, Duration::from_secs(1)).await;

    assert_eq!(results.len(), 3);
    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.error, Some(TaskError::Timeout));
        assert_eq!(result.error.as_ref().unwrap().to_string(), "timeout");
    }

    let status = orchestrator.status_snapshot();
    assert_eq!(status.timed_out, 3);
    assert_eq!(status.total_in_flight, 1);
    assert_eq!(status.queued_total, 0);
}

#[tokio::test(start_paused = true)]
async fn batch_spreads_across_workers_concurrently() {
    let orchestrator = crew(1);
    let start = tokio::time::Instant::now();

    let results = orchestrator
        .dispatch_batch(
            vec![
                Task::new("ui", "frontend", Duration::from_secs(2)),
                Task::new("api", "backend", Duration::from_secs(2)),
                Task::new("e2e", "qa", Duration::from_secs(2)),
            ],
            Duration::from_secs(30),
        )
        .await;

    assert!(results.iter().all(|r| r.success));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
    assert_eq!(results[1].value.as_deref(), Some("api done"));
    assert_eq!(results[2].worker_id.as_deref(), Some("qa"));
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_fail_the_batch() {
    let orchestrator: Orchestrator<bool, ()> = Orchestrator::builder()
        .worker(
            Worker::builder("w"),
            service_fn(|task: Task<bool>| async move {
                if *task.payload() {
                    Ok(())
                } else {
                    Err(std::io::Error::other("model refused"))
                }
            }),
        )
        .build()
        .unwrap();

    let results = orchestrator
        .dispatch_batch(
            vec![
                Task::new("ok-1", "w", true),
                Task::new("bad", "w", false),
                Task::new("ok-2", "w", true),
                Task::new("lost", "mobile", true),
            ],
            Duration::from_secs(5),
        )
        .await;

    assert!(results[0].success);
    assert_eq!(results[1].error, Some(TaskError::Execution("model refused".to_string())));
    assert!(results[2].success);
    assert_eq!(
        results[3].error.as_ref().unwrap().to_string(),
        "no worker for routing key 'mobile'"
    );

    let status = orchestrator.status_snapshot();
    assert_eq!(status.executed, 3);
    assert_eq!(status.failed, 1);
    assert_eq!(status.routing_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_reach_batch_listeners() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&events);
    let orchestrator: Orchestrator<Duration, String> = Orchestrator::builder()
        .worker(Worker::builder("w").capacity(1), service_fn(sleeper))
        .on_event(move |event: &TaskEvent| {
            e.lock()
                .unwrap()
                .push(format!("{}:{}", event.task_id(), crewguard_core::CrewEvent::event_type(event)))
        })
        .build()
        .unwrap();

    orchestrator
        .dispatch_batch(
            vec![
                Task::new("t1", "w", Duration::from_millis(10)),
                Task::new("t2", "w", Duration::from_millis(10)),
            ],
            Duration::from_secs(1),
        )
        .await;

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "t1:task_dispatched",
            "t2:task_dispatched",
            "t1:task_started",
            "t1:task_completed",
            "t2:task_started",
            "t2:task_completed",
        ]
    );
}

#[tokio::test]
async fn out_of_order_completion_keeps_input_order() {
    let gates = Gates::default();
    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("w").capacity(2), service_fn(gated))
        .build()
        .unwrap();

    let tasks = vec![gates.task("first", "w"), gates.task("second", "w")];
    let (results, ()) = tokio::join!(
        orchestrator.dispatch_batch(tasks, Duration::from_secs(5)),
        async {
            gates.release("second");
            tokio::task::yield_now().await;
            gates.release("first");
        }
    );

    assert_eq!(results[0].value.as_deref(), Some("first"));
    assert_eq!(results[1].value.as_deref(), Some("second"));
}
