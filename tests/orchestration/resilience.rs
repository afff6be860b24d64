use crewguard::circuitbreaker::CircuitBreakerConfig;
use crewguard::orchestrator::{FailureInjectorLayer, Orchestrator, Task, TaskError, Worker};
use crewguard::retry::{RetryConfig, RetryStrategy};
use crewguard::{CircuitOpenError, ResilienceManager};
use crewguard_core::Severity;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceBuilder};

fn breaker(threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: threshold,
        recovery_timeout: Duration::from_secs(60),
        success_threshold: 1,
    }
}

#[tokio::test(start_paused = true)]
async fn open_circuit_fails_the_rest_of_the_batch_fast() {
    let manager = Arc::new(ResilienceManager::new());
    manager.get_or_create_circuit_breaker("llm", breaker(2)).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let executor = ServiceBuilder::new()
        .layer(manager.layer("llm").unwrap())
        .service_fn(move |_task: Task<()>| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionRefused)) }
        });

    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("writer").capacity(1), executor)
        .error_reporter(Arc::clone(&manager))
        .build()
        .unwrap();

    let tasks = (1..=4).map(|i| Task::new(format!("t{i}"), "writer", ()));
    let results = orchestrator.dispatch_batch(tasks, Duration::from_secs(30)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        results[0].error,
        Some(TaskError::Execution("connection refused".to_string()))
    );
    for result in &results[2..] {
        assert_eq!(
            result.error.as_ref().unwrap().to_string(),
            "circuit breaker 'llm' is open; call not permitted"
        );
    }
    assert!(manager.circuit_breaker("llm").unwrap().is_open());

    let stats = manager.error_statistics();
    assert_eq!(stats.total_errors, 4);
    let open = stats
        .error_types
        .iter()
        .find(|(label, _)| label.ends_with("CircuitOpenError"))
        .map(|(_, count)| *count);
    assert_eq!(open, Some(2));

    let records = manager.error_log().records();
    assert!(records.iter().all(|r| r.worker_id.as_deref() == Some("writer")));
    assert_eq!(records[3].context["task_id"], "t4");
}

#[tokio::test(start_paused = true)]
async fn retries_hide_transient_failures_from_the_worker() {
    let manager = Arc::new(ResilienceManager::new());
    manager.get_or_create_circuit_breaker("search", breaker(5)).unwrap();
    manager
        .get_or_create_retry_policy(
            "search",
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                strategy: RetryStrategy::Fixed,
                jitter: false,
                ..Default::default()
            },
        )
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let executor = ServiceBuilder::new()
        .layer(manager.layer("search").unwrap())
        .service_fn(move |task: Task<u32>| {
            let attempt = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(io::Error::from(io::ErrorKind::TimedOut))
                } else {
                    Ok(task.into_payload() + 1)
                }
            }
        });

    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("searcher"), executor)
        .error_reporter(Arc::clone(&manager))
        .build()
        .unwrap();

    let result = orchestrator
        .dispatch(Task::new("q", "searcher", 41), Duration::from_secs(30))
        .await;

    assert_eq!(result.value, Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(result.duration >= Duration::from_secs(2));
    assert!(manager.error_log().is_empty());
    assert!(!manager.circuit_breaker("search").unwrap().is_open());
}

#[tokio::test]
async fn injected_failures_are_classified_and_recovered() {
    let manager = Arc::new(ResilienceManager::new());
    let recovered = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&recovered);
    manager.register_recovery::<crewguard::orchestrator::InjectedFailure, _, _, _>(move |_record| {
        r.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, io::Error>(()) }
    });

    let executor = ServiceBuilder::new()
        .layer(
            FailureInjectorLayer::<u32>::builder()
                .name("odd")
                .fail_when(|task: &Task<u32>| *task.payload() % 2 == 1)
                .build()
                .unwrap(),
        )
        .service(service_fn(|task: Task<u32>| async move {
            Ok::<_, io::Error>(task.into_payload())
        }));

    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("w").capacity(2), executor)
        .error_reporter(Arc::clone(&manager))
        .build()
        .unwrap();

    let tasks = (0..6u32).map(|i| Task::new(format!("t{i}"), "w", i));
    let results = orchestrator.dispatch_batch(tasks, Duration::from_secs(5)).await;

    let failed: Vec<_> = results.iter().filter(|r| !r.success).map(|r| r.task_id.as_str()).collect();
    assert_eq!(failed, ["t1", "t3", "t5"]);
    assert_eq!(recovered.load(Ordering::SeqCst), 3);

    let records = manager.error_log().records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.severity == Severity::High));
    assert!(records.iter().all(|r| r.recovery_attempted && r.recovery_successful));
    assert_eq!(manager.error_statistics().recovery_success_rate, 100.0);
}

#[tokio::test]
async fn panicking_recovery_neither_leaks_the_slot_nor_hides_the_error() {
    let manager = Arc::new(ResilienceManager::new());
    manager.register_recovery::<io::Error, _, _, _>(
        |_record| -> futures::future::Ready<Result<(), io::Error>> {
            panic!("recovery strategy bug")
        },
    );

    let worker = Worker::builder("gateway")
        .capacity(1)
        .error_reporter(Arc::clone(&manager))
        .build(service_fn(|_task: Task<()>| async {
            Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionRefused))
        }))
        .unwrap();

    let result = worker.submit(Task::new("t1", "gateway", ())).await;
    assert_eq!(
        result.error,
        Some(TaskError::Execution("connection refused".to_string()))
    );
    assert_eq!(worker.in_flight(), 0);
    assert_eq!(
        worker.status(),
        crewguard::orchestrator::WorkerStatus::Idle
    );

    let records = manager.error_log().records();
    assert_eq!(records.len(), 1);
    assert!(records[0].recovery_attempted);
    assert!(!records[0].recovery_successful);

    let next = worker.submit(Task::new("t2", "gateway", ()));
    assert_eq!(
        next.status(),
        crewguard::orchestrator::SubmitStatus::Accepted
    );
    assert!(!next.await.success);
}

#[tokio::test]
async fn worker_health_feeds_the_monitor() {
    let manager = ResilienceManager::new();
    let orchestrator = Orchestrator::builder()
        .worker(
            Worker::builder("planner"),
            service_fn(|_task: Task<()>| async { Ok::<_, io::Error>(()) }),
        )
        .build()
        .unwrap();

    let planner = orchestrator.worker("planner").unwrap();
    manager.register_health_check(planner.health_check()).unwrap();
    assert!(manager.register_health_check(planner.health_check()).is_err());

    manager.health_monitor().run_once().await;
    assert!(manager.health_monitor().all_healthy());

    planner.mark_error("context window exceeded");
    manager.health_monitor().run_once().await;
    let status = manager.health_monitor().status("worker:planner").unwrap();
    assert!(!status.healthy);

    planner.clear_error();
    manager.health_monitor().run_once().await;
    assert!(manager.health_monitor().all_healthy());
}

#[tokio::test]
async fn open_circuit_error_survives_the_worker_boundary() {
    let manager = ResilienceManager::new();
    let breaker = manager.get_or_create_circuit_breaker("db", breaker(1)).unwrap();
    breaker.force_open();

    let err = manager
        .protected_call("db", || async { Ok::<_, io::Error>(()) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());

    let handled = manager
        .handle_error(
            &CircuitOpenError {
                resource: "db".to_string(),
            },
            crewguard::errors::FailureContext::new("gateway"),
        )
        .await;
    assert_eq!(handled.severity, Severity::High);
    assert!(!handled.recovery_attempted);
}
