//! Dispatches a batch across two workers, one of them behind a circuit
//! breaker and retry policy, and prints the outcome.
//!
//! Run with: cargo run --example crew_batch
//! With logs: RUST_LOG=debug cargo run --example crew_batch

use crewguard::ResilienceManager;
use crewguard::circuitbreaker::CircuitBreakerConfig;
use crewguard::orchestrator::{FailureInjectorLayer, Orchestrator, Task, Worker};
use crewguard::retry::{RetryConfig, RetryStrategy};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let manager = Arc::new(ResilienceManager::new());
    manager.get_or_create_circuit_breaker(
        "llm",
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(5),
            ..Default::default()
        },
    )?;
    manager.get_or_create_retry_policy(
        "llm",
        RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(50),
            strategy: RetryStrategy::Exponential,
            ..Default::default()
        },
    )?;

    // Every fourth task hits a simulated model outage.
    let outage = FailureInjectorLayer::<u32>::builder()
        .name("llm-outage")
        .fail_when(|task: &Task<u32>| task.payload() % 4 == 2)
        .build()?;

    let writer = ServiceBuilder::new()
        .layer(manager.layer("llm")?)
        .layer(outage)
        .service_fn(|task: Task<u32>| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::io::Error>(format!("draft #{}", task.payload()))
        });
    let reviewer = tower::service_fn(|task: Task<u32>| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, std::io::Error>(format!("review #{}", task.payload()))
    });

    let orchestrator = Orchestrator::builder()
        .worker(Worker::builder("writer").capacity(2), writer)
        .worker(Worker::builder("reviewer").capacity(4), reviewer)
        .error_reporter(Arc::clone(&manager))
        .build()?;

    let tasks = (0..8u32).map(|i| {
        let key = if i % 2 == 0 { "writer" } else { "reviewer" };
        Task::new(format!("task-{i}"), key, i)
    });
    let results = orchestrator
        .dispatch_batch(tasks, Duration::from_secs(10))
        .await;

    for result in &results {
        match (&result.value, &result.error) {
            (Some(value), _) => println!("{} -> {}", result.task_id, value),
            (None, Some(error)) => println!("{} failed: {}", result.task_id, error),
            (None, None) => println!("{} produced nothing", result.task_id),
        }
    }

    let status = orchestrator.status_snapshot();
    println!(
        "executed {} / succeeded {} / failed {}",
        status.executed, status.succeeded, status.failed
    );
    for report in orchestrator.worker_reports() {
        println!(
            "{}: {} ({:.0}% success, avg {:?})",
            report.id, report.status, report.success_rate, report.average_duration
        );
    }

    let stats = manager.error_statistics();
    println!("errors recorded: {}", stats.total_errors);

    let shutdown = orchestrator.shutdown().await;
    println!("shut down, drained: {}", shutdown.drained());
    Ok(())
}
