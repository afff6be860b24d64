//! Worker and fault injector metrics regression tests

use super::helpers::*;
use crewguard_core::BoxError;
use crewguard_orchestrator::{FailureInjectorLayer, Orchestrator, Task, Worker};
use serial_test::serial;
use std::time::Duration;
use tower::{ServiceBuilder, service_fn};

#[tokio::test]
#[serial]
async fn worker_metrics_exist() {
    init_recorder();

    let orchestrator = Orchestrator::builder()
        .worker(
            Worker::builder("metrics_worker").capacity(1),
            service_fn(|task: Task<bool>| async move {
                if task.into_payload() {
                    Ok(())
                } else {
                    Err(BoxError::from("refused"))
                }
            }),
        )
        .build()
        .unwrap();

    orchestrator
        .dispatch_batch(
            vec![
                Task::new("ok", "metrics_worker", true),
                Task::new("bad", "metrics_worker", false),
            ],
            Duration::from_secs(5),
        )
        .await;

    assert_counter_exists("worker_tasks_total");
    assert_metric_has_label("worker_tasks_total", "worker", "metrics_worker");
    assert_metric_has_label("worker_tasks_total", "outcome", "success");
    assert_metric_has_label("worker_tasks_total", "outcome", "failure");

    assert_histogram_exists("worker_task_duration_seconds");
    assert_gauge_exists("worker_in_flight");
    assert_gauge_exists("worker_queue_depth");
    assert_metric_has_label("worker_queue_depth", "worker", "metrics_worker");
}

#[tokio::test]
#[serial]
async fn injector_metrics_exist() {
    init_recorder();

    let executor = ServiceBuilder::new()
        .layer(
            FailureInjectorLayer::<()>::builder()
                .name("metrics_injector")
                .failure_rate(1.0)
                .build()
                .unwrap(),
        )
        .service(service_fn(|_task: Task<()>| async { Ok::<_, BoxError>(()) }));

    let worker = Worker::builder("injected").build(executor).unwrap();
    let result = worker.submit(Task::new("t", "injected", ())).await;
    assert!(!result.success);

    assert_counter_exists("injected_failures_total");
    assert_metric_has_label("injected_failures_total", "injector", "metrics_injector");
}
