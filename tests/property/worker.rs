//! Property tests for workers and batch dispatch.
//!
//! Invariants tested:
//! - In-flight tasks never exceed a worker's capacity
//! - Every task yields exactly one result, in input order
//! - Results are either a value or an error, never both
//! - A generous deadline lets every task succeed and leaves workers idle

use crewguard_orchestrator::{Orchestrator, Task, TaskError, Worker, WorkerStatus};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tower::service_fn;

fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn tracking_orchestrator(
    capacity: usize,
    running: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
) -> Orchestrator<u64, u64> {
    let (running, peak) = (Arc::clone(running), Arc::clone(peak));
    Orchestrator::builder()
        .worker(
            Worker::builder("w").capacity(capacity),
            service_fn(move |task: Task<u64>| {
                let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let millis = task.into_payload();
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(millis)
                }
            }),
        )
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: capacity bounds concurrency and every task completes
    #[test]
    fn capacity_is_never_exceeded(
        capacity in 1usize..=5,
        durations in prop::collection::vec(1u64..=200, 1..=40),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let orchestrator = tracking_orchestrator(capacity, &running, &peak);

            let tasks = durations
                .iter()
                .enumerate()
                .map(|(i, d)| Task::new(format!("t{i}"), "w", *d));
            let results = orchestrator.dispatch_batch(tasks, Duration::from_secs(3600)).await;

            prop_assert_eq!(results.len(), durations.len());
            prop_assert!(peak.load(Ordering::SeqCst) <= capacity);
            prop_assert_eq!(peak.load(Ordering::SeqCst), capacity.min(durations.len()));

            for (i, result) in results.iter().enumerate() {
                prop_assert_eq!(&result.task_id, &format!("t{i}"));
                prop_assert!(result.success);
                prop_assert_eq!(result.value, Some(durations[i]));
            }

            let status = orchestrator.status_snapshot();
            prop_assert_eq!(status.total_in_flight, 0);
            prop_assert_eq!(status.executed, durations.len() as u64);
            prop_assert_eq!(orchestrator.worker("w").unwrap().status(), WorkerStatus::Idle);
            Ok(())
        })?;
    }

    /// Property: a tight deadline yields one result per task, each either a
    /// value or a timeout
    #[test]
    fn deadline_partitions_results(
        capacity in 1usize..=4,
        durations in prop::collection::vec(1u64..=500, 1..=30),
        deadline_ms in 1u64..=600,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let orchestrator = tracking_orchestrator(capacity, &running, &peak);

            let tasks = durations
                .iter()
                .enumerate()
                .map(|(i, d)| Task::new(format!("t{i}"), "w", *d));
            let results = orchestrator
                .dispatch_batch(tasks, Duration::from_millis(deadline_ms))
                .await;

            prop_assert_eq!(results.len(), durations.len());
            prop_assert!(peak.load(Ordering::SeqCst) <= capacity);

            let mut timed_out = 0u64;
            for result in &results {
                prop_assert_eq!(result.success, result.value.is_some());
                prop_assert_eq!(result.success, result.error.is_none());
                if !result.success {
                    prop_assert_eq!(result.error.as_ref(), Some(&TaskError::Timeout));
                    timed_out += 1;
                }
            }

            let status = orchestrator.status_snapshot();
            prop_assert_eq!(status.timed_out, timed_out);
            prop_assert_eq!(status.queued_total, 0);
            prop_assert!(status.total_in_flight <= capacity);
            Ok(())
        })?;
    }
}
