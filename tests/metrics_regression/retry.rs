//! Retry metrics regression tests

use super::helpers::*;
use crewguard_retry::{RetryPolicy, RetryStrategy};
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn policy(name: &str, max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder(name)
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(1))
        .strategy(RetryStrategy::Fixed)
        .jitter(false)
        .build()
        .unwrap()
}

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let calls = AtomicU32::new(0);
    let _ = policy("metrics_retry", 3)
        .retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(std::io::Error::other("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "metrics_retry");
    assert_metric_has_label("retry_calls_total", "outcome", "success");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "metrics_retry");
}

#[tokio::test]
#[serial]
async fn retry_exhausted_metrics() {
    init_recorder();

    let _ = policy("exhausted_retry", 2)
        .retry(|| async { Err::<(), _>(std::io::Error::other("down")) })
        .await;

    assert_metric_has_label("retry_calls_total", "retry", "exhausted_retry");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");
}
