//! Circuit breaker metrics regression tests

use super::helpers::*;
use crewguard_circuitbreaker::CircuitBreaker;
use serial_test::serial;
use std::io;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::builder("metrics_breaker")
        .failure_threshold(2)
        .build()
        .unwrap();

    let _ = breaker.call(|| async { Ok::<_, io::Error>(()) }).await;
    for _ in 0..2 {
        let _ = breaker
            .call(|| async { Err::<(), _>(io::Error::other("boom")) })
            .await;
    }
    let _ = breaker.call(|| async { Ok::<_, io::Error>(()) }).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "metrics_breaker");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_histogram_exists("circuitbreaker_call_duration_seconds");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "metrics_breaker");
}
