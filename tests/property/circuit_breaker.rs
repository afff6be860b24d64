//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when the consecutive failure count reaches the threshold
//! - Never invokes the protected function while open
//! - Interleaved successes keep a closed circuit closed

use crewguard_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

/// A cloneable error type for testing
#[derive(Debug, Clone)]
struct TestError;

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test error")
    }
}

impl std::error::Error for TestError {}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: the function runs exactly `threshold` times before the
    /// circuit opens, however many calls are made
    #[test]
    fn opens_after_threshold_consecutive_failures(
        threshold in 1u32..=10,
        calls in 1usize..=40,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let breaker = CircuitBreaker::builder("prop")
                .failure_threshold(threshold)
                .recovery_timeout(Duration::from_secs(3600))
                .build()
                .unwrap();
            let invoked = Arc::new(AtomicUsize::new(0));

            let mut rejected = 0;
            for _ in 0..calls {
                let i = Arc::clone(&invoked);
                let result = breaker
                    .call(|| async move {
                        i.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError)
                    })
                    .await;
                if matches!(result, Err(CircuitBreakerError::OpenCircuit { .. })) {
                    rejected += 1;
                }
            }

            let expected_invocations = calls.min(threshold as usize);
            prop_assert_eq!(invoked.load(Ordering::SeqCst), expected_invocations);
            prop_assert_eq!(rejected, calls - expected_invocations);
            prop_assert_eq!(breaker.is_open(), calls >= threshold as usize);
            Ok(())
        })?;
    }

    /// Property: failure runs shorter than the threshold never open the
    /// circuit when separated by successes
    #[test]
    fn short_failure_runs_stay_closed(
        threshold in 2u32..=8,
        runs in prop::collection::vec(0u32..8, 1..=20),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let breaker = CircuitBreaker::builder("prop")
                .failure_threshold(threshold)
                .build()
                .unwrap();

            for run in runs.iter().map(|r| r % threshold) {
                for _ in 0..run {
                    let _ = breaker.call(|| async { Err::<(), _>(TestError) }).await;
                }
                breaker
                    .call(|| async { Ok::<_, TestError>(()) })
                    .await
                    .unwrap();
            }

            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            prop_assert_eq!(breaker.metrics().failure_count, 0);
            Ok(())
        })?;
    }
}
