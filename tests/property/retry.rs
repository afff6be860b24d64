//! Property tests for retry backoff.
//!
//! Invariants tested:
//! - Computed delays never exceed the maximum delay
//! - Jitter stays within ten percent of the nominal delay
//! - A policy never makes more than `max_attempts` attempts

use crewguard_retry::{RetryConfig, RetryPolicy, RetryStrategy};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::runtime::Builder;

fn strategy() -> impl Strategy<Value = RetryStrategy> {
    prop_oneof![
        Just(RetryStrategy::Fixed),
        Just(RetryStrategy::Linear),
        Just(RetryStrategy::Exponential),
        Just(RetryStrategy::Random),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: every strategy respects the delay cap
    #[test]
    fn delays_are_capped(
        strategy in strategy(),
        base_ms in 1u64..=2_000,
        extra_ms in 0u64..=60_000,
        multiplier in 1.0f64..=4.0,
        jitter in any::<bool>(),
        attempt in 0u32..=64,
        seed in any::<u64>(),
    ) {
        let config = RetryConfig {
            strategy,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(base_ms + extra_ms),
            multiplier,
            jitter,
            ..Default::default()
        };
        prop_assert!(config.validate().is_ok());

        let mut rng = StdRng::seed_from_u64(seed);
        let delay = config.compute_delay_with(attempt, &mut rng);
        prop_assert!(delay <= config.max_delay, "{:?} > {:?}", delay, config.max_delay);
    }

    /// Property: jitter moves a fixed delay by at most ten percent
    #[test]
    fn jitter_is_bounded(base_ms in 10u64..=10_000, seed in any::<u64>()) {
        let config = RetryConfig {
            strategy: RetryStrategy::Fixed,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_secs(3600),
            jitter: true,
            ..Default::default()
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let delay = config.compute_delay_with(0, &mut rng).as_secs_f64();
        let nominal = Duration::from_millis(base_ms).as_secs_f64();
        prop_assert!(delay >= nominal * 0.9 - 1e-9);
        prop_assert!(delay <= nominal * 1.1 + 1e-9);
    }

    /// Property: attempts stop at `max_attempts` for a persistent failure
    #[test]
    fn attempts_never_exceed_max(max_attempts in 1u32..=8) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let policy = RetryPolicy::builder("prop")
                .max_attempts(max_attempts)
                .base_delay(Duration::from_millis(10))
                .build()
                .unwrap();

            let calls = AtomicU32::new(0);
            let result = policy
                .retry(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(std::io::Error::other("down")) }
                })
                .await;

            prop_assert!(result.is_err());
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            Ok(())
        })?;
    }
}
