//! Bounded-concurrency task orchestration with a resilience layer.
//!
//! `crewguard` coordinates tasks across a fixed set of named workers and
//! absorbs transient failures without corrupting scheduling state. Each part
//! is also available as its own crate; this crate re-exports them and adds
//! the [`ResilienceManager`] that ties them together.
//!
//! # Components
//!
//! - **Orchestration** ([`orchestrator`]): workers with bounded capacity and
//!   an overflow queue, fan-out/fan-in batch dispatch with one deadline, and
//!   status snapshots.
//! - **Circuit breaker** ([`circuitbreaker`]): a consecutive-failure state
//!   machine per named resource.
//! - **Retry** ([`retry`]): fixed, linear, exponential and random backoff.
//! - **Errors** ([`errors`]): severity classification, an append-only error
//!   log and statistics.
//! - **Health checks** ([`healthcheck`]): a periodic monitor that runs
//!   recovery actions when a check turns unhealthy.
//!
//! # Example
//!
//! ```rust
//! use crewguard::circuitbreaker::CircuitBreakerConfig;
//! use crewguard::orchestrator::{Orchestrator, Task, Worker};
//! use crewguard::retry::RetryConfig;
//! use crewguard::ResilienceManager;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::ServiceBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(ResilienceManager::new());
//! manager.get_or_create_circuit_breaker("llm", CircuitBreakerConfig::default())?;
//! manager.get_or_create_retry_policy("llm", RetryConfig::default())?;
//!
//! // Every execution goes through the "llm" breaker and retry policy.
//! let executor = ServiceBuilder::new()
//!     .layer(manager.layer("llm")?)
//!     .service_fn(|task: Task<String>| async move {
//!         Ok::<_, std::io::Error>(format!("done: {}", task.payload()))
//!     });
//!
//! let orchestrator = Orchestrator::builder()
//!     .worker(Worker::builder("writer").capacity(2), executor)
//!     .error_reporter(Arc::clone(&manager))
//!     .build()?;
//!
//! let results = orchestrator
//!     .dispatch_batch(
//!         vec![Task::new("t-1", "writer", "outline".to_string())],
//!         Duration::from_secs(60),
//!     )
//!     .await;
//! assert!(results[0].success);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `tracing`: structured logging in every component
//! - `metrics`: counters, gauges and histograms in every component
//! - `serde`: serialization of configuration, records and reports
//! - `full`: all of the above

pub use crewguard_circuitbreaker as circuitbreaker;
pub use crewguard_core as core;
pub use crewguard_errors as errors;
pub use crewguard_healthcheck as healthcheck;
pub use crewguard_orchestrator as orchestrator;
pub use crewguard_retry as retry;

mod error;
mod handling;
mod manager;
mod protected;

pub use error::{CircuitOpenError, ManagerError, ProtectedCallError};
pub use handling::with_error_handling;
pub use manager::{ResilienceManager, ResilienceManagerBuilder};
pub use protected::{Protected, ProtectedLayer};
