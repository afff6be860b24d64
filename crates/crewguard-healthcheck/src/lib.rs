//! Periodic health monitoring with recovery actions.
//!
//! A [`HealthMonitor`] evaluates named [`HealthCheck`]s on a fixed interval
//! (default 30 seconds). Each check is an async closure resolving to
//! `true` when healthy. When a check flips from healthy to unhealthy, the
//! recovery action registered with it is run once.
//!
//! Checks are evaluated concurrently within a cycle. A check that panics or
//! exceeds the check timeout (default 10 seconds) is treated as unhealthy.
//!
//! # Examples
//!
//! ```rust
//! use crewguard_healthcheck::{HealthCheck, HealthMonitor};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let connected = Arc::new(AtomicBool::new(true));
//! let probe = Arc::clone(&connected);
//! let reconnect = Arc::clone(&connected);
//!
//! let monitor = HealthMonitor::builder().build().unwrap();
//! monitor
//!     .register(
//!         HealthCheck::new("broker", move || {
//!             let up = probe.load(Ordering::SeqCst);
//!             async move { up }
//!         })
//!         .with_recovery(move || {
//!             reconnect.store(true, Ordering::SeqCst);
//!             async { Ok::<_, std::io::Error>(()) }
//!         }),
//!     )
//!     .unwrap();
//!
//! connected.store(false, Ordering::SeqCst);
//! monitor.run_once().await;
//! assert!(connected.load(Ordering::SeqCst));
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `tracing`: log status changes and recovery outcomes
//! - `metrics`: `healthcheck_status{check}` gauge and
//!   `healthcheck_recoveries_total{check,outcome}` counter
//! - `serde`: serialize check statuses and configuration

mod check;
mod config;
mod events;
mod monitor;

pub use check::{CheckStatus, HealthCheck};
pub use config::HealthMonitorConfig;
pub use events::HealthEvent;
pub use monitor::{HealthMonitor, HealthMonitorBuilder};
