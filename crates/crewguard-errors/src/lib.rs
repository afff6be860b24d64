//! Error classification and recording for crewguard.
//!
//! Failures are classified into a [`Severity`](crewguard_core::Severity) and
//! a type label by an [`ErrorClassifier`], then appended to an [`ErrorLog`].
//! The log keeps every record in memory and answers [`ErrorStatistics`]
//! queries for monitoring.
//!
//! | Severity | Covers |
//! |---|---|
//! | Critical | resource exhaustion, unrecoverable state |
//! | High | connectivity, timeout, permission |
//! | Medium | invalid input, contract violations |
//! | Low | everything else |
//!
//! Components that only need to hand failures off, such as workers, depend
//! on the [`ErrorReporter`] trait instead of a concrete log.
//!
//! # Feature flags
//!
//! - `tracing`: log each record at a level matching its severity
//! - `metrics`: count records in `errors_recorded_total{severity}`
//! - `serde`: serialize records and statistics

mod classifier;
mod events;
mod log;
mod record;
mod reporter;

pub use classifier::{Classification, ErrorClassifier};
pub use events::ErrorEvent;
pub use log::{ErrorLog, ErrorLogBuilder, ErrorLogError, ErrorStatistics, RECENT_WINDOW};
pub use record::{ErrorRecord, FailureContext};
pub use reporter::ErrorReporter;
