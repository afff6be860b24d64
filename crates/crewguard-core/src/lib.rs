//! Core infrastructure for crewguard.
//!
//! This crate provides the pieces shared by every crewguard component:
//! - Event system for lifecycle and state-change observability
//! - The severity taxonomy used when recording failures
//! - Type-based error matching for retry and circuit breaker decisions
//! - The configuration error returned by every builder

pub mod error;
pub mod events;
pub mod matcher;
pub mod severity;

pub use error::ConfigError;
pub use events::{CrewEvent, EventListener, EventListeners, FnListener};
pub use matcher::ErrorMatcher;
pub use severity::Severity;

/// Type-erased error produced by task executors and wrapped calls.
///
/// Matches the alias used throughout the tower ecosystem.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
