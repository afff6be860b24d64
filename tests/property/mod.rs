//! Property-based tests for crewguard.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random workloads and verify that
//! invariants hold across workers, breakers and retry policies.

pub mod circuit_breaker;
pub mod retry;
pub mod worker;
