//! Behavioral tests for the tenant tree cache.
//!
//! These exercise the public manager surface end to end with the crate's
//! test doubles: single-flight deduplication, TTL expiry, the non-blocking
//! read path, invalidation racing in-flight builds, restart semantics, and
//! janitor maintenance.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test behavior
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod janitor_tests;
mod single_flight_tests;
