//! Integration tests for the chaingate policy layer.
//!
//! - `admission_tests`: global and per-connection throttling under concurrent load
//! - `lookback_tests`: recency checks through the gateway against a mock chain
//! - `gateway_tests`: ordering of checks, pass-through behaviour, and error mapping
//! - `metrics_tests`: Prometheus export of policy counters
//! - `mock_infrastructure`: reusable mock node and fixtures
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! Timing-sensitive tests run on a paused tokio clock, so they do not sleep in real time.

#![cfg_attr(test, allow(clippy::unwrap_used))]

#[cfg(test)]
mod admission_tests;


#[cfg(test)]
mod gateway_tests;


/// Mock infrastructure for testing
pub mod mock_infrastructure;
