//! # Chaingate Core
//!
//! Policy layer for a chain-node gateway: it decides whether a request may reach the backend
//! node, and whether the chain history it references is recent enough.
//!
//! - **[`admission`]**: token-bucket admission against a gateway-wide budget and an optional
//!   per-connection budget, with a bounded wait.
//!
//! - **[`lookback`]**: recency checks on timestamps, tip sets, tip set keys and heights, plus
//!   the message search depth cap.
//!
//! - **[`config`]**: the immutable [`config::PolicyConfig`] and its layered file form.
//!
//! - **[`gateway`]**: [`gateway::GatewayNode`], which runs both checks in front of a
//!   [`gateway::TargetApi`].
//!
//! - **[`metrics`]**: counters for admissions, throttling and lookback rejections.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       GatewayNode                        │
//! │  ┌─────────────────────┐      ┌───────────────────────┐  │
//! │  │ AdmissionController │      │  LookbackValidator    │  │
//! │  │  global TokenBucket │      │  Clock + ChainBackend │  │
//! │  └──────────┬──────────┘      └───────────┬───────────┘  │
//! │             │                             │              │
//! │             └──────────┬──────────────────┘              │
//! │                        ▼                                 │
//! │                 MetricsCollector                         │
//! └────────────────────────┬─────────────────────────────────┘
//!                          ▼
//!                      TargetApi
//! ```

pub mod admission;
pub mod chain;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod lookback;
pub mod metrics;
