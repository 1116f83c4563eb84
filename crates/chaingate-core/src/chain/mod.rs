//! Chain data model and the backend capability the policy layer depends on.
//!
//! The gateway forwards a large surface of node operations, but the admission and lookback
//! checks only ever need two things from the node:
//!
//! - resolving a [`TipSetKey`] to a [`TipSet`]
//! - the node's nominal block delay, used to estimate wall-clock time at past heights
//!
//! [`ChainBackend`] lists exactly those. Everything else the gateway forwards lives on
//! [`crate::gateway::TargetApi`].

pub mod types;

pub use types::{BlockHeader, ChainBackend, ChainEpoch, TipSet, TipSetKey, DEFAULT_BLOCK_DELAY_SECS};

use thiserror::Error;

/// Failures reported by the backend node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    /// The requested tip set is not known to the node.
    #[error("tipset not found: {0}")]
    TipSetNotFound(TipSetKey),

    /// The node answered with data the gateway cannot interpret.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The node could not be reached or failed internally.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
