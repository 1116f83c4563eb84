//! Guarded forwarding of node operations.
//!
//! [`GatewayNode`] is the glue between the transport and the backend node. Every operation
//! runs the same pipeline before it is forwarded:
//!
//! ```text
//!   call(caller, args)
//!        │
//!        ▼
//!   admission (cost class of the method)   ── denied ──> GatewayError::Admission
//!        │
//!        ▼
//!   lookback checks on tip set arguments  ── denied ──> GatewayError::Lookback
//!        │
//!        ▼
//!   TargetApi call                        ── failed ──> GatewayError::Backend
//! ```
//!
//! Only a representative set of operations is wired here. Anything else goes through
//! [`GatewayNode::guard`] (or [`GatewayNode::guard_method`]) and then straight to the
//! backend.

pub mod errors;
mod node;
mod target;

pub use errors::{GatewayError, INVALID_PARAMS_CODE, RATE_LIMITED_CODE, SERVER_ERROR_CODE};
pub use node::{Caller, GatewayNode};
pub use target::{MsgLookup, NodeVersion, TargetApi, TokenAmount};
