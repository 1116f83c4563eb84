//! Mock infrastructure for gateway tests.
//!
//! ## Components
//!
//! - [`MockNode`]: in-memory chain implementing [`TargetApi`](chaingate_core::gateway::TargetApi),
//!   recording every call it receives
//! - Test helpers for building chains and gateways pinned to a fixed clock
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{build_chain, gateway_with, MockNode, NOW};
//!
//! let node = Arc::new(MockNode::new(build_chain(10_000, NOW, 30, 5_000)));
//! let gw = gateway_with(node.clone(), PolicyConfig::default());
//! ```

pub mod test_helpers;

pub use mock_node::MockNode;
pub use test_helpers::*;
