//! Chain fixtures and gateway constructors.

use super::MockNode;
use chaingate_core::{
    chain::{ChainEpoch, TipSet},
    config::PolicyConfig,
    gateway::{GatewayNode, MsgLookup},
    lookback::FixedClock,
    metrics::MetricsCollector,
};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Wall-clock instant every fixture is anchored to.
pub const NOW: u64 = 1_700_000_000;

#[must_use]
pub fn now() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(NOW)
}

/// `count` consecutive tip sets ending at `head_height`, each `block_delay` seconds apart,
/// with the head stamped `head_timestamp`.
#[must_use]
pub fn build_chain(
    head_height: ChainEpoch,
    head_timestamp: u64,
    block_delay: u64,
    count: ChainEpoch,
) -> Vec<TipSet> {
    (0..count)
        .map(|back| {
            let height = head_height - back;
            let age = u64::try_from(back).unwrap_or(0) * block_delay;
            TipSet::single(format!("bafy-{height}"), height, head_timestamp.saturating_sub(age))
        })
        .collect()
}

/// Mainnet-like chain: 3000 epochs (a little over a day) ending at height 10 000, now.
#[must_use]
pub fn mainnet_like_node() -> MockNode {
    MockNode::new(build_chain(10_000, NOW, 30, 3000))
}

#[must_use]
pub fn message_at(cid: &str, height: ChainEpoch) -> MsgLookup {
    MsgLookup {
        message: cid.to_string(),
        tipset: vec![format!("bafy-{height}")],
        height,
        exit_code: 0,
    }
}

/// Gateway in front of `node` with the clock pinned at [`NOW`].
#[must_use]
pub fn gateway_with(node: Arc<MockNode>, policy: PolicyConfig) -> GatewayNode<MockNode> {
    GatewayNode::from_parts(
        node,
        policy,
        Arc::new(MetricsCollector::new()),
        Arc::new(FixedClock::new(now())),
    )
}
