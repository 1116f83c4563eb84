use crate::chain::{BackendError, ChainBackend, ChainEpoch, TipSet, TipSetKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Balance in the chain's smallest unit.
pub type TokenAmount = u128;

/// Build and API version reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    pub version: String,
    pub api_version: u32,
    pub block_delay_secs: u64,
}

/// Where a searched-for message landed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgLookup {
    pub message: String,
    pub tipset: Vec<String>,
    pub height: ChainEpoch,
    pub exit_code: i64,
}

/// The node operations the gateway forwards after its checks pass.
///
/// Tip set keys follow the usual convention: an empty key means "the current head".
#[async_trait]
pub trait TargetApi: ChainBackend {
    async fn version(&self) -> Result<NodeVersion, BackendError>;

    async fn chain_head(&self) -> Result<TipSet, BackendError>;

    /// Tip set at `height`, or the nearest null-round predecessor, on the chain ending at
    /// `key`.
    async fn chain_get_tipset_by_height(
        &self,
        height: ChainEpoch,
        key: &TipSetKey,
    ) -> Result<TipSet, BackendError>;

    /// Like [`chain_get_tipset_by_height`](Self::chain_get_tipset_by_height) but resolves
    /// null rounds forward.
    async fn chain_get_tipset_after_height(
        &self,
        height: ChainEpoch,
        key: &TipSetKey,
    ) -> Result<TipSet, BackendError>;

    /// Searches back from `from` at most `limit` epochs for `message`.
    async fn state_search_msg(
        &self,
        from: &TipSetKey,
        message: &str,
        limit: ChainEpoch,
        allow_replaced: bool,
    ) -> Result<Option<MsgLookup>, BackendError>;

    async fn wallet_balance(&self, address: &str) -> Result<TokenAmount, BackendError>;
}
