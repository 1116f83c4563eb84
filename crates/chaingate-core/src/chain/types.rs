use super::BackendError;
use async_trait::async_trait;
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Discrete unit of chain height.
pub type ChainEpoch = i64;

/// Expected interval between epochs on mainnet, in seconds.
pub const DEFAULT_BLOCK_DELAY_SECS: u64 = 30;

/// Identifies a tip set by the CIDs of its blocks.
///
/// An empty key is the conventional way for callers to say "the current head".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TipSetKey(Vec<String>);

impl TipSetKey {
    /// The empty key, meaning the current chain head.
    #[must_use]
    pub fn head() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn new(cids: Vec<String>) -> Self {
        Self(cids)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn cids(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TipSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        write!(f, "{{{}}}", self.0.join(","))
    }
}

/// The header fields the policy layer reads from a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub cid: String,
    pub height: ChainEpoch,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl BlockHeader {
    /// The block time, or `None` if the timestamp does not fit in a [`SystemTime`].
    #[must_use]
    pub fn time(&self) -> Option<SystemTime> {
        UNIX_EPOCH.checked_add(Duration::from_secs(self.timestamp))
    }
}

/// A set of co-equal blocks at one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipSet {
    height: ChainEpoch,
    blocks: Vec<BlockHeader>,
}

impl TipSet {
    #[must_use]
    pub fn new(height: ChainEpoch, blocks: Vec<BlockHeader>) -> Self {
        Self { height, blocks }
    }

    /// Convenience constructor for a tip set with a single block.
    #[must_use]
    pub fn single(cid: impl Into<String>, height: ChainEpoch, timestamp: u64) -> Self {
        Self { height, blocks: vec![BlockHeader { cid: cid.into(), height, timestamp }] }
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> ChainEpoch {
        self.height
    }

    #[must_use]
    pub fn blocks(&self) -> &[BlockHeader] {
        &self.blocks
    }

    /// All blocks of a tip set share a timestamp; the first one is authoritative.
    #[must_use]
    pub fn first_block(&self) -> Option<&BlockHeader> {
        self.blocks.first()
    }

    #[must_use]
    pub fn key(&self) -> TipSetKey {
        TipSetKey(self.blocks.iter().map(|b| b.cid.clone()).collect())
    }
}

/// The subset of node capabilities the lookback checks call into.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Resolves a non-empty key to its tip set.
    async fn chain_get_tipset(&self, key: &TipSetKey) -> Result<TipSet, BackendError>;

    /// Nominal seconds between epochs.
    fn block_delay_secs(&self) -> u64 {
        DEFAULT_BLOCK_DELAY_SECS
    }
}
