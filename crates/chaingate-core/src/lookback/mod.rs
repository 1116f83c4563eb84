//! Historical-depth policing.
//!
//! Queries may only reference chain history within a recency window. The checks here are
//! pure decisions over chain data, the configured window and wall-clock time:
//!
//! | Check | Rejects when |
//! |-------|--------------|
//! | [`check_timestamp`](LookbackValidator::check_timestamp) | `now - at > max_lookback` |
//! | [`check_tipset`](LookbackValidator::check_tipset) | the tip set's first block is too old |
//! | [`check_tipset_key`](LookbackValidator::check_tipset_key) | a non-head key resolves to a tip set that is too old |
//! | [`check_tipset_height`](LookbackValidator::check_tipset_height) | the height is above the tip set, or its estimated time is too old |
//! | [`clamp_message_lookback`](LookbackValidator::clamp_message_lookback) | a message search reaches back more epochs than allowed |
//!
//! Height checks estimate the time at a past height from the nominal block delay instead of
//! fetching the historical tip set. The estimate is off by however much real block times
//! varied, which is acceptable for a recency gate.

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use crate::{
    chain::{BackendError, ChainBackend, ChainEpoch, TipSet, TipSetKey},
    config::PolicyConfig,
};
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use thiserror::Error;
use tracing::trace;

/// Rejections produced by the lookback checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookbackError {
    /// The referenced point is older than the configured window. Carries the message
    /// formatted once at startup.
    #[error("{0}")]
    Exceeded(Arc<str>),

    #[error("bad tipset: {0}")]
    BadTipset(Box<LookbackError>),

    #[error("bad tipset height: {0}")]
    BadTipsetHeight(Box<LookbackError>),

    #[error("tipset height in future: requested {requested}, tipset at {tipset}")]
    FutureHeight { requested: ChainEpoch, tipset: ChainEpoch },

    #[error("tipset has no blocks")]
    EmptyTipset,

    #[error("message lookup ({requested}) exceeds max ({max})")]
    MessageLookbackExceeded { requested: ChainEpoch, max: ChainEpoch },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LookbackError {
    /// `true` if the root cause is the reference being older than the window.
    #[must_use]
    pub fn is_lookback_exceeded(&self) -> bool {
        match self {
            Self::Exceeded(_) => true,
            Self::BadTipset(inner) | Self::BadTipsetHeight(inner) => inner.is_lookback_exceeded(),
            _ => false,
        }
    }

    /// `true` if the root cause is a height above the reference tip set.
    #[must_use]
    pub fn is_future_height(&self) -> bool {
        matches!(self, Self::FutureHeight { .. })
    }
}

/// Decides whether historical references fall inside the allowed window.
pub struct LookbackValidator<B: ?Sized> {
    backend: Arc<B>,
    max_lookback: Duration,
    max_message_lookback_epochs: ChainEpoch,
    lookback_error: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl<B: ChainBackend + ?Sized> LookbackValidator<B> {
    #[must_use]
    pub fn new(policy: &PolicyConfig, backend: Arc<B>) -> Self {
        Self::with_clock(policy, backend, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(policy: &PolicyConfig, backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            max_lookback: policy.max_lookback(),
            max_message_lookback_epochs: policy.max_message_lookback_epochs(),
            lookback_error: policy.lookback_error_message(),
            clock,
        }
    }

    #[must_use]
    pub fn max_lookback(&self) -> Duration {
        self.max_lookback
    }

    /// Rejects `at` if more than the window has elapsed since it. Future times pass.
    ///
    /// # Errors
    ///
    /// Returns [`LookbackError::Exceeded`] when `now - at > max_lookback`.
    pub fn check_timestamp(&self, at: SystemTime) -> Result<(), LookbackError> {
        let elapsed = self.clock.now().duration_since(at).unwrap_or(Duration::ZERO);
        if elapsed > self.max_lookback {
            trace!(elapsed_secs = elapsed.as_secs(), "lookback window exceeded");
            return Err(LookbackError::Exceeded(self.lookback_error.clone()));
        }
        Ok(())
    }

    /// Checks the timestamp of the tip set's first block.
    ///
    /// # Errors
    ///
    /// [`LookbackError::BadTipset`] wrapping the timestamp failure, or
    /// [`LookbackError::EmptyTipset`].
    pub fn check_tipset(&self, ts: &TipSet) -> Result<(), LookbackError> {
        let at = first_block_time(ts)?;
        self.check_timestamp(at).map_err(|e| LookbackError::BadTipset(Box::new(e)))
    }

    /// Accepts the head key unconditionally; resolves any other key and checks its tip set.
    ///
    /// # Errors
    ///
    /// Backend failures while resolving the key, or any [`check_tipset`](Self::check_tipset)
    /// failure.
    pub async fn check_tipset_key(&self, key: &TipSetKey) -> Result<(), LookbackError> {
        if key.is_empty() {
            return Ok(());
        }
        let ts = self.backend.chain_get_tipset(key).await?;
        self.check_tipset(&ts)
    }

    /// Checks that `height` is not above `ts` and that its estimated time is inside the
    /// window.
    ///
    /// # Errors
    ///
    /// [`LookbackError::FutureHeight`] if `height > ts.height()`, otherwise
    /// [`LookbackError::BadTipsetHeight`] wrapping the timestamp failure.
    pub fn check_tipset_height(
        &self,
        ts: &TipSet,
        height: ChainEpoch,
    ) -> Result<(), LookbackError> {
        if height > ts.height() {
            return Err(LookbackError::FutureHeight { requested: height, tipset: ts.height() });
        }
        let at = estimate_time_at_height(
            first_block_time(ts)?,
            ts.height(),
            height,
            self.backend.block_delay_secs(),
        );
        self.check_timestamp(at).map_err(|e| LookbackError::BadTipsetHeight(Box::new(e)))
    }

    /// Applies the message lookback cap to a search limit. `None` means "no limit" and is
    /// replaced by the cap.
    ///
    /// # Errors
    ///
    /// [`LookbackError::MessageLookbackExceeded`] if `limit` is above the cap.
    pub fn clamp_message_lookback(
        &self,
        limit: Option<ChainEpoch>,
    ) -> Result<ChainEpoch, LookbackError> {
        let max = self.max_message_lookback_epochs;
        match limit {
            None => Ok(max),
            Some(requested) if requested > max => {
                Err(LookbackError::MessageLookbackExceeded { requested, max })
            }
            Some(requested) => Ok(requested),
        }
    }
}

/// Time of the tip set's first block. A timestamp past the representable range is a
/// malformed backend response.
fn first_block_time(ts: &TipSet) -> Result<SystemTime, LookbackError> {
    let block = ts.first_block().ok_or(LookbackError::EmptyTipset)?;
    block.time().ok_or_else(|| {
        LookbackError::Backend(BackendError::InvalidResponse(format!(
            "block {} timestamp {} out of range",
            block.cid, block.timestamp
        )))
    })
}

/// Estimated wall-clock time at `height`, counting back from a tip set at `tip_height`.
#[must_use]
pub fn estimate_time_at_height(
    tip_time: SystemTime,
    tip_height: ChainEpoch,
    height: ChainEpoch,
    block_delay_secs: u64,
) -> SystemTime {
    let epochs = u64::try_from(tip_height.saturating_sub(height)).unwrap_or(0);
    let delta = Duration::from_secs(epochs.saturating_mul(block_delay_secs));
    tip_time.checked_sub(delta).unwrap_or(SystemTime::UNIX_EPOCH)
}
