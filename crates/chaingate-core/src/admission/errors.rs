use super::context::DeadlineSource;
use std::time::Duration;
use thiserror::Error;

/// Why a single token-bucket wait did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The request costs more than the bucket can ever hold.
    #[error("rate: wait({requested}) exceeds limiter burst {burst}")]
    ExceedsBurst { requested: u32, burst: u32 },

    /// Tokens would not be available before the admission timeout.
    #[error("rate: wait of {wait:?} would exceed admission timeout ({remaining:?} remaining)")]
    Timeout { wait: Duration, remaining: Duration },

    /// Tokens would not be available before the caller's own deadline.
    #[error("rate: wait of {wait:?} would exceed caller deadline ({remaining:?} remaining)")]
    CallerDeadline { wait: Duration, remaining: Duration },

    /// The caller gave up while waiting.
    #[error("context canceled")]
    Cancelled,
}

impl WaitError {
    pub(crate) fn past_deadline(
        source: DeadlineSource,
        wait: Duration,
        remaining: Duration,
    ) -> Self {
        match source {
            DeadlineSource::Admission => Self::Timeout { wait, remaining },
            DeadlineSource::Caller => Self::CallerDeadline { wait, remaining },
        }
    }

    /// `true` when the caller ended the wait rather than the gateway's timeout.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::CallerDeadline { .. })
    }
}

/// Denial returned by [`super::AdmissionController::admit`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The connection's own budget could not cover the request.
    #[error("connection limited. {0}")]
    ConnectionLimited(#[source] WaitError),

    /// The gateway-wide budget could not cover the request.
    #[error("server busy. {0}")]
    ServerBusy(#[source] WaitError),
}

impl AdmissionError {
    #[must_use]
    pub fn cause(&self) -> &WaitError {
        match self {
            Self::ConnectionLimited(cause) | Self::ServerBusy(cause) => cause,
        }
    }

    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.cause().is_cancellation()
    }
}
