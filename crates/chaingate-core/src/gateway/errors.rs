use crate::{admission::AdmissionError, chain::BackendError, lookback::LookbackError};
use thiserror::Error;

/// JSON-RPC error code for throttled requests.
pub const RATE_LIMITED_CODE: i32 = -32005;
/// JSON-RPC error code for requests rejected by policy.
pub const INVALID_PARAMS_CODE: i32 = -32602;
/// JSON-RPC error code for backend failures.
pub const SERVER_ERROR_CODE: i32 = -32000;

/// Everything a guarded gateway operation can fail with.
///
/// Policy rejections are surfaced verbatim; the transport maps them to a response with
/// [`GatewayError::rpc_code`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Lookback(LookbackError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<LookbackError> for GatewayError {
    fn from(err: LookbackError) -> Self {
        match err {
            LookbackError::Backend(e) => Self::Backend(e),
            other => Self::Lookback(other),
        }
    }
}

impl GatewayError {
    #[must_use]
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Admission(_) => RATE_LIMITED_CODE,
            Self::Lookback(_) => INVALID_PARAMS_CODE,
            Self::Backend(_) => SERVER_ERROR_CODE,
        }
    }

    /// `true` for throttling and policy rejections, as opposed to backend failures.
    #[must_use]
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::Admission(_) | Self::Lookback(_))
    }

    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Admission(e) if e.is_cancellation())
    }
}
