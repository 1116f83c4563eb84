//! Request admission under global and per-connection token budgets.
//!
//! # Flow
//!
//! ```text
//!   admit(ctx, connection?, cost)
//!        │
//!        ▼
//!   deadline = min(now + admission_timeout, ctx.deadline)
//!        │
//!        ▼
//!   ┌─────────────────────────┐
//!   │  1. CONNECTION BUCKET   │  only when the transport supplied one
//!   └─────────────────────────┘
//!        │ WaitError?
//!        ├─> AdmissionError::ConnectionLimited
//!        ▼
//!   ┌─────────────────────────┐
//!   │  2. GLOBAL BUCKET       │  same deadline as step 1
//!   └─────────────────────────┘
//!        │ WaitError?
//!        ├─> AdmissionError::ServerBusy  (+1 gateway_rate_limit_total)
//!        ▼
//!   admitted
//! ```
//!
//! Both waits share one deadline, so time spent waiting on the connection bucket comes out of
//! the global wait's budget. Tokens are consumed, never returned after admission.

pub mod context;
pub mod cost;
pub mod errors;
pub mod token_bucket;

pub use context::{Deadline, DeadlineSource, RequestContext};
pub use cost::TokenCost;
pub use errors::{AdmissionError, WaitError};
pub use token_bucket::{Rate, TokenBucket};

use crate::{config::PolicyConfig, metrics::MetricsCollector};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Owns the gateway-wide token bucket and decides whether a request may proceed.
///
/// Created once at startup and shared by reference with every request handler.
pub struct AdmissionController {
    global: TokenBucket,
    timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl AdmissionController {
    #[must_use]
    pub fn new(policy: &PolicyConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            global: TokenBucket::new(policy.global_rate(), TokenCost::MAX_TOKENS),
            timeout: policy.rate_limit_timeout(),
            metrics,
        }
    }

    #[must_use]
    pub fn global_limiter(&self) -> &TokenBucket {
        &self.global
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for `cost` tokens from the connection bucket (if any) and then the global bucket.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::ConnectionLimited`] if the connection bucket could not supply the
    ///   tokens in time, or the caller cancelled during that wait
    /// - [`AdmissionError::ServerBusy`] if the global bucket could not supply the tokens in
    ///   time, or the caller cancelled during that wait
    pub async fn admit(
        &self,
        ctx: &RequestContext,
        connection: Option<&TokenBucket>,
        cost: TokenCost,
    ) -> Result<(), AdmissionError> {
        let deadline = ctx.admission_deadline(self.timeout);
        let tokens = cost.tokens();

        if let Some(limiter) = connection {
            if let Err(cause) = limiter.wait_n(tokens, deadline, ctx.cancellation()).await {
                self.metrics.record_connection_limited(cost);
                debug!(cost = cost.as_str(), error = %cause, "connection rate limit hit");
                return Err(AdmissionError::ConnectionLimited(cause));
            }
        }

        match self.global.wait_n(tokens, deadline, ctx.cancellation()).await {
            Ok(waited) => {
                self.metrics.record_admitted(cost);
                debug!(cost = cost.as_str(), waited_ms = waited.as_millis(), "request admitted");
                Ok(())
            }
            Err(cause) => {
                self.metrics.record_rate_limited(cost);
                warn!(cost = cost.as_str(), error = %cause, "global rate limit hit");
                Err(AdmissionError::ServerBusy(cause))
            }
        }
    }
}
