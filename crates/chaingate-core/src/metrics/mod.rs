//! # Metrics
//!
//! Policy decisions are recorded on two paths:
//!
//! - **`metrics` facade**: lock-free counters picked up by whatever recorder the process
//!   installs (Prometheus via [`init_metrics`] when `[metrics] enabled` is set).
//! - **In-process counters**: atomics behind [`MetricsCollector::summary`], so operators and
//!   tests can read totals without scraping.
//!
//! | Metric | Labels | Incremented when |
//! |--------|--------|------------------|
//! | `gateway_admitted_total` | `cost` | a request passes both buckets |
//! | `gateway_rate_limit_total` | `cost` | the global bucket denies a request |
//! | `gateway_connection_limited_total` | `cost` | a connection bucket denies a request |
//! | `gateway_lookback_rejections_total` | `reason` | a lookback check rejects a request |

use crate::{
    admission::{AdmissionError, TokenCost, WaitError},
    config::MetricsConfig,
    gateway::GatewayError,
    lookback::LookbackError,
};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    OnceLock,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Static label for error kinds, used in metrics and structured logs.
pub trait MetricsState {
    fn as_metric_str(&self) -> &'static str;
}

impl MetricsState for WaitError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::ExceedsBurst { .. } => "exceeds_burst",
            Self::Timeout { .. } => "timeout",
            Self::CallerDeadline { .. } => "caller_deadline",
            Self::Cancelled => "cancelled",
        }
    }
}

impl MetricsState for AdmissionError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::ConnectionLimited(_) => "connection_limited",
            Self::ServerBusy(_) => "server_busy",
        }
    }
}

impl MetricsState for LookbackError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Exceeded(_) => "lookback_exceeded",
            Self::BadTipset(inner) | Self::BadTipsetHeight(inner) => inner.as_metric_str(),
            Self::FutureHeight { .. } => "future_height",
            Self::EmptyTipset => "empty_tipset",
            Self::MessageLookbackExceeded { .. } => "message_lookback_exceeded",
            Self::Backend(_) => "backend_error",
        }
    }
}

impl MetricsState for GatewayError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Admission(e) => e.as_metric_str(),
            Self::Lookback(e) => e.as_metric_str(),
            Self::Backend(_) => "backend_error",
        }
    }
}

/// Installs the process-wide Prometheus recorder, once.
///
/// Later calls return the handle from the first installation. If another recorder is already
/// installed, a detached recorder is built so [`PrometheusHandle::render`] still works.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to install Prometheus recorder, using a detached recorder"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Installs the Prometheus recorder when `[metrics] enabled` is set.
///
/// Returns `None` without touching the global recorder when metrics are disabled; the
/// `counter!` calls then go to the facade's no-op recorder.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusHandle> {
    if !config.enabled {
        tracing::debug!("metrics export disabled");
        return None;
    }
    Some(install_prometheus_recorder())
}

/// Point-in-time totals from a [`MetricsCollector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub admitted: u64,
    pub rate_limit_rejections: u64,
    pub connection_limited: u64,
    pub lookback_rejections: u64,
}

/// Records admission and lookback outcomes.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    admitted: AtomicU64,
    rate_limit_rejections: AtomicU64,
    connection_limited: AtomicU64,
    lookback_rejections: AtomicU64,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self, cost: TokenCost) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        counter!("gateway_admitted_total", "cost" => cost.as_str()).increment(1);
    }

    /// Throttle event: the global bucket denied a request.
    pub fn record_rate_limited(&self, cost: TokenCost) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
        counter!("gateway_rate_limit_total", "cost" => cost.as_str()).increment(1);
    }

    pub fn record_connection_limited(&self, cost: TokenCost) {
        self.connection_limited.fetch_add(1, Ordering::Relaxed);
        counter!("gateway_connection_limited_total", "cost" => cost.as_str()).increment(1);
    }

    pub fn record_lookback_rejection(&self, error: &LookbackError) {
        self.lookback_rejections.fetch_add(1, Ordering::Relaxed);
        counter!("gateway_lookback_rejections_total", "reason" => error.as_metric_str())
            .increment(1);
    }

    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            admitted: self.admitted.load(Ordering::Relaxed),
            rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            connection_limited: self.connection_limited.load(Ordering::Relaxed),
            lookback_rejections: self.lookback_rejections.load(Ordering::Relaxed),
        }
    }
}
