use crate::{
    admission::{Rate, TokenBucket, TokenCost},
    chain::ChainEpoch,
};
use std::{any::Any, fmt, sync::Arc, time::Duration};

/// How far back in wall-clock time a request may reference chain history.
pub const DEFAULT_MAX_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// How many epochs a message search may reach back.
pub const DEFAULT_MAX_MESSAGE_LOOKBACK_EPOCHS: ChainEpoch = 20;

/// Longest a request may wait for tokens before it is rejected.
pub const DEFAULT_RATE_LIMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ethereum filters and subscriptions allowed per websocket connection.
pub const DEFAULT_ETH_MAX_FILTERS_PER_CONN: usize = 16;

/// Externally owned handler for Ethereum subscription callbacks. Passed through untouched.
pub type SubscriptionHandler = Arc<dyn Any + Send + Sync>;

/// Immutable policy tunables, built once at startup.
///
/// ```
/// use chaingate_core::config::PolicyConfig;
/// use std::time::Duration;
///
/// let policy = PolicyConfig::builder()
///     .max_lookback(Duration::from_secs(6 * 3600))
///     .rate_limit(500)
///     .build();
///
/// assert_eq!(policy.max_lookback(), Duration::from_secs(6 * 3600));
/// assert_eq!(
///     policy.lookback_error_message().as_ref(),
///     "lookbacks of more than 6h are disallowed"
/// );
/// ```
#[derive(Clone)]
pub struct PolicyConfig {
    max_lookback: Duration,
    max_message_lookback_epochs: ChainEpoch,
    rate_limit: u32,
    rate_limit_timeout: Duration,
    per_connection_rate_limit: u32,
    eth_max_filters_per_conn: usize,
    subscription_handler: Option<SubscriptionHandler>,
    lookback_error: Arc<str>,
}

impl PolicyConfig {
    #[must_use]
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    #[must_use]
    pub fn max_lookback(&self) -> Duration {
        self.max_lookback
    }

    #[must_use]
    pub fn max_message_lookback_epochs(&self) -> ChainEpoch {
        self.max_message_lookback_epochs
    }

    /// Global requests per second; `0` means unlimited.
    #[must_use]
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    #[must_use]
    pub fn global_rate(&self) -> Rate {
        Rate::from_requests_per_second(self.rate_limit)
    }

    #[must_use]
    pub fn rate_limit_timeout(&self) -> Duration {
        self.rate_limit_timeout
    }

    #[must_use]
    pub fn per_connection_rate_limit(&self) -> u32 {
        self.per_connection_rate_limit
    }

    #[must_use]
    pub fn eth_max_filters_per_conn(&self) -> usize {
        self.eth_max_filters_per_conn
    }

    #[must_use]
    pub fn subscription_handler(&self) -> Option<&SubscriptionHandler> {
        self.subscription_handler.as_ref()
    }

    /// The lookback rejection text, formatted once when the policy was built.
    #[must_use]
    pub fn lookback_error_message(&self) -> Arc<str> {
        self.lookback_error.clone()
    }

    /// Bucket for a newly accepted connection, or `None` when connections are not limited.
    ///
    /// The burst never drops below [`TokenCost::MAX_TOKENS`] so every operation class stays
    /// admissible on a single connection.
    #[must_use]
    pub fn new_connection_limiter(&self) -> Option<TokenBucket> {
        if self.per_connection_rate_limit == 0 {
            return None;
        }
        let burst = self.per_connection_rate_limit.max(TokenCost::MAX_TOKENS);
        Some(TokenBucket::per_second(self.per_connection_rate_limit, burst))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for PolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyConfig")
            .field("max_lookback", &self.max_lookback)
            .field("max_message_lookback_epochs", &self.max_message_lookback_epochs)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_timeout", &self.rate_limit_timeout)
            .field("per_connection_rate_limit", &self.per_connection_rate_limit)
            .field("eth_max_filters_per_conn", &self.eth_max_filters_per_conn)
            .field("subscription_handler", &self.subscription_handler.is_some())
            .finish_non_exhaustive()
    }
}

/// Named overrides applied on top of the defaults.
#[derive(Clone)]
pub struct PolicyConfigBuilder {
    max_lookback: Duration,
    max_message_lookback_epochs: ChainEpoch,
    rate_limit: u32,
    rate_limit_timeout: Duration,
    per_connection_rate_limit: u32,
    eth_max_filters_per_conn: usize,
    subscription_handler: Option<SubscriptionHandler>,
}

impl Default for PolicyConfigBuilder {
    fn default() -> Self {
        Self {
            max_lookback: DEFAULT_MAX_LOOKBACK,
            max_message_lookback_epochs: DEFAULT_MAX_MESSAGE_LOOKBACK_EPOCHS,
            rate_limit: 0,
            rate_limit_timeout: DEFAULT_RATE_LIMIT_TIMEOUT,
            per_connection_rate_limit: 0,
            eth_max_filters_per_conn: DEFAULT_ETH_MAX_FILTERS_PER_CONN,
            subscription_handler: None,
        }
    }
}

impl PolicyConfigBuilder {
    #[must_use]
    pub fn max_lookback(mut self, max_lookback: Duration) -> Self {
        self.max_lookback = max_lookback;
        self
    }

    #[must_use]
    pub fn max_message_lookback_epochs(mut self, epochs: ChainEpoch) -> Self {
        self.max_message_lookback_epochs = epochs;
        self
    }

    /// Global requests per second before throttling starts; `0` disables the limit.
    #[must_use]
    pub fn rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limit = requests_per_second;
        self
    }

    #[must_use]
    pub fn rate_limit_timeout(mut self, timeout: Duration) -> Self {
        self.rate_limit_timeout = timeout;
        self
    }

    /// Requests per second each connection may issue; `0` disables per-connection limits.
    #[must_use]
    pub fn per_connection_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.per_connection_rate_limit = requests_per_second;
        self
    }

    #[must_use]
    pub fn eth_max_filters_per_conn(mut self, max_filters: usize) -> Self {
        self.eth_max_filters_per_conn = max_filters;
        self
    }

    #[must_use]
    pub fn subscription_handler(mut self, handler: SubscriptionHandler) -> Self {
        self.subscription_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn build(self) -> PolicyConfig {
        let lookback_error = Arc::from(format!(
            "lookbacks of more than {} are disallowed",
            format_duration(self.max_lookback)
        ));
        PolicyConfig {
            max_lookback: self.max_lookback,
            max_message_lookback_epochs: self.max_message_lookback_epochs,
            rate_limit: self.rate_limit,
            rate_limit_timeout: self.rate_limit_timeout,
            per_connection_rate_limit: self.per_connection_rate_limit,
            eth_max_filters_per_conn: self.eth_max_filters_per_conn,
            subscription_handler: self.subscription_handler,
            lookback_error,
        }
    }
}

/// Compact human form: `24h`, `1h30m`, `45s`, `1s500ms`, `0s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 && millis == 0 {
        return "0s".to_string();
    }

    let parts = [
        (secs / 3600, "h"),
        ((secs % 3600) / 60, "m"),
        (secs % 60, "s"),
        (u64::from(millis), "ms"),
    ];
    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect()
}
