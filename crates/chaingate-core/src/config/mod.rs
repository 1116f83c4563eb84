//! Gateway configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//!
//! 1. **Compiled defaults**: the `DEFAULT_*` constants in [`policy`]
//! 2. **Config file**: TOML file named by `CHAINGATE_CONFIG` (default `config/config.toml`)
//! 3. **Environment variables**: `CHAINGATE__<SECTION>__<FIELD>`, e.g.
//!    `CHAINGATE__POLICY__RATE_LIMIT=200`
//!
//! The file form ([`GatewaySettings`]) is plain data. It converts into the runtime
//! [`PolicyConfig`] through [`GatewaySettings::policy_builder`], where process-local values
//! such as the subscription handler can still be attached.
//!
//! # Example
//!
//! ```toml
//! environment = "production"
//!
//! [policy]
//! max_lookback_seconds = 86400
//! max_message_lookback_epochs = 20
//! rate_limit = 500
//! rate_limit_timeout_ms = 5000
//! per_connection_rate_limit = 50
//! eth_max_filters_per_conn = 16
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

pub mod policy;

pub use policy::{
    format_duration, PolicyConfig, PolicyConfigBuilder, SubscriptionHandler,
    DEFAULT_ETH_MAX_FILTERS_PER_CONN, DEFAULT_MAX_LOOKBACK, DEFAULT_MAX_MESSAGE_LOOKBACK_EPOCHS,
    DEFAULT_RATE_LIMIT_TIMEOUT,
};

use crate::chain::ChainEpoch;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CHAINGATE_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// File form of the policy tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Wall-clock lookback window in seconds. Must be greater than 0. Defaults to `86400`.
    pub max_lookback_seconds: u64,

    /// Epochs a message search may reach back. Must not be negative. Defaults to `20`.
    pub max_message_lookback_epochs: ChainEpoch,

    /// Global requests per second; `0` disables the limit. Defaults to `0`.
    pub rate_limit: u32,

    /// Longest a request may wait for tokens, in milliseconds. Defaults to `5000`.
    pub rate_limit_timeout_ms: u64,

    /// Requests per second per connection; `0` disables the limit. Defaults to `0`.
    pub per_connection_rate_limit: u32,

    /// Ethereum filters and subscriptions per websocket connection. Defaults to `16`.
    pub eth_max_filters_per_conn: usize,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_lookback_seconds: DEFAULT_MAX_LOOKBACK.as_secs(),
            max_message_lookback_epochs: DEFAULT_MAX_MESSAGE_LOOKBACK_EPOCHS,
            rate_limit: 0,
            rate_limit_timeout_ms: 5000,
            per_connection_rate_limit: 0,
            eth_max_filters_per_conn: DEFAULT_ETH_MAX_FILTERS_PER_CONN,
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level for gateway crates (e.g. "info", "debug"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Metrics export configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder. Defaults to `true`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Root configuration loaded from file and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Deployment environment label. Defaults to `"development"`.
    pub environment: String,

    pub policy: PolicySettings,

    pub logging: LoggingConfig,

    pub metrics: MetricsConfig,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            policy: PolicySettings::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl GatewaySettings {
    /// Loads a TOML file (optional) with `CHAINGATE__*` environment overrides on top.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] if the file cannot be parsed or a value has the wrong
    /// type.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let policy = defaults.policy;
        let settings = Config::builder()
            .set_default("environment", defaults.environment)?
            .set_default("policy.max_lookback_seconds", to_i64(policy.max_lookback_seconds))?
            .set_default("policy.max_message_lookback_epochs", policy.max_message_lookback_epochs)?
            .set_default("policy.rate_limit", i64::from(policy.rate_limit))?
            .set_default("policy.rate_limit_timeout_ms", to_i64(policy.rate_limit_timeout_ms))?
            .set_default(
                "policy.per_connection_rate_limit",
                i64::from(policy.per_connection_rate_limit),
            )?
            .set_default(
                "policy.eth_max_filters_per_conn",
                i64::try_from(policy.eth_max_filters_per_conn).unwrap_or(i64::MAX),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("metrics.enabled", defaults.metrics.enabled)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("CHAINGATE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Loads from `CHAINGATE_CONFIG`, falling back to `config/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(config_path)
    }

    /// Checks values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.policy.max_lookback_seconds == 0 {
            return Err(SettingsError::Invalid("Max lookback must be greater than 0".to_string()));
        }

        if self.policy.max_message_lookback_epochs < 0 {
            return Err(SettingsError::Invalid(
                "Max message lookback epochs must not be negative".to_string(),
            ));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(SettingsError::Invalid(
                "Logging format must be 'json' or 'pretty'".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn max_lookback(&self) -> Duration {
        Duration::from_secs(self.policy.max_lookback_seconds)
    }

    #[must_use]
    pub fn rate_limit_timeout(&self) -> Duration {
        Duration::from_millis(self.policy.rate_limit_timeout_ms)
    }

    /// Builder preloaded with the file values.
    #[must_use]
    pub fn policy_builder(&self) -> PolicyConfigBuilder {
        PolicyConfig::builder()
            .max_lookback(self.max_lookback())
            .max_message_lookback_epochs(self.policy.max_message_lookback_epochs)
            .rate_limit(self.policy.rate_limit)
            .rate_limit_timeout(self.rate_limit_timeout())
            .per_connection_rate_limit(self.policy.per_connection_rate_limit)
            .eth_max_filters_per_conn(self.policy.eth_max_filters_per_conn)
    }

    #[must_use]
    pub fn policy(&self) -> PolicyConfig {
        self.policy_builder().build()
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
