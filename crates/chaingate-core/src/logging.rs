//! `tracing` subscriber setup.

use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const GATEWAY_TARGETS: [&str; 3] = ["chaingate_core", "chaingate_cli", "tests"];

/// Builds the filter: `RUST_LOG` wins when set, otherwise `warn` globally and the configured
/// level for gateway crates.
#[must_use]
pub fn build_filter(level: &str) -> EnvFilter {
    let gateway_filter = |level: &str| {
        let targets: Vec<String> = GATEWAY_TARGETS.iter().map(|t| format!("{t}={level}")).collect();
        EnvFilter::new(format!("warn,{}", targets.join(",")))
    };

    match std::env::var("RUST_LOG") {
        Ok(env_filter) if env_filter == "debug" || env_filter == "trace" => {
            gateway_filter(&env_filter)
        }
        Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| gateway_filter("debug")),
        Err(_) => gateway_filter(level),
    }
}

/// Installs the global subscriber. Returns `false` if one was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level));

    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init().is_ok()
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).try_init().is_ok()
    }
}
