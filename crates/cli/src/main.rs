use anyhow::Context;
use chaingate_core::{
    config::{GatewaySettings, LoggingConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH},
    logging::init_logging,
    metrics::init_metrics,
};
use clap::{Parser, Subcommand};

mod commands;
use commands::{handle_config_command, handle_lookback_command, ConfigCommands, LookbackCommands};

#[derive(Parser)]
#[command(name = "chaingate-cli")]
#[command(about = "Chaingate CLI - configuration and policy tooling for the chain gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file supplying the [logging] and [metrics] sections
    /// (defaults to $CHAINGATE_CONFIG, then config/config.toml)
    #[arg(long = "config", global = true)]
    config_file: Option<String>,

    /// Override the configured log level for gateway crates
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured log format ("json" or "pretty")
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Lookback Window Checks
    #[command(subcommand)]
    Lookback(LookbackCommands),
}

/// Settings for the process itself. A broken file must not stop `config validate` from
/// reporting it, so load errors fall back to defaults and are returned for logging.
fn runtime_settings(config: Option<&str>) -> (GatewaySettings, Option<String>) {
    let path = config.map_or_else(
        || std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        str::to_string,
    );
    match GatewaySettings::from_file(&path) {
        Ok(settings) => (settings, None),
        Err(e) => (GatewaySettings::default(), Some(format!("{path}: {e}"))),
    }
}

fn logging_config(
    settings: &GatewaySettings,
    level: Option<String>,
    format: Option<String>,
) -> LoggingConfig {
    LoggingConfig {
        level: level.unwrap_or_else(|| settings.logging.level.clone()),
        format: format.unwrap_or_else(|| settings.logging.format.clone()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, load_error) = runtime_settings(cli.config_file.as_deref());
    init_logging(&logging_config(&settings, cli.log_level, cli.log_format));
    if let Some(error) = load_error {
        tracing::warn!(%error, "using default logging and metrics settings");
    }
    let metrics = init_metrics(&settings.metrics);
    tracing::debug!(metrics_enabled = metrics.is_some(), "chaingate-cli starting");

    match cli.command {
        Commands::Config(command) => {
            handle_config_command(command).context("config command failed")?;
        }
        Commands::Lookback(command) => {
            handle_lookback_command(command).context("lookback command failed")?;
        }
    }

    Ok(())
}
