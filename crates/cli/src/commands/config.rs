use chaingate_core::config::{format_duration, GatewaySettings, DEFAULT_CONFIG_PATH};
use clap::Subcommand;
use std::path::Path;

use super::utils::{enabled, print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        file: String,
    },

    /// Show the effective configuration (file plus environment overrides)
    Show {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        file: String,

        /// Print as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path for the config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file, json } => show_config(&file, json),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let settings = GatewaySettings::from_file(file)?;

    print_info("Validating configuration...");
    settings.validate()?;

    print_success("Configuration is valid!");

    let policy = settings.policy();
    println!("Configuration Summary:");
    println!("  Environment: {}", settings.environment);
    println!("  Max Lookback: {}", format_duration(policy.max_lookback()));
    println!("  Global Rate Limit: {}", rate_label(policy.rate_limit()));
    println!("  Per-Connection Rate Limit: {}", rate_label(policy.per_connection_rate_limit()));
    println!("  Metrics: {}", enabled(settings.metrics.enabled));

    Ok(())
}

fn show_config(file: &str, json: bool) -> CliResult<()> {
    let settings = GatewaySettings::from_file(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let policy = settings.policy();
    println!("Configuration from {file}:");

    println!("\n[Policy]");
    println!("  Max Lookback: {}", format_duration(policy.max_lookback()));
    println!("  Max Message Lookback: {} epochs", policy.max_message_lookback_epochs());
    println!("  Rate Limit: {}", rate_label(policy.rate_limit()));
    println!("  Rate Limit Timeout: {}", format_duration(policy.rate_limit_timeout()));
    println!("  Per-Connection Rate Limit: {}", rate_label(policy.per_connection_rate_limit()));
    println!("  Eth Filters Per Connection: {}", policy.eth_max_filters_per_conn());

    println!("\n[Metrics]");
    println!("  Enabled: {}", settings.metrics.enabled);

    println!("\n[Logging]");
    println!("  Level: {}", settings.logging.level);
    println!("  Format: {}", settings.logging.format);

    Ok(())
}

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    let path = Path::new(output);
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    let body = toml::to_string_pretty(&GatewaySettings::default())?;
    let contents = format!(
        "# Chaingate gateway configuration\n\
         # Every value below is the compiled default. Any of them can be overridden with\n\
         # CHAINGATE__<SECTION>__<FIELD>, e.g. CHAINGATE__POLICY__RATE_LIMIT=200.\n\
         # rate_limit = 0 and per_connection_rate_limit = 0 disable throttling.\n\n{body}"
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;

    print_success(&format!("Configuration written to {output}"));
    Ok(())
}

fn rate_label(requests_per_second: u32) -> String {
    if requests_per_second == 0 {
        "unlimited".to_string()
    } else {
        format!("{requests_per_second} req/s")
    }
}
