use async_trait::async_trait;
use chaingate_core::{
    chain::{BackendError, ChainBackend, ChainEpoch, TipSet, TipSetKey, DEFAULT_BLOCK_DELAY_SECS},
    config::{format_duration, GatewaySettings, DEFAULT_CONFIG_PATH},
    lookback::{estimate_time_at_height, Clock, FixedClock, LookbackValidator, SystemClock},
};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use super::utils::{print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum LookbackCommands {
    /// Check a height or timestamp against the configured lookback window
    Check {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        file: String,

        /// Height of the reference tip set
        #[arg(long)]
        tip_height: ChainEpoch,

        /// Unix timestamp of the reference tip set (defaults to now)
        #[arg(long)]
        tip_timestamp: Option<u64>,

        /// Height to check against the reference tip set
        #[arg(long, conflicts_with = "timestamp")]
        height: Option<ChainEpoch>,

        /// Unix timestamp to check directly
        #[arg(long)]
        timestamp: Option<u64>,

        /// Seconds between epochs
        #[arg(long, default_value_t = DEFAULT_BLOCK_DELAY_SECS)]
        block_delay: u64,

        /// Evaluate as if the current time were this Unix timestamp
        #[arg(long)]
        now: Option<u64>,
    },
}

/// Inputs for one offline lookback evaluation.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub tip_height: ChainEpoch,
    pub tip_timestamp: Option<u64>,
    pub height: Option<ChainEpoch>,
    pub timestamp: Option<u64>,
    pub block_delay: u64,
    pub now: Option<u64>,
}

pub fn handle_lookback_command(command: LookbackCommands) -> CliResult<()> {
    match command {
        LookbackCommands::Check {
            file,
            tip_height,
            tip_timestamp,
            height,
            timestamp,
            block_delay,
            now,
        } => {
            let settings = GatewaySettings::from_file(&file)?;
            settings.validate()?;
            let request =
                CheckRequest { tip_height, tip_timestamp, height, timestamp, block_delay, now };
            check(&settings, &request)
        }
    }
}

/// Backend for evaluating checks without a node: it knows the block delay and nothing else.
struct OfflineChain {
    block_delay_secs: u64,
}

#[async_trait]
impl ChainBackend for OfflineChain {
    async fn chain_get_tipset(&self, key: &TipSetKey) -> Result<TipSet, BackendError> {
        Err(BackendError::Unavailable(format!("no node to resolve {key}")))
    }

    fn block_delay_secs(&self) -> u64 {
        self.block_delay_secs
    }
}

fn check(settings: &GatewaySettings, request: &CheckRequest) -> CliResult<()> {
    let clock: Arc<dyn Clock> = match request.now {
        Some(secs) => Arc::new(FixedClock::new(unix(secs)?)),
        None => Arc::new(SystemClock),
    };
    let now = clock.now();
    let policy = settings.policy();
    let backend = Arc::new(OfflineChain { block_delay_secs: request.block_delay });
    let validator = LookbackValidator::with_clock(&policy, backend, clock);

    print_info(&format!("Lookback window: {}", format_duration(validator.max_lookback())));

    if let Some(secs) = request.timestamp {
        let at = unix(secs)?;
        print_info(&format!("Checking timestamp {}", display_time(at)));
        validator.check_timestamp(at)?;
        print_success(&format!("{} is inside the window", display_time(at)));
        return Ok(());
    }

    let height = request.height.ok_or_else(|| {
        CliError::General("either --height or --timestamp is required".to_string())
    })?;
    let tip_time = match request.tip_timestamp {
        Some(secs) => unix(secs)?,
        None => now,
    };
    let tip = TipSet::single("reference", request.tip_height, secs_since_epoch(tip_time));

    if height <= request.tip_height {
        let estimated =
            estimate_time_at_height(tip_time, request.tip_height, height, request.block_delay);
        print_info(&format!("Estimated time at height {height}: {}", display_time(estimated)));
    }

    validator.check_tipset_height(&tip, height)?;
    print_success(&format!("Height {height} is inside the window"));
    Ok(())
}

/// Converts a user-supplied Unix timestamp, rejecting values outside the calendar range.
fn unix(secs: u64) -> CliResult<SystemTime> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(SystemTime::from)
        .ok_or_else(|| CliError::General(format!("timestamp {secs} is out of range")))
}

fn secs_since_epoch(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

fn display_time(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339()
}
