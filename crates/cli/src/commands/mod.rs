pub mod config;
pub mod lookback;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
pub use lookback::{handle_lookback_command, LookbackCommands};
