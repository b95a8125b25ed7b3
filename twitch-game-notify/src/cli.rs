use std::path::PathBuf;

use clap::Parser;

use crate::logging::LogLevel;

/// Notify when Twitch streamers play games you care about.
#[derive(Parser, Debug, Clone)]
#[command(name = "twitch-game-notify", author, version, about, long_about = None)]
pub struct Args {
    /// How much to log
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Warning)]
    pub log_level: LogLevel,

    /// Check every streamer once and exit
    #[arg(long)]
    pub one_shot: bool,

    /// Print notifications to the terminal instead of the desktop
    #[arg(long)]
    pub print_to_terminal: bool,

    /// Neither read nor write the name cache
    #[arg(long)]
    pub no_caching: bool,

    /// Remove a stale cache lock and exit
    #[arg(long)]
    pub remove_cache_lock: bool,

    /// Print an example config file and exit
    #[arg(long)]
    pub print_example_config: bool,

    /// Path to the config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
