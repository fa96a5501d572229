//! services/watcher/src/config.rs
//!
//! Defines the watcher's configuration structure and loading logic.
//!
//! Scheduling knobs come from the command line. Endpoints, the browser command
//! and the log level come from environment variables; the `.env` file is used
//! for local setups.

use clap::Parser;
use owl_watcher_core::ClosePolicy;
use std::time::Duration;
use tracing::Level;

const DEFAULT_SCHEDULE_URL: &str = "https://api.overwatchleague.com/schedule";
const DEFAULT_STREAM_URL: &str = "https://overwatchleague.com/en-us/";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid value for --{0}: {1}")]
    InvalidArgument(String, String),
}

/// Command line flags.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "owl-watcher",
    version,
    about = "Opens the league stream around scheduled matches"
)]
pub struct Cli {
    /// How early to open the stream, in seconds
    #[arg(long = "open", value_name = "SECONDS", default_value_t = 300)]
    pub open_margin: u64,

    /// How late to close the stream, in seconds
    #[arg(long = "close", value_name = "SECONDS", default_value_t = 1800)]
    pub close_margin: u64,

    /// How often to re-check the schedule, in seconds (0 sleeps straight to each deadline)
    #[arg(long = "update", value_name = "SECONDS", default_value_t = 300)]
    pub update_interval: u64,

    /// Mute the stream after opening it
    #[arg(long)]
    pub mute: bool,

    /// Never let a window's close time move earlier while merging matches
    #[arg(long)]
    pub monotonic_close: bool,

    /// Print the upcoming viewing windows and exit
    #[arg(long)]
    pub list: bool,
}

/// Holds all configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub schedule_url: String,
    pub stream_url: String,
    /// Program and arguments used to show the stream. `None` picks a platform default.
    pub browser_command: Option<Vec<String>>,
    pub mute_command: Option<Vec<String>>,
    pub log_level: Level,
    pub open_margin: chrono::Duration,
    pub close_margin: chrono::Duration,
    /// `None` means exact-sleep: wait straight to each deadline and never refetch.
    pub poll_interval: Option<Duration>,
    pub mute: bool,
    pub close_policy: ClosePolicy,
    pub list_only: bool,
}

impl Config {
    /// Resolves configuration from the parsed flags and the process environment.
    ///
    /// The `.env` file is skipped in test builds so tests stay hermetic.
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_sources(cli, |key| std::env::var(key).ok())
    }

    /// Builds a `Config` from flags and an arbitrary variable lookup.
    pub fn from_sources<F>(cli: Cli, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Endpoints ---
        let schedule_url =
            var("SCHEDULE_URL").unwrap_or_else(|| DEFAULT_SCHEDULE_URL.to_string());
        let stream_url = var("STREAM_URL").unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());

        // --- External commands ---
        let browser_command = var("BROWSER_COMMAND")
            .map(|raw| split_command("BROWSER_COMMAND", &raw))
            .transpose()?;
        let mute_command = var("MUTE_COMMAND")
            .map(|raw| split_command("MUTE_COMMAND", &raw))
            .transpose()?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Scheduling ---
        let open_margin = margin("open", cli.open_margin)?;
        let close_margin = margin("close", cli.close_margin)?;
        let poll_interval = match cli.update_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let close_policy = if cli.monotonic_close {
            ClosePolicy::Max
        } else {
            ClosePolicy::LastWrite
        };

        Ok(Self {
            schedule_url,
            stream_url,
            browser_command,
            mute_command,
            log_level,
            open_margin,
            close_margin,
            poll_interval,
            mute: cli.mute,
            close_policy,
            list_only: cli.list,
        })
    }
}

fn margin(flag: &str, secs: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| {
            ConfigError::InvalidArgument(
                flag.to_string(),
                format!("{} seconds is out of range", secs),
            )
        })
}

fn split_command(name: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "command is empty".to_string(),
        ));
    }
    Ok(parts)
}
