//! Command line arguments for the control-room binary
//!
//! Every option can also come from the TOML configuration file; values given
//! on the command line take precedence.

use crate::coordinator::api::CoordinatorConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "walkin")]
#[command(about = "Walk-in queue control room")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Force colored output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Base URL of the external notifier (POST {url}/notify)
    #[arg(long = "notifier-url", value_name = "URL")]
    pub notifier_url: Option<String>,

    /// Notifier call timeout in seconds
    #[arg(long = "notifier-timeout", value_name = "SECONDS")]
    pub notifier_timeout: Option<u64>,

    /// Cooldown between admissions for the same mobile, in seconds
    #[arg(long = "dedupe-window", value_name = "SECONDS")]
    pub dedupe_window: Option<u64>,

    /// Base URL used to build queue join links
    #[arg(long = "app-base-url", value_name = "URL")]
    pub app_base_url: Option<String>,

    /// Served tokens sampled for wait estimates
    #[arg(long = "history-sample", value_name = "COUNT")]
    pub history_sample: Option<usize>,

    /// Minutes per person assumed before any token has been served
    #[arg(long = "minutes-per-person", value_name = "MINUTES")]
    pub default_minutes_per_person: Option<u32>,

    /// Undelivered events a viewer may hold before it is dropped
    #[arg(long = "fanout-capacity", value_name = "COUNT")]
    pub fanout_capacity: Option<usize>,

    /// Notifications that may wait for the sender before new ones are dropped
    #[arg(long = "dispatch-capacity", value_name = "COUNT")]
    pub dispatch_capacity: Option<usize>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(true)` for --color, `Some(false)` for --no-color, `None` for auto
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Log file as a string, with the magic value `none` meaning no file
    pub fn log_file_path(&self) -> Option<String> {
        self.log_file
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| !p.eq_ignore_ascii_case("none") && p != "-")
    }

    /// Merge the given options over the built-in defaults
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let defaults = CoordinatorConfig::default();
        CoordinatorConfig {
            dedupe_window: self
                .dedupe_window
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedupe_window),
            history_sample: self.history_sample.unwrap_or(defaults.history_sample),
            default_minutes_per_person: self
                .default_minutes_per_person
                .unwrap_or(defaults.default_minutes_per_person),
            fanout_capacity: self.fanout_capacity.unwrap_or(defaults.fanout_capacity),
            notifier_timeout: self
                .notifier_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.notifier_timeout),
            dispatch_capacity: self.dispatch_capacity.unwrap_or(defaults.dispatch_capacity),
            app_base_url: self
                .app_base_url
                .clone()
                .unwrap_or(defaults.app_base_url),
            notifier_url: self.notifier_url.clone().or(defaults.notifier_url),
        }
    }
}
