//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use directories::ProjectDirs;

use crate::state::WarningThresholds;

/// Storage key the snapshot lives under
pub const DEFAULT_STORAGE_KEY: &str = "quiz_timer_state";

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "quiz-timer")]
#[command(about = "Countdown timer service for timed assessments")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Assessment length in minutes
    #[arg(short, long, default_value = "80")]
    pub minutes: f64,

    /// Warning thresholds in remaining minutes
    #[arg(short, long, value_delimiter = ',', default_value = "30,15,5,1")]
    pub warnings: Vec<u32>,

    /// Sampling interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// How often the snapshot is persisted, in seconds
    #[arg(long, default_value = "5")]
    pub autosave_secs: u64,

    /// Directory for the persisted snapshot (defaults to the platform data dir)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Static quiz front-end to serve alongside the API
    #[arg(long)]
    pub serve_dir: Option<PathBuf>,

    /// Start the countdown immediately if nothing was restored
    #[arg(long)]
    pub start: bool,

    /// Ignore any saved snapshot
    #[arg(long)]
    pub fresh: bool,

    /// Open the browser once the server is up
    #[arg(long)]
    pub open: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Resolve where snapshots are stored
    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let proj_dirs = ProjectDirs::from("com", "quiz-timer", "quiz-timer")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Engine and loop settings derived from the CLI
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            warning_thresholds: self.warnings.clone(),
            ..TimerConfig::default()
        }
    }
}

/// Settings for the countdown loop
#[derive(Debug, Clone, PartialEq)]
pub struct TimerConfig {
    pub tick_interval: Duration,
    /// Delay before re-arming after a faulty sample
    pub recovery_delay: Duration,
    /// Delay before retrying a failed visibility-restore cycle
    pub visibility_retry_delay: Duration,
    /// Faulty samples in a row before the timer is forced to stop
    pub max_consecutive_faults: u32,
    pub warning_thresholds: Vec<u32>,
    pub storage_key: String,
}

impl TimerConfig {
    pub fn thresholds(&self) -> WarningThresholds {
        WarningThresholds::new(self.warning_thresholds.iter().copied())
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            recovery_delay: Duration::from_secs(1),
            visibility_retry_delay: Duration::from_millis(500),
            max_consecutive_faults: 3,
            warning_thresholds: vec![30, 15, 5, 1],
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_warning_list() {
        let config = Config::parse_from(["quiz-timer", "--warnings", "10,2", "-m", "45"]);
        assert_eq!(config.warnings, vec![10, 2]);
        assert_eq!(config.minutes, 45.0);
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.timer_config().thresholds().minutes(), &[10, 2]);
    }

    #[test]
    fn defaults_match_exam_window() {
        let config = Config::parse_from(["quiz-timer"]);
        assert_eq!(config.minutes, 80.0);
        assert_eq!(config.warnings, vec![30, 15, 5, 1]);
        assert_eq!(config.timer_config().tick_interval, Duration::from_secs(1));
        assert_eq!(config.log_level(), "info");
    }
}
