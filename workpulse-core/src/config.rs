//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/workpulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/workpulse/` (~/.config/workpulse/)
//! - State/Logs: `$XDG_STATE_HOME/workpulse/` (~/.local/state/workpulse/)

use crate::error::{Error, Result};
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Analysis thresholds and calendar settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Analysis cache sizing and freshness
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background aggregation behaviour
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Calendar and reporting settings used by the analyzer
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Offset from UTC (minutes) used to assign activity to calendar days and hours
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Expected hours per week before overtime starts
    #[serde(default = "default_standard_week_hours")]
    pub standard_week_hours: u32,

    /// Daily work goal in hours
    #[serde(default = "default_daily_goal_hours")]
    pub daily_goal_hours: u32,

    /// Longest range a pattern analysis will cover
    #[serde(default = "default_max_pattern_days")]
    pub max_pattern_days: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            standard_week_hours: default_standard_week_hours(),
            daily_goal_hours: default_daily_goal_hours(),
            max_pattern_days: default_max_pattern_days(),
        }
    }
}

impl AnalysisConfig {
    /// Configured offset, `None` when it is not a valid UTC offset.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Timezone used for day and hour bucketing.
    ///
    /// Out-of-range offsets fall back to UTC.
    pub fn timezone(&self) -> FixedOffset {
        self.utc_offset().unwrap_or_else(|| Utc.fix())
    }

    pub fn standard_week(&self) -> Duration {
        Duration::hours(i64::from(self.standard_week_hours))
    }

    pub fn daily_goal(&self) -> Duration {
        Duration::hours(i64::from(self.daily_goal_hours))
    }
}

fn default_standard_week_hours() -> u32 {
    40
}

fn default_daily_goal_hours() -> u32 {
    8
}

fn default_max_pattern_days() -> u32 {
    90
}

/// Analysis cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Minutes an entry stays fresh after being written
    #[serde(default = "default_cache_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Entry count above which the oldest tenth is evicted
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Days of day/week entries kept by the maintenance pass
    #[serde(default = "default_cache_retention_days")]
    pub retention_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_cache_ttl_minutes(),
            max_entries: default_cache_max_entries(),
            retention_days: default_cache_retention_days(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes as i64)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }
}

fn default_cache_ttl_minutes() -> u64 {
    30
}

fn default_cache_max_entries() -> usize {
    500
}

fn default_cache_retention_days() -> u32 {
    7
}

/// Aggregation coordinator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// Enable/disable the periodic catch-all pass
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minutes between periodic aggregation passes
    #[serde(default = "default_aggregation_interval")]
    pub interval_minutes: u64,

    /// Minutes between cache maintenance passes
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_minutes: u64,

    /// Capacity of the activity event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Hours covered by the first aggregation pass after startup
    #[serde(default = "default_initial_lookback")]
    pub initial_lookback_hours: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: default_aggregation_interval(),
            maintenance_minutes: default_maintenance_interval(),
            queue_capacity: default_queue_capacity(),
            initial_lookback_hours: default_initial_lookback(),
        }
    }
}

impl AggregationConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn maintenance_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.maintenance_minutes * 60)
    }

    pub fn initial_lookback(&self) -> Duration {
        Duration::hours(i64::from(self.initial_lookback_hours))
    }
}

fn default_true() -> bool {
    true
}

fn default_aggregation_interval() -> u64 {
    15
}

fn default_maintenance_interval() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    256
}

fn default_initial_lookback() -> u32 {
    24
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(Error::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.aggregation.queue_capacity == 0 {
            return Err(Error::Config(
                "aggregation.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.aggregation.interval_minutes == 0 || self.aggregation.maintenance_minutes == 0 {
            return Err(Error::Config(
                "aggregation intervals must be at least 1 minute".to_string(),
            ));
        }
        if self.analysis.max_pattern_days == 0 {
            return Err(Error::Config(
                "analysis.max_pattern_days must be at least 1".to_string(),
            ));
        }
        if self.analysis.utc_offset().is_none() {
            return Err(Error::Config(format!(
                "analysis.utc_offset_minutes out of range: {}",
                self.analysis.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/workpulse/config.toml` (~/.config/workpulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("workpulse").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/workpulse/` (~/.local/state/workpulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("workpulse")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
