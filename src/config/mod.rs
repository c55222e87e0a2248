//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on malformed values. Every presence
//! setting has a documented default, so an empty environment is valid.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default idle time before a technician is moved to `Break` (15 min).
pub const DEFAULT_IDLE_BREAK_THRESHOLD_MS: u64 = 900_000;
/// Default idle time before a technician is marked `Offline` (60 min).
pub const DEFAULT_IDLE_OFFLINE_THRESHOLD_MS: u64 = 3_600_000;
/// Default period of the background heartbeat (30 s).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Timer settings for technician sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    pub idle_break_threshold: Duration,
    pub idle_offline_threshold: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_break_threshold: Duration::from_millis(DEFAULT_IDLE_BREAK_THRESHOLD_MS),
            idle_offline_threshold: Duration::from_millis(DEFAULT_IDLE_OFFLINE_THRESHOLD_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl PresenceConfig {
    /// Check that every period is non-zero and break comes before offline.
    pub fn validate(&self) -> Result<()> {
        if self.idle_break_threshold.is_zero()
            || self.idle_offline_threshold.is_zero()
            || self.heartbeat_interval.is_zero()
        {
            return Err(Error::Config("presence durations must be non-zero".into()));
        }
        if self.idle_break_threshold >= self.idle_offline_threshold {
            return Err(Error::Config(format!(
                "idle break threshold ({:?}) must be shorter than idle offline threshold ({:?})",
                self.idle_break_threshold, self.idle_offline_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Config {
    pub presence: PresenceConfig,
    pub roster_file: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let presence = PresenceConfig {
            idle_break_threshold: millis_var(
                "PRESENCE_IDLE_BREAK_MS",
                DEFAULT_IDLE_BREAK_THRESHOLD_MS,
            )?,
            idle_offline_threshold: millis_var(
                "PRESENCE_IDLE_OFFLINE_MS",
                DEFAULT_IDLE_OFFLINE_THRESHOLD_MS,
            )?,
            heartbeat_interval: millis_var("PRESENCE_HEARTBEAT_MS", DEFAULT_HEARTBEAT_INTERVAL_MS)?,
        };
        presence.validate()?;

        Ok(Self {
            presence,
            roster_file: std::env::var("PRESENCE_ROSTER_FILE").ok().map(PathBuf::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn millis_var(name: &str, default: u64) -> Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => parse_millis(name, &raw),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

fn parse_millis(name: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::Config(format!("{name} must be a number of milliseconds: {e}")))
}
