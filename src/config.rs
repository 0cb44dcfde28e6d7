//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::capture::CaptureFormat;
use crate::session::SessionConfig;

/// Lowest and highest 2.4 GHz O-QPSK channels
pub const MIN_CHANNEL: u8 = 11;
pub const MAX_CHANNEL: u8 = 26;

/// Invalid or missing configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("channel {0} is outside 11-26")]
    ChannelOutOfRange(u8),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial device path, or "-" to read telemetry from stdin
    pub device: String,

    /// Serial baud rate
    pub baud_rate: u32,

    /// FIFO (or file) the capture stream is written to. Must already exist.
    pub fifo: PathBuf,

    /// Radio channel the sniffer is tuned to
    pub channel: u8,

    /// Output container layout
    pub format: CaptureFormat,

    /// Max captured bytes per record
    pub snaplen: u32,

    /// Bounded frame queue capacity
    pub queue_capacity: usize,

    /// Writer receive timeout in milliseconds
    pub writer_poll_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, then validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            device: lookup("SNIFFER_DEVICE").unwrap_or_else(|| "/dev/ttyUSB0".to_string()),

            baud_rate: parse_or(&lookup, "SNIFFER_BAUD", 1_000_000)?,

            fifo: lookup("CAPTURE_FIFO")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .ok_or(ConfigError::Missing("CAPTURE_FIFO"))?,

            channel: parse_or(&lookup, "CAPTURE_CHANNEL", MIN_CHANNEL)?,

            format: parse_or(&lookup, "CAPTURE_FORMAT", CaptureFormat::default())?,

            snaplen: parse_or(&lookup, "CAPTURE_SNAPLEN", 262_144)?,

            queue_capacity: parse_or(&lookup, "QUEUE_CAPACITY", 256)?,

            writer_poll_ms: parse_or(&lookup, "WRITER_POLL_MS", 1000)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&self.channel) {
            return Err(ConfigError::ChannelOutOfRange(self.channel));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Zero("SNIFFER_BAUD"));
        }
        if self.snaplen == 0 {
            return Err(ConfigError::Zero("CAPTURE_SNAPLEN"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("QUEUE_CAPACITY"));
        }
        if self.writer_poll_ms == 0 {
            return Err(ConfigError::Zero("WRITER_POLL_MS"));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            channel: self.channel,
            format: self.format,
            snaplen: self.snaplen,
            queue_capacity: self.queue_capacity,
            writer_poll: Duration::from_millis(self.writer_poll_ms),
        }
    }
}

/// Parse a variable if set, otherwise use the default
fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
