//! Meter configuration
//!
//! The PCM format and loop timing are explicit values validated once at
//! startup; devices are then checked against them when opened.
//!
//! # Example
//!
//! ```
//! use decibels_lib::config::MeterConfig;
//!
//! let config = MeterConfig::default();
//! config.validate().unwrap();
//! assert_eq!(config.sample_rate, 22050);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value outside its valid range
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Largest pool the cycler accepts; latency grows with every extra buffer
pub const MAX_BUFFERS: usize = 8;

/// Meter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Sample rate in Hz, shared by capture and playback
    pub sample_rate: u32,
    /// Channel count; only mono is supported
    pub channels: u16,
    /// Samples per block (2500 @ 22050 Hz ≈ 113 ms)
    pub block_capacity: usize,
    /// Number of playback buffers cycled
    pub buffers: usize,
    /// Smoothing coefficient α in [0, 1)
    pub smoothing: f64,
    /// Pause between loop iterations, in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive polls without a finished buffer before an underflow is reported
    pub stall_warn_polls: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
            block_capacity: 2500,
            buffers: 2,
            smoothing: 0.4,
            poll_interval_ms: 100,
            stall_warn_polls: 20,
        }
    }
}

impl MeterConfig {
    /// Check every field, returning the first violation
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if self.channels != 1 {
            return Err(invalid(
                "channels",
                format!("only mono is supported, got {}", self.channels),
            ));
        }
        if self.block_capacity == 0 {
            return Err(invalid("block_capacity", "must be positive"));
        }
        if !(2..=MAX_BUFFERS).contains(&self.buffers) {
            return Err(invalid(
                "buffers",
                format!("must be between 2 and {}, got {}", MAX_BUFFERS, self.buffers),
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(invalid(
                "smoothing",
                format!("must be in [0, 1), got {}", self.smoothing),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be positive"));
        }
        if self.stall_warn_polls == 0 {
            return Err(invalid("stall_warn_polls", "must be positive"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Playback duration of one full block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_capacity as f64 / self.sample_rate as f64)
    }

    /// Upper bound on latency added by the buffer pool
    pub fn max_added_latency(&self) -> Duration {
        self.block_duration() * (self.buffers as u32 - 1)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
