//! # Configuration Management Module
//!
//! TOML configuration for the capture daemon, with defaults matching the camera
//! firmware (115200 baud, 2 KiB reads, 1 KiB idle bound, 1 MiB capturing bound).
//!
//! ## Configuration Structure
//!
//! - [`SerialConfig`] - port, baud rate, read timeout and open settle delay
//! - [`CaptureConfig`] - chunk size, buffer bounds, destination and naming policy
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use camcap::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     println!("Serial Port: {}", config.serial.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [capture]
//! output_dir = "captures"
//! file_name = "latest.jpg"
//! naming = "overwrite"   # overwrite | sequence | timestamp
//!
//! [logging]
//! level = "info"
//! ```
//!
//! CLI arguments override file values, which override defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::capture::guard::{DEFAULT_CAPTURING_CAP, DEFAULT_IDLE_CAP};
use crate::capture::{ArtifactNamer, CaptureError, NamingPolicy, OverflowGuard};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Longest a single read blocks before returning empty (ms).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Settle time after opening, before the input buffer is cleared (ms).
    #[serde(default = "default_open_delay_ms")]
    pub open_delay_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_open_delay_ms() -> u64 {
    500
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            open_delay_ms: default_open_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Maximum bytes requested per read.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Buffer bound while waiting for a frame start.
    #[serde(default = "default_idle_cap")]
    pub idle_cap: usize,
    /// Buffer bound while waiting for a frame end.
    #[serde(default = "default_capturing_cap")]
    pub capturing_cap: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Base file name; stem and extension feed the naming policy.
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default)]
    pub naming: NamingPolicy,
    /// Destination for `camcap log` passthrough captures.
    #[serde(default = "default_raw_log_file")]
    pub raw_log_file: String,
}

fn default_chunk_size() -> usize {
    2048
}

fn default_idle_cap() -> usize {
    DEFAULT_IDLE_CAP
}

fn default_capturing_cap() -> usize {
    DEFAULT_CAPTURING_CAP
}

fn default_output_dir() -> String {
    "captures".to_string()
}

fn default_file_name() -> String {
    "latest.jpg".to_string()
}

fn default_raw_log_file() -> String {
    "captures/log.log".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            idle_cap: default_idle_cap(),
            capturing_cap: default_capturing_cap(),
            output_dir: default_output_dir(),
            file_name: default_file_name(),
            naming: NamingPolicy::default(),
            raw_log_file: default_raw_log_file(),
        }
    }
}

impl CaptureConfig {
    pub fn guard(&self) -> OverflowGuard {
        OverflowGuard {
            idle_cap: self.idle_cap,
            capturing_cap: self.capturing_cap,
        }
    }

    pub fn namer(&self) -> ArtifactNamer {
        ArtifactNamer::new(&self.output_dir, &self.file_name, self.naming)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed level; unknown strings fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the capture loop cannot run with.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.capture.chunk_size == 0 {
            return Err(CaptureError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(CaptureError::InvalidConfig(
                "baud_rate must be greater than zero".to_string(),
            ));
        }
        if self.capture.output_dir.trim().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "output_dir must not be empty".to_string(),
            ));
        }
        self.capture.guard().validate()
    }
}
