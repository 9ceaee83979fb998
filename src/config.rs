//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! below, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RoverMuxError};
use crate::frame::protocol::STATUS_SLOTS;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub mux: MuxConfig,

    #[serde(default)]
    pub uplink: UplinkConfig,

    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Serial port configuration (shared by peripherals and the radio)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
}

/// Device discovery configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_device_dir")]
    pub device_dir: String,

    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,

    /// Path of the radio link; empty disables uplink detection
    #[serde(default = "default_uplink_path")]
    pub uplink_path: Option<String>,

    /// Path of the GNSS correction sink; empty disables it
    #[serde(default = "default_correction_path")]
    pub correction_path: Option<String>,
}

/// Multiplexer configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MuxConfig {
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,

    #[serde(default = "default_heartbeat_period_s")]
    pub heartbeat_period_s: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Uplink dispatcher configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UplinkConfig {
    /// Extra attempts after a failed write (0 = fail on first error)
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Identity source configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_source")]
    pub source: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_read_chunk_bytes() -> usize { 100 }

fn default_device_dir() -> String { "/dev/serial/by-path".to_string() }
fn default_device_prefix() -> String { "platform-3f980000.usb-usb-0:1.".to_string() }
fn default_uplink_path() -> Option<String> {
    Some("/dev/serial/by-path/platform-3f980000.usb-usb-0:1.1.2:1.0-port0".to_string())
}
fn default_correction_path() -> Option<String> {
    Some("/dev/serial/by-path/platform-3f980000.usb-usb-0:1.1.3:1.0-port0".to_string())
}

fn default_max_channels() -> usize { STATUS_SLOTS }
fn default_heartbeat_period_s() -> u64 { 5 }
fn default_queue_capacity() -> usize { 1000 }

fn default_write_retries() -> u32 { 0 }
fn default_retry_delay_ms() -> u64 { 100 }

fn default_identity_source() -> String { crate::identity::DEFAULT_IDENTITY_SOURCE.to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            read_chunk_bytes: default_read_chunk_bytes(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            device_prefix: default_device_prefix(),
            uplink_path: default_uplink_path(),
            correction_path: default_correction_path(),
        }
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_channels: default_max_channels(),
            heartbeat_period_s: default_heartbeat_period_s(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            write_retries: default_write_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            source: default_identity_source(),
        }
    }
}

impl MuxConfig {
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_period_s)
    }
}

impl UplinkConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_mux::config::Config;
    ///
    /// let config = Config::load("config/rover.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Treat empty optional paths as unset
    fn normalize(&mut self) {
        for path in [
            &mut self.discovery.uplink_path,
            &mut self.discovery.correction_path,
        ] {
            if path.as_deref().map(str::is_empty).unwrap_or(false) {
                *path = None;
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.read_chunk_bytes == 0 || self.serial.read_chunk_bytes > 4096 {
            return Err(invalid("read_chunk_bytes must be between 1 and 4096"));
        }

        if self.discovery.device_dir.is_empty() {
            return Err(invalid("discovery device_dir cannot be empty"));
        }

        // Status frames carry exactly four slots
        if self.mux.max_channels == 0 || self.mux.max_channels > STATUS_SLOTS {
            return Err(invalid(format!("max_channels must be between 1 and {}", STATUS_SLOTS)));
        }

        if self.mux.heartbeat_period_s == 0 || self.mux.heartbeat_period_s > 3600 {
            return Err(invalid("heartbeat_period_s must be between 1 and 3600"));
        }

        if self.mux.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be greater than 0"));
        }

        if self.uplink.write_retries > 100 {
            return Err(invalid("write_retries must be at most 100"));
        }

        if self.uplink.retry_delay_ms > 60000 {
            return Err(invalid("retry_delay_ms must be at most 60000"));
        }

        if self.identity.source.is_empty() {
            return Err(invalid("identity source cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> RoverMuxError {
    RoverMuxError::Config(toml::de::Error::custom(msg))
}
