//! # Error Types
//!
//! Custom error types for Rover Mux using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Mux
#[derive(Debug, Error)]
pub enum RoverMuxError {
    /// Frame protocol errors (malformed or truncated frames)
    #[error("Frame protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors (open/configure failures)
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Channel ID outside the monitored range
    #[error("Invalid device channel {0} (must be 1-4)")]
    InvalidChannel(u16),

    /// Uplink write failed after all retry attempts
    #[error("Uplink write failed after {attempts} attempt(s): {source}")]
    UplinkFailed {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Rover Mux
pub type Result<T> = std::result::Result<T, RoverMuxError>;
