//! # Rover Mux Library
//!
//! Rover-side telemetry multiplexer.
//!
//! This library discovers the rover's USB-serial peripherals, wraps every
//! read in a frame tagged with the rover identity and a channel ID, and
//! forwards all frames over a single radio link, alongside periodic status
//! frames reporting per-device liveness.

pub mod config;
pub mod error;
pub mod frame;
pub mod identity;
pub mod mux;
pub mod serial;
