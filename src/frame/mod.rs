//! # Frame Protocol Module
//!
//! The rover uplink wire format.
//!
//! This module handles:
//! - Data frame encoding (rover tag + channel + length-prefixed payload)
//! - Status frame encoding (per-channel TTL snapshot)
//! - Frame decoding and stream resynchronisation for ground-station tooling

pub mod protocol;
pub mod encoder;
pub mod decoder;
