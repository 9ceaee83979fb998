//! # Frame Protocol Constants and Types
//!
//! Core definitions for the rover telemetry frame format.
//!
//! ```text
//! Data frame:   5A 5A | tag(4) | channel(2 BE) | length(4 BE) | payload(N) | A5 A5
//! Status frame: 5A 5A | tag(4) | FF | ttl1 ttl2 ttl3 ttl4               | A5 A5
//! ```

use bytes::Bytes;

use crate::error::{Result, RoverMuxError};

/// Frame head marker byte (sent twice)
pub const FRAME_HEAD: u8 = 0x5A;

/// Frame tail marker byte (sent twice)
pub const FRAME_TAIL: u8 = 0xA5;

/// Head sentinel as it appears on the wire
pub const FRAME_HEAD_MARKER: [u8; 2] = [FRAME_HEAD, FRAME_HEAD];

/// Tail sentinel as it appears on the wire
pub const FRAME_TAIL_MARKER: [u8; 2] = [FRAME_TAIL, FRAME_TAIL];

/// Marker byte that follows the rover tag in status frames
pub const STATUS_MARKER: u8 = 0xFF;

/// Rover tag length (last 4 characters of the rover identity)
pub const ROVER_TAG_LEN: usize = 4;

/// Number of monitored channels in a status frame.
///
/// This is a protocol limit, not the number of connected devices.
pub const STATUS_SLOTS: usize = 4;

/// TTL assigned to a channel when it produces data
pub const TTL_REFRESH: u8 = 10;

/// Data frame header: head(2) + tag(4) + channel(2) + length(4)
pub const DATA_HEADER_SIZE: usize = 2 + ROVER_TAG_LEN + 2 + 4;

/// Fixed overhead of a data frame (header + tail)
pub const DATA_FRAME_OVERHEAD: usize = DATA_HEADER_SIZE + 2;

/// Status frame size: head(2) + tag(4) + marker(1) + ttl(4) + tail(2)
pub const STATUS_FRAME_SIZE: usize = 2 + ROVER_TAG_LEN + 1 + STATUS_SLOTS + 2;

/// Rover tag bytes carried in every frame
pub type RoverTag = [u8; ROVER_TAG_LEN];

/// TTL values for channels 1..=4, in channel order
pub type StatusSlots = [u8; STATUS_SLOTS];

/// Device channel identifier (1..=4)
///
/// Assigned at startup in discovery order; one-to-one with a physical
/// serial device for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceChannel(u16);

impl DeviceChannel {
    /// Create a channel ID, rejecting values outside `1..=STATUS_SLOTS`
    ///
    /// # Errors
    ///
    /// Returns `InvalidChannel` if `id` is 0 or greater than 4
    pub fn new(id: u16) -> Result<Self> {
        if id == 0 || id as usize > STATUS_SLOTS {
            return Err(RoverMuxError::InvalidChannel(id));
        }
        Ok(Self(id))
    }

    /// Raw channel number as carried on the wire
    pub fn get(self) -> u16 {
        self.0
    }

    /// Zero-based index into a status table
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

impl std::fmt::Display for DeviceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which variant an encoded frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Device payload on a channel
    Data(DeviceChannel),
    /// Heartbeat liveness snapshot
    Status,
}

/// A frame ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Frame variant
    pub kind: FrameKind,
    /// Exact wire bytes
    pub bytes: Bytes,
}

impl EncodedFrame {
    /// Wire size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for frames built by the encoder
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw device data
    Data {
        tag: RoverTag,
        channel: u16,
        payload: Bytes,
    },
    /// Liveness snapshot for channels 1..=4
    Status { tag: RoverTag, ttl: StatusSlots },
}

impl Frame {
    /// Rover tag carried by either variant
    pub fn tag(&self) -> &RoverTag {
        match self {
            Frame::Data { tag, .. } | Frame::Status { tag, .. } => tag,
        }
    }
}
