//! # Frame Encoder
//!
//! Builds data and status frames. Pure functions: no I/O, no shared state.

use bytes::{BufMut, BytesMut};

use super::protocol::*;
use crate::identity::RoverIdentity;

/// Encode a device read into a complete data frame
///
/// # Arguments
///
/// * `identity` - Rover identity (last 4 characters become the tag)
/// * `channel` - Channel the payload was read from
/// * `payload` - Raw device bytes, unmodified
///
/// # Returns
///
/// * `EncodedFrame` - `14 + payload.len()` bytes
///
/// # Panics
///
/// If the payload length does not fit in the 4-byte length field.
///
/// # Examples
///
/// ```
/// use rover_mux::frame::encoder::encode_data_frame;
/// use rover_mux::frame::protocol::DeviceChannel;
/// use rover_mux::identity::RoverIdentity;
///
/// let identity = RoverIdentity::new("00000000abcd1234");
/// let channel = DeviceChannel::new(2).unwrap();
/// let frame = encode_data_frame(&identity, channel, b"$GPGGA");
/// assert_eq!(frame.len(), 14 + 6);
/// ```
pub fn encode_data_frame(
    identity: &RoverIdentity,
    channel: DeviceChannel,
    payload: &[u8],
) -> EncodedFrame {
    assert!(
        payload.len() <= u32::MAX as usize,
        "payload of {} bytes exceeds the 4-byte length field",
        payload.len()
    );

    let mut buf = BytesMut::with_capacity(DATA_FRAME_OVERHEAD + payload.len());
    buf.put_slice(&FRAME_HEAD_MARKER);
    buf.put_slice(&identity.tag());
    buf.put_u16(channel.get());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.put_slice(&FRAME_TAIL_MARKER);

    EncodedFrame {
        kind: FrameKind::Data(channel),
        bytes: buf.freeze(),
    }
}

/// Encode a liveness snapshot into a status frame
///
/// # Arguments
///
/// * `identity` - Rover identity
/// * `ttl` - TTL counters for channels 1..=4, in channel order
///
/// # Returns
///
/// * `EncodedFrame` - Always `STATUS_FRAME_SIZE` (13) bytes
pub fn encode_status_frame(identity: &RoverIdentity, ttl: &StatusSlots) -> EncodedFrame {
    let mut buf = BytesMut::with_capacity(STATUS_FRAME_SIZE);
    buf.put_slice(&FRAME_HEAD_MARKER);
    buf.put_slice(&identity.tag());
    buf.put_u8(STATUS_MARKER);
    for &value in ttl {
        buf.put_u8(clamp_ttl(value));
    }
    buf.put_slice(&FRAME_TAIL_MARKER);

    EncodedFrame {
        kind: FrameKind::Status,
        bytes: buf.freeze(),
    }
}

/// Clamp a TTL counter to the 0..=10 range carried in status frames
pub fn clamp_ttl(value: u8) -> u8 {
    value.min(TTL_REFRESH)
}
