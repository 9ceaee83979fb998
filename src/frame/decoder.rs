//! # Frame Decoder
//!
//! Ground-station side decoding of rover frames.
//!
//! [`decode_frame`] validates a single complete frame. [`FrameDecoder`] is an
//! incremental decoder that can be fed arbitrary chunks of the uplink byte
//! stream and yields whole frames, resynchronising on the head marker after
//! corrupt input.

use bytes::{Buf, Bytes, BytesMut};

use super::protocol::*;
use crate::error::{Result, RoverMuxError};

/// Default upper bound on a data frame payload accepted by the decoder
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Decode one complete frame
///
/// # Arguments
///
/// * `frame` - Exactly one frame, head marker through tail marker
///
/// # Returns
///
/// * `Result<Frame>` - Decoded frame, or error if invalid
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short
/// - Head or tail marker is wrong
/// - Length field disagrees with the frame size
pub fn decode_frame(frame: &[u8]) -> Result<Frame> {
    if frame.len() < STATUS_FRAME_SIZE {
        return Err(RoverMuxError::Protocol(format!(
            "Frame too short: {} bytes",
            frame.len()
        )));
    }

    if frame[..2] != FRAME_HEAD_MARKER {
        return Err(RoverMuxError::Protocol(format!(
            "Invalid head marker: 0x{:02X} 0x{:02X}",
            frame[0], frame[1]
        )));
    }

    if frame[frame.len() - 2..] != FRAME_TAIL_MARKER {
        return Err(RoverMuxError::Protocol(format!(
            "Invalid tail marker: 0x{:02X} 0x{:02X}",
            frame[frame.len() - 2],
            frame[frame.len() - 1]
        )));
    }

    let mut tag = [0u8; ROVER_TAG_LEN];
    tag.copy_from_slice(&frame[2..2 + ROVER_TAG_LEN]);

    if frame[6] == STATUS_MARKER {
        if frame.len() != STATUS_FRAME_SIZE {
            return Err(RoverMuxError::Protocol(format!(
                "Status frame must be {} bytes, got {}",
                STATUS_FRAME_SIZE,
                frame.len()
            )));
        }
        let mut ttl = [0u8; STATUS_SLOTS];
        ttl.copy_from_slice(&frame[7..7 + STATUS_SLOTS]);
        return Ok(Frame::Status { tag, ttl });
    }

    if frame.len() < DATA_FRAME_OVERHEAD {
        return Err(RoverMuxError::Protocol(format!(
            "Data frame too short: {} bytes",
            frame.len()
        )));
    }

    let channel = u16::from_be_bytes([frame[6], frame[7]]);
    let length = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]) as usize;

    if frame.len() != DATA_FRAME_OVERHEAD + length {
        return Err(RoverMuxError::Protocol(format!(
            "Length field {} disagrees with frame size {}",
            length,
            frame.len()
        )));
    }

    let payload = Bytes::copy_from_slice(&frame[DATA_HEADER_SIZE..DATA_HEADER_SIZE + length]);
    Ok(Frame::Data { tag, channel, payload })
}

/// Incremental frame decoder for the uplink byte stream
///
/// Bytes that cannot start a valid frame are discarded one at a time until
/// the next head marker lines up.
pub struct FrameDecoder {
    buf: BytesMut,
    max_payload: usize,
    discarded: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl FrameDecoder {
    /// Create a decoder rejecting data frames above `max_payload` bytes
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_payload,
            discarded: 0,
        }
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes dropped while resynchronising
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Bytes buffered but not yet part of a complete frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            self.skip_to_head();

            // Byte 6 selects the variant
            if self.buf.len() < 7 {
                return None;
            }

            let total = if self.buf[6] == STATUS_MARKER {
                STATUS_FRAME_SIZE
            } else {
                if self.buf.len() < DATA_HEADER_SIZE {
                    return None;
                }
                let length = u32::from_be_bytes([self.buf[8], self.buf[9], self.buf[10], self.buf[11]]) as usize;
                if length > self.max_payload {
                    self.drop_byte();
                    continue;
                }
                DATA_FRAME_OVERHEAD + length
            };

            if self.buf.len() < total {
                return None;
            }

            match decode_frame(&self.buf[..total]) {
                Ok(frame) => {
                    self.buf.advance(total);
                    return Some(frame);
                }
                Err(_) => self.drop_byte(),
            }
        }
    }

    /// Discard everything before the first candidate head marker
    fn skip_to_head(&mut self) {
        while !self.buf.is_empty() {
            if self.buf[0] != FRAME_HEAD {
                self.drop_byte();
                continue;
            }
            if self.buf.len() >= 2 && self.buf[1] != FRAME_HEAD {
                self.drop_byte();
                continue;
            }
            break;
        }
    }

    fn drop_byte(&mut self) {
        self.buf.advance(1);
        self.discarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::{encode_data_frame, encode_status_frame};
    use crate::identity::RoverIdentity;

    fn identity() -> RoverIdentity {
        RoverIdentity::new("00000000abcd1234")
    }

    fn channel(id: u16) -> DeviceChannel {
        DeviceChannel::new(id).unwrap()
    }

    #[test]
    fn test_decode_data_frame_recovers_channel_and_payload() {
        let payload = b"$GNRMC,123519,A,4807.038,N*6A\r\n";
        let encoded = encode_data_frame(&identity(), channel(3), payload);

        let decoded = decode_frame(&encoded.bytes).unwrap();
        match decoded {
            Frame::Data { tag, channel, payload: got } => {
                assert_eq!(&tag, b"1234");
                assert_eq!(channel, 3);
                assert_eq!(got.as_ref(), payload);
            }
            other => panic!("Expected data frame, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_status_frame() {
        let encoded = encode_status_frame(&identity(), &[10, 0, 5, 3]);
        let decoded = decode_frame(&encoded.bytes).unwrap();
        assert_eq!(decoded, Frame::Status { tag: *b"1234", ttl: [10, 0, 5, 3] });
    }

    #[test]
    fn test_decode_frame_too_short() {
        let result = decode_frame(&[0x5A, 0x5A, 0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_frame_invalid_head() {
        let mut bytes = encode_status_frame(&identity(), &[0; 4]).bytes.to_vec();
        bytes[0] = 0x00;
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn test_decode_frame_invalid_tail() {
        let mut bytes = encode_data_frame(&identity(), channel(1), b"abc").bytes.to_vec();
        let last = bytes.len() - 1;
        bytes[last] = 0x00;
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn test_decode_frame_length_mismatch() {
        let mut bytes = encode_data_frame(&identity(), channel(1), b"abcdef").bytes.to_vec();
        bytes[11] = 0x05; // claims 5 bytes, carries 6
        let result = decode_frame(&bytes);
        match result {
            Err(RoverMuxError::Protocol(msg)) => assert!(msg.contains("Length field")),
            other => panic!("Expected protocol error, got: {:?}", other),
        }
    }

    #[test]
    fn test_stream_decoder_handles_split_chunks() {
        let first = encode_data_frame(&identity(), channel(1), b"hello");
        let second = encode_status_frame(&identity(), &[9, 9, 0, 0]);
        let mut stream = first.bytes.to_vec();
        stream.extend_from_slice(&second.bytes);

        let mut decoder = FrameDecoder::default();
        let mut frames = Vec::new();
        for chunk in stream.chunks(3) {
            decoder.push(chunk);
            while let Some(frame) = decoder.next_frame() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], decode_frame(&first.bytes).unwrap());
        assert_eq!(frames[1], Frame::Status { tag: *b"1234", ttl: [9, 9, 0, 0] });
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.discarded(), 0);
    }

    #[test]
    fn test_stream_decoder_resyncs_after_garbage() {
        let frame = encode_data_frame(&identity(), channel(2), b"xyz");
        let mut stream = vec![0x00, 0x5A, 0x13, 0xA5];
        stream.extend_from_slice(&frame.bytes);

        let mut decoder = FrameDecoder::default();
        decoder.push(&stream);

        assert_eq!(decoder.next_frame(), Some(decode_frame(&frame.bytes).unwrap()));
        assert_eq!(decoder.discarded(), 4);
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn test_stream_decoder_rejects_oversized_length() {
        let mut decoder = FrameDecoder::new(16);
        let big = encode_data_frame(&identity(), channel(1), &[0u8; 32]);
        let small = encode_data_frame(&identity(), channel(1), &[1u8; 4]);
        decoder.push(&big.bytes);
        decoder.push(&small.bytes);

        // The oversized frame is skipped byte-by-byte; the small one survives
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame, decode_frame(&small.bytes).unwrap());
    }

    #[test]
    fn test_stream_decoder_waits_for_complete_frame() {
        let frame = encode_data_frame(&identity(), channel(4), &[7u8; 50]);
        let mut decoder = FrameDecoder::default();
        decoder.push(&frame.bytes[..20]);
        assert_eq!(decoder.next_frame(), None);
        decoder.push(&frame.bytes[20..]);
        assert!(decoder.next_frame().is_some());
    }
}
