//! Sequenced PCM frame codec
//!
//! Wire layout of one datagram:
//!
//! ```text
//! ┌────────────────────┬───────────────────────────────────────────┐
//! │ sequence: u64 (BE) │ samples: N × f32 (LE), interleaved by ch  │
//! └────────────────────┴───────────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::audio::buffer::AudioFrame;
use crate::error::CodecError;

/// Width of the sequence number header in bytes
pub const SEQUENCE_HEADER_BYTES: usize = 8;

/// Bytes per sample on the wire
const SAMPLE_BYTES: usize = 4;

/// Encoder/decoder for one session's fixed channel layout
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    channels: u16,
    max_frame_bytes: usize,
}

impl FrameCodec {
    /// Create a codec with no size cap
    pub fn new(channels: u16) -> Self {
        assert!(channels > 0, "Channel count must be non-zero");
        Self {
            channels,
            max_frame_bytes: usize::MAX,
        }
    }

    /// Reject datagrams longer than `max_frame_bytes`
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Bytes in one interleaved sample frame (one sample per channel)
    pub fn stride(&self) -> usize {
        SAMPLE_BYTES * self.channels as usize
    }

    /// Smallest valid datagram: header plus one sample per channel
    pub fn min_frame_bytes(&self) -> usize {
        SEQUENCE_HEADER_BYTES + self.stride()
    }

    /// Encoded size of a frame holding `samples` interleaved samples
    pub fn encoded_len(samples: usize) -> usize {
        SEQUENCE_HEADER_BYTES + samples * SAMPLE_BYTES
    }

    /// Decode one datagram payload
    pub fn decode(&self, data: &[u8]) -> Result<AudioFrame, CodecError> {
        let len = data.len();

        if len > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }

        if len < self.min_frame_bytes() {
            return Err(CodecError::MalformedFrame {
                len,
                reason: "shorter than header plus one sample per channel",
            });
        }

        let payload_len = len - SEQUENCE_HEADER_BYTES;
        if payload_len % self.stride() != 0 {
            return Err(CodecError::MalformedFrame {
                len,
                reason: "payload is not a whole number of sample frames",
            });
        }

        let mut buf = data;
        let sequence = buf.get_u64();

        let mut samples = Vec::with_capacity(payload_len / SAMPLE_BYTES);
        while buf.has_remaining() {
            samples.push(buf.get_f32_le());
        }

        Ok(AudioFrame::new(sequence, samples, self.channels))
    }

    /// Encode a frame for the wire.
    ///
    /// The receiver never calls this; it exists for producers and tests.
    pub fn encode(&self, frame: &AudioFrame) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::encoded_len(frame.samples.len()));
        buf.put_u64(frame.sequence);
        for &sample in &frame.samples {
            buf.put_f32_le(sample);
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_layout() {
        let mut data = Vec::new();
        data.extend_from_slice(&42u64.to_be_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
        data.extend_from_slice(&(-0.25f32).to_le_bytes());

        let frame = FrameCodec::new(2).decode(&data).unwrap();
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.samples, vec![0.5, -0.25]);
        assert_eq!(frame.channels, 2);
        assert_eq!(frame.samples_per_channel(), 1);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = FrameCodec::new(2);
        let frame = AudioFrame::new(7, vec![0.0, 1.0, -1.0, 1.5], 2);

        let encoded = codec.encode(&frame);
        assert_eq!(encoded.len(), FrameCodec::encoded_len(4));
        assert_eq!(codec.decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_header_only_is_malformed() {
        let codec = FrameCodec::new(1);
        let err = codec.decode(&[0u8; SEQUENCE_HEADER_BYTES]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedFrame { len: 8, .. }));
    }

    #[test]
    fn test_partial_sample_frame_is_malformed() {
        // Stereo needs 8 bytes per sample frame, 12 is one and a half
        let codec = FrameCodec::new(2);
        let err = codec.decode(&[0u8; SEQUENCE_HEADER_BYTES + 12]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedFrame { .. }));
        assert!(codec.decode(&[0u8; SEQUENCE_HEADER_BYTES + 16]).is_ok());
    }

    #[test]
    fn test_oversized_frame() {
        let codec = FrameCodec::new(1).with_max_frame_bytes(16);
        assert!(codec.decode(&[0u8; 16]).is_ok());
        assert_eq!(
            codec.decode(&[0u8; 20]).unwrap_err(),
            CodecError::FrameTooLarge { len: 20, max: 16 }
        );
    }

    #[test]
    fn test_samples_not_clamped() {
        let codec = FrameCodec::new(1);
        let frame = AudioFrame::new(1, vec![3.0, -8.5], 1);
        assert_eq!(codec.decode(&codec.encode(&frame)).unwrap().samples, vec![3.0, -8.5]);
    }
}
