//! Frame header and incremental decoder.
//!
//! ```text
//! codec:1 | type:2 (big-endian) | length:4 (big-endian) | payload:length bytes
//! ```
//!
//! Grounded on the teacher's `socket::framing::FrameDecoder` (same
//! feed-and-drain incremental reassembly shape), generalized from a
//! little-endian `[length][type]` header with hub-specific frame kinds to
//! the spec's big-endian `[codec][type][length]` header with codec
//! negotiation.

use anyhow::{anyhow, bail, Result};

use crate::config::MAX_FRAME_LEN;
use crate::ids::{PtyId, PTY_ID_WIRE_LEN};
use crate::wire::codec::codec_tag;

/// Byte length of the frame header (`codec` + `type` + `length`).
pub const HEADER_LEN: usize = 1 + 2 + 4;

/// One frame read off the wire, header fields plus raw payload bytes. The
/// payload is decoded into a [`crate::wire::message::Message`] by the
/// codec named by `codec`, except for `Input`/`PTYOutput` frames, whose
/// payload is always the raw PTY sub-format regardless of codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub codec: u8,
    pub msg_type: u16,
    pub payload: Vec<u8>,
}

impl RawFrame {
    #[must_use]
    pub fn new(codec: u8, msg_type: u16, payload: Vec<u8>) -> Self {
        Self { codec, msg_type, payload }
    }

    /// Serialize this frame's header and payload into wire bytes.
    ///
    /// # Errors
    /// Returns an error if the payload exceeds [`MAX_FRAME_LEN`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.payload.len()).map_err(|_| anyhow!("frame payload too large"))?;
        if len > MAX_FRAME_LEN {
            bail!("frame payload {len} bytes exceeds max {MAX_FRAME_LEN}");
        }
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.codec);
        buf.extend_from_slice(&self.msg_type.to_be_bytes());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

/// Incremental frame decoder: feed arbitrary byte chunks, drain complete
/// frames, carry partial frames across calls.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed bytes and extract every frame that is now complete.
    ///
    /// # Errors
    /// Returns an error if a header declares a payload length over
    /// [`MAX_FRAME_LEN`] or an unrecognized codec byte.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<RawFrame>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }
            let codec = self.buf[0];
            if codec != codec_tag::BINARY && codec != codec_tag::TEXT_JSON {
                bail!("unknown codec byte: 0x{codec:02x}");
            }
            let msg_type = u16::from_be_bytes([self.buf[1], self.buf[2]]);
            let length = u32::from_be_bytes([self.buf[3], self.buf[4], self.buf[5], self.buf[6]]);
            if length > MAX_FRAME_LEN {
                bail!("frame length {length} exceeds max {MAX_FRAME_LEN}");
            }
            let total = HEADER_LEN + length as usize;
            if self.buf.len() < total {
                break;
            }
            let payload = self.buf[HEADER_LEN..total].to_vec();
            frames.push(RawFrame::new(codec, msg_type, payload));
            self.buf.drain(..total);
        }

        Ok(frames)
    }

    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

/// Build the raw sub-format payload for `Input`/`PTYOutput` frames:
/// 36-byte ASCII `pty_id` followed by raw bytes, bypassing the codec
/// entirely.
#[must_use]
pub fn encode_raw_pty_payload(pty_id: &PtyId, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PTY_ID_WIRE_LEN + data.len());
    buf.extend_from_slice(pty_id.as_str().as_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Split a raw PTY sub-format payload back into its id and data.
///
/// # Errors
/// Returns an error if the payload is shorter than the fixed id width or
/// the id prefix is not valid UTF-8/a well-formed [`PtyId`].
pub fn decode_raw_pty_payload(payload: &[u8]) -> Result<(PtyId, &[u8])> {
    if payload.len() < PTY_ID_WIRE_LEN {
        bail!("raw PTY payload shorter than id width: {} bytes", payload.len());
    }
    let (id_bytes, rest) = payload.split_at(PTY_ID_WIRE_LEN);
    let id_str = std::str::from_utf8(id_bytes).map_err(|e| anyhow!("raw PTY payload id not UTF-8: {e}"))?;
    let pty_id = PtyId::from_wire(id_str).ok_or_else(|| anyhow!("raw PTY payload has malformed id"))?;
    Ok((pty_id, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::codec::codec_tag;

    #[test]
    fn test_frame_round_trip() {
        let frame = RawFrame::new(codec_tag::BINARY, 27, vec![1, 2, 3]);
        let encoded = frame.encode().unwrap();
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&encoded).unwrap();
        assert_eq!(frames, vec![frame]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_partial_frame_reassembly() {
        let frame = RawFrame::new(codec_tag::TEXT_JSON, 1, vec![9; 100]);
        let encoded = frame.encode().unwrap();
        let mut decoder = FrameDecoder::new();
        let mid = encoded.len() / 2;
        assert!(decoder.feed(&encoded[..mid]).unwrap().is_empty());
        assert!(decoder.has_partial());
        let frames = decoder.feed(&encoded[mid..]).unwrap();
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn test_multiple_frames_single_feed() {
        let f1 = RawFrame::new(codec_tag::BINARY, 1, vec![1]);
        let f2 = RawFrame::new(codec_tag::BINARY, 2, vec![2, 2]);
        let mut buf = f1.encode().unwrap();
        buf.extend(f2.encode().unwrap());
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert_eq!(frames, vec![f1, f2]);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut header = vec![codec_tag::BINARY];
        header.extend_from_slice(&1u16.to_be_bytes());
        header.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&header).is_err());
    }

    #[test]
    fn test_unknown_codec_byte_rejected() {
        let mut header = vec![0xEE];
        header.extend_from_slice(&1u16.to_be_bytes());
        header.extend_from_slice(&0u32.to_be_bytes());
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&header).is_err());
    }

    #[test]
    fn test_raw_pty_payload_round_trip() {
        let id = PtyId::generate();
        let payload = encode_raw_pty_payload(&id, b"hello");
        let (decoded_id, data) = decode_raw_pty_payload(&payload).unwrap();
        assert_eq!(decoded_id, id);
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_raw_pty_payload_rejects_short_input() {
        assert!(decode_raw_pty_payload(b"too short").is_err());
    }
}
