//! Codec negotiation: `binary` (the default) vs `text-json`.
//!
//! The binary codec uses `bincode`, following `r3bl-open-core`'s use of the
//! same crate for compact serde-compatible encoding — the teacher only ever
//! serializes control frames as `serde_json::Value`, so this crate borrows
//! the binary encoder from the sibling example repo rather than hand-rolling
//! one.

use anyhow::{Context, Result};

use crate::wire::message::Message;

/// Codec tag byte embedded in every frame header.
pub mod codec_tag {
    pub const BINARY: u8 = 0x01;
    pub const TEXT_JSON: u8 = 0x02;
}

/// A wire codec: turns a [`Message`] into bytes and back.
pub trait Codec: Send + Sync {
    fn tag(&self) -> u8;
    fn name(&self) -> &'static str;
    fn encode(&self, msg: &Message) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Message>;
}

pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn tag(&self) -> u8 {
        codec_tag::BINARY
    }

    fn name(&self) -> &'static str {
        "binary"
    }

    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        bincode::serialize(msg).context("binary codec: encode failed")
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message> {
        bincode::deserialize(bytes).context("binary codec: decode failed")
    }
}

pub struct TextJsonCodec;

impl Codec for TextJsonCodec {
    fn tag(&self) -> u8 {
        codec_tag::TEXT_JSON
    }

    fn name(&self) -> &'static str {
        "text-json"
    }

    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        serde_json::to_vec(msg).context("text-json codec: encode failed")
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message> {
        serde_json::from_slice(bytes).context("text-json codec: decode failed")
    }
}

/// Resolve a codec tag byte read off the wire to its implementation.
#[must_use]
pub fn codec_for_tag(tag: u8) -> Option<Box<dyn Codec>> {
    match tag {
        codec_tag::BINARY => Some(Box::new(BinaryCodec)),
        codec_tag::TEXT_JSON => Some(Box::new(TextJsonCodec)),
        _ => None,
    }
}

/// Negotiate a codec from a client's `Hello.preferred_codec` string.
/// Unknown preferences fall back to binary, the default.
#[must_use]
pub fn negotiate(preferred: &str) -> Box<dyn Codec> {
    match preferred {
        "text-json" => Box::new(TextJsonCodec),
        _ => Box::new(BinaryCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message;

    #[test]
    fn test_binary_codec_round_trips_ping() {
        let codec = BinaryCodec;
        let bytes = codec.encode(&Message::Ping).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.wire_type(), Message::Ping.wire_type());
    }

    #[test]
    fn test_text_json_codec_round_trips_error() {
        let codec = TextJsonCodec;
        let msg = Message::Error { code: "Internal".to_string(), message: "boom".to_string() };
        let bytes = codec.encode(&msg).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.wire_type(), message::message_type::ERROR);
    }

    #[test]
    fn test_negotiate_falls_back_to_binary_on_unknown() {
        assert_eq!(negotiate("quantum-flux").name(), "binary");
        assert_eq!(negotiate("binary").name(), "binary");
        assert_eq!(negotiate("text-json").name(), "text-json");
    }

    #[test]
    fn test_codec_for_tag_rejects_unknown() {
        assert!(codec_for_tag(0xFF).is_none());
    }
}
