//! Wire protocol: frame header, codecs, and typed message payloads.

pub mod codec;
pub mod framing;
pub mod message;
