//! Opaque identifiers shared across the daemon.
//!
//! `PtyId` is deliberately a 36-byte ASCII UUID string (not a `Uuid` newtype)
//! because the raw wire sub-format for PTY input/output (see `wire::framing`)
//! embeds it directly as fixed-width bytes ahead of the payload.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, server-generated session identifier. Unique for the daemon's
/// lifetime; stable across the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque PTY identifier: a 36-byte ASCII UUID string, matching the fixed
/// width assumed by the raw `Input`/`PTYOutput` wire sub-format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PtyId(String);

/// Length in bytes of a `PtyId` on the wire (hyphenated UUID string).
pub const PTY_ID_WIRE_LEN: usize = 36;

impl PtyId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing 36-byte ASCII id read off the wire.
    ///
    /// Returns `None` if `s` is not exactly [`PTY_ID_WIRE_LEN`] ASCII bytes.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        if s.len() == PTY_ID_WIRE_LEN && s.is_ascii() {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PtyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static CLIENT_ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Server-assigned connection identifier, following the teacher's
/// `"socket:{seq:x}{rand:04x}"` scheme generalized to any transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generate the next client id. Monotonic sequence plus a random suffix
    /// to make ids non-guessable across daemon restarts without requiring
    /// persisted state.
    #[must_use]
    pub fn generate() -> Self {
        let seq = CLIENT_ID_SEQ.fetch_add(1, Ordering::Relaxed);
        let rand: u16 = rand::random();
        Self(format!("client:{seq:x}{rand:04x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pty_id_wire_roundtrip() {
        let id = PtyId::generate();
        let wire = id.as_str().to_string();
        assert_eq!(wire.len(), PTY_ID_WIRE_LEN);
        let parsed = PtyId::from_wire(&wire).expect("valid wire id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_pty_id_from_wire_rejects_wrong_length() {
        assert!(PtyId::from_wire("too-short").is_none());
        assert!(PtyId::from_wire(&"a".repeat(40)).is_none());
    }

    #[test]
    fn test_client_id_generate_unique() {
        let a = ClientId::generate();
        let b = ClientId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("client:"));
    }
}
