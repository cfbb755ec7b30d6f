//! Error taxonomy for the daemon.
//!
//! Internal fallible operations use [`anyhow::Result`] and are logged with
//! context at the call site. Anything that must cross the wire to a client
//! is translated into a [`DaemonError`], whose variants map 1:1 onto the
//! error codes in the wire protocol.

use thiserror::Error;

/// Error codes visible to clients via the `Error` message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DaemonError {
    #[error("session not found")]
    SessionNotFound,
    #[error("session already exists")]
    SessionExists,
    #[error("pty not found")]
    PtyNotFound,
    #[error("connection is not attached to a session")]
    NotAttached,
    #[error("internal error")]
    Internal,
    #[error("protocol violation")]
    Protocol,
    #[error("unsupported operation")]
    Unsupported,
}

impl DaemonError {
    /// Stable numeric code embedded in the `Error` wire payload.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::SessionNotFound => "SessionNotFound",
            Self::SessionExists => "SessionExists",
            Self::PtyNotFound => "PTYNotFound",
            Self::NotAttached => "NotAttached",
            Self::Internal => "Internal",
            Self::Protocol => "Protocol",
            Self::Unsupported => "Unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable_strings() {
        assert_eq!(DaemonError::SessionNotFound.code(), "SessionNotFound");
        assert_eq!(DaemonError::PtyNotFound.code(), "PTYNotFound");
        assert_eq!(DaemonError::NotAttached.code(), "NotAttached");
    }

    #[test]
    fn test_error_display_is_human_readable() {
        assert_eq!(DaemonError::Protocol.to_string(), "protocol violation");
    }
}
