//! Typed message payloads and their stable numeric wire codes.
//!

use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, PtyId, SessionId};
use crate::pty::TerminalState;
use crate::session::manager::SessionSummary;
use crate::session::state::SessionState;

/// Stable numeric codes embedded in a frame's `type` field. Values are not
/// constrained by the protocol beyond stability; this assignment is this
/// daemon's own.
pub mod message_type {
    pub const HELLO: u16 = 1;
    pub const WELCOME: u16 = 2;
    pub const ATTACH: u16 = 3;
    pub const ATTACHED: u16 = 4;
    pub const DETACH: u16 = 5;
    pub const DETACHED: u16 = 6;
    pub const NEW: u16 = 7;
    pub const LIST: u16 = 8;
    pub const SESSION_LIST: u16 = 9;
    pub const KILL: u16 = 10;
    pub const SESSION_ENDED: u16 = 11;
    pub const CREATE_PTY: u16 = 12;
    pub const PTY_CREATED: u16 = 13;
    pub const CLOSE_PTY: u16 = 14;
    pub const PTY_CLOSED: u16 = 15;
    pub const LIST_PTYS: u16 = 16;
    pub const PTY_LIST: u16 = 17;
    pub const SUBSCRIBE_PTY: u16 = 18;
    pub const GET_TERMINAL_STATE: u16 = 19;
    pub const TERMINAL_STATE: u16 = 20;
    pub const INPUT: u16 = 21;
    pub const RESIZE: u16 = 22;
    pub const PTY_OUTPUT: u16 = 23;
    pub const GET_STATE: u16 = 24;
    pub const STATE_DATA: u16 = 25;
    pub const UPDATE_STATE: u16 = 26;
    pub const PING: u16 = 27;
    pub const PONG: u16 = 28;
    pub const ERROR: u16 = 29;
    pub const CLIENT_JOINED: u16 = 30;
    pub const CLIENT_LEFT: u16 = 31;
    pub const SESSION_RESIZE: u16 = 32;
    pub const FORCE_REFRESH: u16 = 33;
}

/// A bare PTY summary for `ListPTYs` replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtySummary {
    pub id: PtyId,
    pub exited: bool,
    pub width: u16,
    pub height: u16,
}

/// A bare session summary for `SessionList`/`New` replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListEntry {
    pub id: SessionId,
    pub name: String,
    pub pty_count: usize,
}

impl From<SessionSummary> for SessionListEntry {
    fn from(s: SessionSummary) -> Self {
        Self { id: s.id, name: s.name, pty_count: s.pty_count }
    }
}

/// Every message the daemon protocol can carry over a decoded frame. The
/// frame's `type` field is the authoritative discriminant; `Message`'s Rust
/// discriminant mirrors it 1:1 via [`Message::wire_type`] /
/// [`Message::from_wire_type`] so a codec only needs the payload bytes plus
/// the type to reconstruct one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Hello { preferred_codec: String, client_version: String },
    Welcome { version: String, sessions: Vec<SessionListEntry>, codec: String },
    Attach { name: String, create_new: bool, width: u16, height: u16 },
    Attached { session_id: SessionId, session_name: String, state: SessionState },
    Detach,
    Detached,
    New { name: Option<String>, width: u16, height: u16 },
    List,
    SessionList { sessions: Vec<SessionListEntry> },
    Kill { name: String },
    SessionEnded { name: String },
    CreatePTY { title: Option<String>, width: u16, height: u16 },
    PTYCreated { pty_id: PtyId },
    ClosePTY { pty_id: PtyId },
    PTYClosed { pty_id: PtyId, exit_code: Option<i32> },
    ListPTYs,
    PTYList { ptys: Vec<PtySummary> },
    SubscribePTY { pty_id: PtyId },
    GetTerminalState { pty_id: PtyId, include_scrollback: bool },
    TerminalState { pty_id: PtyId, state: TerminalState },
    /// `Input`'s payload is encoded via the raw sub-format on the wire;
    /// this variant exists for in-process dispatch after the frame layer
    /// has already split out `pty_id`/`data`.
    Input { pty_id: PtyId, data: Vec<u8> },
    Resize { pty_id: PtyId, width: u16, height: u16 },
    /// See `Input`'s note: the wire payload is the raw sub-format.
    PTYOutput { pty_id: PtyId, data: Vec<u8> },
    GetState,
    StateData { state: SessionState },
    UpdateState { state: SessionState, source_client_id: Option<ClientId> },
    Ping,
    Pong,
    Error { code: String, message: String },
    ClientJoined { client_id: ClientId },
    ClientLeft { client_id: ClientId },
    SessionResize { width: u16, height: u16 },
    ForceRefresh,
}

impl Message {
    /// The frame `type` field value for this message.
    #[must_use]
    pub fn wire_type(&self) -> u16 {
        use message_type as t;
        match self {
            Self::Hello { .. } => t::HELLO,
            Self::Welcome { .. } => t::WELCOME,
            Self::Attach { .. } => t::ATTACH,
            Self::Attached { .. } => t::ATTACHED,
            Self::Detach => t::DETACH,
            Self::Detached => t::DETACHED,
            Self::New { .. } => t::NEW,
            Self::List => t::LIST,
            Self::SessionList { .. } => t::SESSION_LIST,
            Self::Kill { .. } => t::KILL,
            Self::SessionEnded { .. } => t::SESSION_ENDED,
            Self::CreatePTY { .. } => t::CREATE_PTY,
            Self::PTYCreated { .. } => t::PTY_CREATED,
            Self::ClosePTY { .. } => t::CLOSE_PTY,
            Self::PTYClosed { .. } => t::PTY_CLOSED,
            Self::ListPTYs => t::LIST_PTYS,
            Self::PTYList { .. } => t::PTY_LIST,
            Self::SubscribePTY { .. } => t::SUBSCRIBE_PTY,
            Self::GetTerminalState { .. } => t::GET_TERMINAL_STATE,
            Self::TerminalState { .. } => t::TERMINAL_STATE,
            Self::Input { .. } => t::INPUT,
            Self::Resize { .. } => t::RESIZE,
            Self::PTYOutput { .. } => t::PTY_OUTPUT,
            Self::GetState => t::GET_STATE,
            Self::StateData { .. } => t::STATE_DATA,
            Self::UpdateState { .. } => t::UPDATE_STATE,
            Self::Ping => t::PING,
            Self::Pong => t::PONG,
            Self::Error { .. } => t::ERROR,
            Self::ClientJoined { .. } => t::CLIENT_JOINED,
            Self::ClientLeft { .. } => t::CLIENT_LEFT,
            Self::SessionResize { .. } => t::SESSION_RESIZE,
            Self::ForceRefresh => t::FORCE_REFRESH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_matches_message_kind() {
        assert_eq!(Message::Ping.wire_type(), message_type::PING);
        assert_eq!(Message::Detach.wire_type(), message_type::DETACH);
        let err = Message::Error { code: "Internal".to_string(), message: "oops".to_string() };
        assert_eq!(err.wire_type(), message_type::ERROR);
    }
}
