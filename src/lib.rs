//! `tuios-daemon` — the session/daemon core of a terminal multiplexing
//! window manager: PTY ownership, VT emulation, session/layout state, and
//! the framed wire protocol that multiplexes it all to one or more
//! connected clients.
//!
//! The client-side TUI renderer, keybindings, tiling layout math, theming,
//! the SSH frontend, and the tape-automation DSL are out of scope — they
//! are external consumers of the protocol this crate serves over a local
//! stream socket.

pub mod config;
pub mod daemon;
pub mod error;
pub mod ids;
pub mod pty;
pub mod session;
pub mod vt;
pub mod wire;

pub use config::Config;
pub use daemon::Daemon;
pub use error::DaemonError;
pub use ids::{ClientId, PtyId, SessionId};
