//! DECSET/DECRST mode flags that must survive serialization.
//!
//! Modes are captured as a set of opaque numeric mode-ids: restoring a
//! snapshot writes the flags directly back into the table without invoking
//! the side-effectful `DECSET`/`DECRST` dispatch, because that dispatch
//! path can clear buffers or re-emit escape sequences as a side effect.

use std::collections::HashSet;

/// Private-mode numeric ids this emulator tracks. Values match the ANSI
/// private parameter numbers so `ModeSet` can be serialized as a plain
/// `HashSet<u16>` without a lookup table.
pub mod mode_id {
    pub const APPLICATION_CURSOR_KEYS: u16 = 1;
    pub const MOUSE_X10: u16 = 9;
    pub const MOUSE_VT200: u16 = 1000;
    pub const MOUSE_BUTTON_EVENT: u16 = 1002;
    pub const MOUSE_ANY_EVENT: u16 = 1003;
    pub const MOUSE_SGR: u16 = 1006;
    pub const ALT_SCREEN_SAVE_CURSOR: u16 = 1049;
    pub const ALT_SCREEN: u16 = 47;
    pub const AUTO_WRAP: u16 = 7;
    pub const CURSOR_VISIBLE: u16 = 25;
    pub const BRACKETED_PASTE: u16 = 2004;
    pub const FOCUS_REPORTING: u16 = 1004;
}

/// Live mode table plus the subset of flags that are addressable
/// individually for convenience accessors the VT Emulator exposes.
#[derive(Debug, Clone, Default)]
pub struct Modes {
    set: HashSet<u16>,
}

impl Modes {
    #[must_use]
    pub fn new() -> Self {
        // Auto-wrap and cursor visibility default on, matching DEC defaults.
        let mut set = HashSet::new();
        set.insert(mode_id::AUTO_WRAP);
        set.insert(mode_id::CURSOR_VISIBLE);
        Self { set }
    }

    pub fn set(&mut self, id: u16) {
        self.set.insert(id);
    }

    pub fn reset(&mut self, id: u16) {
        self.set.remove(&id);
    }

    #[must_use]
    pub fn is_set(&self, id: u16) -> bool {
        self.set.contains(&id)
    }

    /// Snapshot the full mode set for restoration later (`get_modes`).
    #[must_use]
    pub fn snapshot(&self) -> HashSet<u16> {
        self.set.clone()
    }

    /// Overwrite the mode table from a snapshot (`restore_modes`). Does not
    /// invoke any side effects — see module docs.
    pub fn restore(&mut self, snapshot: HashSet<u16>) {
        self.set = snapshot;
    }

    #[must_use]
    pub fn mouse_mode(&self) -> Option<MouseMode> {
        if self.is_set(mode_id::MOUSE_ANY_EVENT) {
            Some(MouseMode::AnyEvent)
        } else if self.is_set(mode_id::MOUSE_BUTTON_EVENT) {
            Some(MouseMode::ButtonEvent)
        } else if self.is_set(mode_id::MOUSE_VT200) {
            Some(MouseMode::Normal)
        } else if self.is_set(mode_id::MOUSE_X10) {
            Some(MouseMode::X10)
        } else {
            None
        }
    }

    #[must_use]
    pub fn mouse_sgr(&self) -> bool {
        self.is_set(mode_id::MOUSE_SGR)
    }
}

/// Mouse-tracking protocol variants, ordered by how much motion/event
/// granularity they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    X10,
    Normal,
    ButtonEvent,
    AnyEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes_have_autowrap_and_cursor_visible() {
        let m = Modes::new();
        assert!(m.is_set(mode_id::AUTO_WRAP));
        assert!(m.is_set(mode_id::CURSOR_VISIBLE));
        assert!(!m.is_set(mode_id::ALT_SCREEN));
    }

    #[test]
    fn test_snapshot_restore_roundtrip_is_idempotent() {
        let mut m = Modes::new();
        m.set(mode_id::MOUSE_SGR);
        m.set(mode_id::MOUSE_VT200);
        let snap = m.snapshot();

        let mut fresh = Modes::new();
        fresh.restore(snap.clone());
        assert_eq!(fresh.snapshot(), snap);

        // Restoring again onto itself changes nothing further.
        fresh.restore(snap.clone());
        assert_eq!(fresh.snapshot(), snap);
    }

    #[test]
    fn test_mouse_mode_precedence() {
        let mut m = Modes::new();
        m.set(mode_id::MOUSE_X10);
        assert_eq!(m.mouse_mode(), Some(MouseMode::X10));
        m.set(mode_id::MOUSE_ANY_EVENT);
        assert_eq!(m.mouse_mode(), Some(MouseMode::AnyEvent));
    }
}
