//! VT Emulator: an ANSI/VT100-subset terminal emulator.
//!
//! The low-level tokenizer is `vte::Parser` (the same crate backing
//! Alacritty); this module supplies the `Perform` implementation and the
//! screen/scrollback/mode model it mutates. Grounded on
//! `r3bl-open-core`'s `pty_mux::ansi_parser` for the `vte::Perform` shape,
//! generalized well beyond that reference's feature set:
//! full scrollback with reflow, mode snapshot/restore without side effects,
//! mouse event encoding, and CPR responses delivered through `read()`
//! instead of being special-cased on the write path.

pub mod cell;
pub mod modes;
pub mod mouse;
pub mod palette;
pub mod perform;
pub mod screen;
pub mod scrollback;

use std::collections::{HashSet, VecDeque};

use cell::Cell;
use modes::Modes;
use perform::Performer;
use screen::Screens;

/// Snapshot of mode flags, suitable for `get_modes`/`restore_modes`.
pub type ModeSnapshot = HashSet<u16>;

/// A byte-stream-driven VT100-subset emulator.
pub struct VtEmulator {
    parser: vte::Parser,
    screens: Screens,
    pending_reply: VecDeque<u8>,
}

impl VtEmulator {
    #[must_use]
    pub fn new(width: u16, height: u16, scrollback_max_lines: usize) -> Self {
        Self {
            parser: vte::Parser::new(),
            screens: Screens::new(width, height, scrollback_max_lines),
            pending_reply: VecDeque::new(),
        }
    }

    /// Advance the parser over `bytes`. Never fails: unknown/malformed
    /// sequences are skipped and counted (`unknown_sequences`).
    pub fn write(&mut self, bytes: &[u8]) {
        let mut performer = Performer {
            screens: &mut self.screens,
            pending_reply: &mut self.pending_reply,
        };
        for &byte in bytes {
            self.parser.advance(&mut performer, byte);
        }
    }

    /// Drain bytes the emulator needs to send upstream (device query
    /// responses, injected mouse encodings). Non-blocking; returns the
    /// number of bytes written into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending_reply.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending_reply.pop_front().expect("checked len");
        }
        n
    }

    /// Queue raw bytes for delivery via `read()` — used to inject mouse
    /// event encodings computed by [`mouse::encode_mouse_event`].
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.pending_reply.extend(bytes);
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.screens.resize(width, height);
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.screens.active().width()
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.screens.active().height()
    }

    #[must_use]
    pub fn scrollback_len(&self) -> usize {
        self.screens.scrollback.len()
    }

    #[must_use]
    pub fn scrollback_line(&self, i: usize) -> Option<&[Cell]> {
        self.screens.scrollback.line(i).map(|l| l.cells.as_slice())
    }

    pub fn clear_scrollback(&mut self) {
        self.screens.scrollback.clear();
    }

    pub fn set_scrollback_max_lines(&mut self, n: usize) {
        self.screens.scrollback.set_max_lines(n);
    }

    #[must_use]
    pub fn cursor_position(&self) -> (u16, u16) {
        let s = self.screens.active();
        (s.cursor_x, s.cursor_y)
    }

    #[must_use]
    pub fn is_cursor_hidden(&self) -> bool {
        !self.screens.modes.is_set(modes::mode_id::CURSOR_VISIBLE)
    }

    #[must_use]
    pub fn is_alt_screen(&self) -> bool {
        self.screens.alt_active
    }

    #[must_use]
    pub fn get_modes(&self) -> ModeSnapshot {
        self.screens.modes.snapshot()
    }

    pub fn restore_modes(&mut self, snapshot: ModeSnapshot) {
        self.screens.modes.restore(snapshot);
    }

    pub fn restore_alt_screen(&mut self, alt: bool) {
        self.screens.restore_alt_screen(alt);
    }

    #[must_use]
    pub fn encode_mouse_event(&self, event: mouse::MouseEvent) -> Vec<u8> {
        mouse::encode_mouse_event(&self.screens.modes, event)
    }

    #[must_use]
    pub fn unknown_sequence_count(&self) -> u64 {
        self.screens.unknown_sequences
    }

    /// Render the full visible screen (no scrollback) into a plain string,
    /// one line per row, for diagnostics and snapshot tests.
    #[must_use]
    pub fn screen_contents(&self) -> String {
        self.screens.active().contents()
    }

    /// Clone the active screen's full cell grid, for `GetTerminalState`.
    #[must_use]
    pub fn screen_rows(&self) -> Vec<Vec<Cell>> {
        let screen = self.screens.active();
        (0..screen.height())
            .map(|y| screen.row(y).map(<[Cell]>::to_vec).unwrap_or_default())
            .collect()
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.screens.modes
    }

    /// Override one of the theme-overridable palette indices (0-15).
    pub fn set_palette_color(&mut self, index: u8, rgb: palette::Rgb) {
        self.screens.palette.set_override(index, rgb);
    }

    /// Resolve an indexed palette color to RGB, honoring theme overrides.
    #[must_use]
    pub fn resolve_palette_color(&self, index: u8) -> palette::Rgb {
        self.screens.palette.resolve(index)
    }
}
