//! `vte::Perform` implementation: translates parser callbacks into screen
//! mutations.
//!
//! Grounded on the CSI/ESC/OSC dispatch shape of
//! `r3bl-open-core`'s `tui::core::pty_mux::ansi_parser::ansi_parser_perform_impl`,
//! generalized with scrollback push-on-scroll, mode-flag tracking beyond
//! auto-wrap, a CPR device-status response, and 256-color/RGB SGR handling
//! the reference only partially implements.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;
use vte::{Params, Perform};

use crate::vt::cell::{Attrs, Cell, Color};
use crate::vt::modes::mode_id;
use crate::vt::screen::Screens;

/// Bridges `vte::Parser` callbacks to a [`Screens`] pair, and queues bytes
/// the emulator needs to send back upstream (device query responses, mouse
/// encodings fed in from elsewhere).
pub struct Performer<'a> {
    pub screens: &'a mut Screens,
    pub pending_reply: &'a mut VecDeque<u8>,
}

impl<'a> Performer<'a> {
    fn reply(&mut self, bytes: &[u8]) {
        self.pending_reply.extend(bytes);
    }

    fn wrap_if_pending(&mut self) {
        if !self.screens.active().wrap_pending {
            return;
        }
        self.screens.active_mut().wrap_pending = false;

        let is_main = !self.screens.alt_active;
        let height = self.screens.active().height();
        let at_bottom = self.screens.active().cursor_y + 1 >= height;

        if at_bottom {
            let evicted = self.screens.active_mut().scroll_up();
            if is_main {
                self.screens.push_main_row_to_scrollback(evicted, true);
            }
        } else {
            self.screens.active_mut().cursor_y += 1;
        }
        self.screens.active_mut().cursor_x = 0;
    }

    fn advance_cursor(&mut self, cell_width: u16) {
        let auto_wrap = self.screens.modes.is_set(mode_id::AUTO_WRAP);
        let width = self.screens.active().width();
        let screen = self.screens.active_mut();
        let next = screen.cursor_x + cell_width;
        if next >= width {
            if auto_wrap {
                screen.wrap_pending = true;
                screen.cursor_x = width.saturating_sub(1);
            } else {
                screen.cursor_x = width.saturating_sub(1);
            }
        } else {
            screen.cursor_x = next;
        }
    }

    fn newline(&mut self) {
        let is_main = !self.screens.alt_active;
        let height = self.screens.active().height();
        self.screens.active_mut().wrap_pending = false;
        let at_bottom = self.screens.active().cursor_y + 1 >= height;

        if at_bottom {
            let evicted = self.screens.active_mut().scroll_up();
            if is_main {
                self.screens.push_main_row_to_scrollback(evicted, false);
            }
        } else {
            self.screens.active_mut().cursor_y += 1;
        }
    }
}

fn param_or(params: &Params, idx: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(idx)
        .and_then(|p| p.first().copied())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

impl<'a> Perform for Performer<'a> {
    fn print(&mut self, ch: char) {
        self.wrap_if_pending();
        let width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1) as u16;

        let (x, y, attrs, fg, bg) = {
            let s = self.screens.active();
            (s.cursor_x, s.cursor_y, s.cur_attrs, s.cur_fg, s.cur_bg)
        };

        let mut cell = Cell::blank();
        cell.ch = ch;
        cell.width = width.min(2) as u8;
        cell.attrs = attrs;
        cell.fg = fg;
        cell.bg = bg;
        self.screens.active_mut().set_cell(x, y, cell.clone());

        if width == 2 {
            self.screens
                .active_mut()
                .set_cell(x + 1, y, Cell::continuation_of(&cell));
        }

        self.advance_cursor(width);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => {
                // Backspace.
                let screen = self.screens.active_mut();
                screen.wrap_pending = false;
                screen.cursor_x = screen.cursor_x.saturating_sub(1);
            }
            0x09 => {
                // Tab: next 8-column boundary.
                let width = self.screens.active().width();
                let screen = self.screens.active_mut();
                let next = (screen.cursor_x / 8 + 1) * 8;
                screen.cursor_x = next.min(width.saturating_sub(1));
            }
            0x0A | 0x0B | 0x0C => self.newline(),
            0x0D => {
                self.screens.active_mut().cursor_x = 0;
                self.screens.active_mut().wrap_pending = false;
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let is_private = intermediates.first() == Some(&b'?');
        match action {
            'A' => {
                let n = param_or(params, 0, 1);
                let s = self.screens.active_mut();
                s.cursor_y = s.cursor_y.saturating_sub(n);
            }
            'B' => {
                let n = param_or(params, 0, 1);
                let height = self.screens.active().height();
                let s = self.screens.active_mut();
                s.cursor_y = (s.cursor_y + n).min(height.saturating_sub(1));
            }
            'C' => {
                let n = param_or(params, 0, 1);
                let width = self.screens.active().width();
                let s = self.screens.active_mut();
                s.cursor_x = (s.cursor_x + n).min(width.saturating_sub(1));
                s.wrap_pending = false;
            }
            'D' => {
                let n = param_or(params, 0, 1);
                let s = self.screens.active_mut();
                s.cursor_x = s.cursor_x.saturating_sub(n);
                s.wrap_pending = false;
            }
            'E' => {
                let n = param_or(params, 0, 1);
                let height = self.screens.active().height();
                let s = self.screens.active_mut();
                s.cursor_y = (s.cursor_y + n).min(height.saturating_sub(1));
                s.cursor_x = 0;
            }
            'F' => {
                let n = param_or(params, 0, 1);
                let s = self.screens.active_mut();
                s.cursor_y = s.cursor_y.saturating_sub(n);
                s.cursor_x = 0;
            }
            'G' => {
                let n = param_or(params, 0, 1);
                let width = self.screens.active().width();
                self.screens.active_mut().cursor_x = (n.saturating_sub(1)).min(width.saturating_sub(1));
            }
            'H' | 'f' => {
                let row = param_or(params, 0, 1);
                let col = param_or(params, 1, 1);
                let (width, height) = (self.screens.active().width(), self.screens.active().height());
                let s = self.screens.active_mut();
                s.cursor_y = row.saturating_sub(1).min(height.saturating_sub(1));
                s.cursor_x = col.saturating_sub(1).min(width.saturating_sub(1));
                s.wrap_pending = false;
            }
            'J' => {
                let mode = param_or(params, 0, 0);
                let (y, height) = (self.screens.active().cursor_y, self.screens.active().height());
                let s = self.screens.active_mut();
                match mode {
                    0 => {
                        s.clear_row_from(y, s.cursor_x);
                        for row in (y + 1)..height {
                            s.clear_row(row);
                        }
                    }
                    1 => {
                        for row in 0..y {
                            s.clear_row(row);
                        }
                        s.clear_row_to(y, s.cursor_x);
                    }
                    _ => s.clear_all(),
                }
            }
            'K' => {
                let mode = param_or(params, 0, 0);
                let (x, y) = (self.screens.active().cursor_x, self.screens.active().cursor_y);
                let s = self.screens.active_mut();
                match mode {
                    0 => s.clear_row_from(y, x),
                    1 => s.clear_row_to(y, x),
                    _ => s.clear_row(y),
                }
            }
            'm' => self.sgr(params),
            's' => self.screens.active_mut().save_cursor(),
            'u' => self.screens.active_mut().restore_cursor(),
            'n' => {
                if param_or(params, 0, 0) == 6 {
                    let s = self.screens.active();
                    let resp = format!("\x1b[{};{}R", s.cursor_y + 1, s.cursor_x + 1);
                    self.reply(resp.as_bytes());
                }
            }
            'S' => {
                let n = param_or(params, 0, 1);
                for _ in 0..n {
                    let evicted = self.screens.active_mut().scroll_up();
                    if !self.screens.alt_active {
                        self.screens.push_main_row_to_scrollback(evicted, false);
                    }
                }
            }
            'T' => {
                let n = param_or(params, 0, 1);
                for _ in 0..n {
                    self.screens.active_mut().scroll_down();
                }
            }
            'h' | 'l' => self.set_reset_mode(params, is_private, action == 'h'),
            'c' if !is_private => {
                // Primary Device Attributes request: report as a VT220 with
                // the 256-color SGR extension.
                self.reply(b"\x1b[?62;22c");
            }
            't' => self.xtwinops(params),
            _ => self.screens.unknown_sequences += 1,
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (intermediates.first(), byte) {
            (None, b'7') => self.screens.active_mut().save_cursor(),
            (None, b'8') => self.screens.active_mut().restore_cursor(),
            (None, b'D') => self.newline(),
            (None, b'M') => {
                let s = self.screens.active_mut();
                if s.cursor_y == 0 {
                    s.scroll_down();
                } else {
                    s.cursor_y -= 1;
                }
            }
            (None, b'c') => {
                let (w, h) = (self.screens.active().width(), self.screens.active().height());
                *self.screens.active_mut() = crate::vt::screen::Screen::new(w, h);
            }
            _ => self.screens.unknown_sequences += 1,
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        // Window title / hyperlink OSCs are a renderer concern out of this
        // core's scope and are ignored. OSC 4 (set/query palette color) is
        // the one OSC this emulator's data model cares about: it is how a
        // running application overrides the theme-addressable palette
        // entries.
        if params.first().map(|p| *p) == Some(b"4") {
            self.osc_set_palette(&params[1..]);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
}

impl<'a> Performer<'a> {
    fn sgr(&mut self, params: &Params) {
        let s = self.screens.active_mut();
        let mut iter = params.iter();
        if params.is_empty() {
            s.cur_attrs = Attrs::default();
            s.cur_fg = Color::Default;
            s.cur_bg = Color::Default;
            return;
        }
        while let Some(p) = iter.next() {
            let code = p.first().copied().unwrap_or(0);
            match code {
                0 => {
                    s.cur_attrs = Attrs::default();
                    s.cur_fg = Color::Default;
                    s.cur_bg = Color::Default;
                }
                1 => s.cur_attrs.bold = true,
                2 => s.cur_attrs.dim = true,
                3 => s.cur_attrs.italic = true,
                4 => s.cur_attrs.underline = true,
                5 | 6 => s.cur_attrs.blink = true,
                7 => s.cur_attrs.inverse = true,
                8 => s.cur_attrs.hidden = true,
                9 => s.cur_attrs.strikethrough = true,
                22 => {
                    s.cur_attrs.bold = false;
                    s.cur_attrs.dim = false;
                }
                23 => s.cur_attrs.italic = false,
                24 => s.cur_attrs.underline = false,
                25 => s.cur_attrs.blink = false,
                27 => s.cur_attrs.inverse = false,
                28 => s.cur_attrs.hidden = false,
                29 => s.cur_attrs.strikethrough = false,
                30..=37 => s.cur_fg = Color::Indexed((code - 30) as u8),
                38 => {
                    if let Some(next) = iter.next() {
                        match next.first().copied() {
                            Some(5) => {
                                if let Some(idx) = iter.next().and_then(|p| p.first().copied()) {
                                    s.cur_fg = Color::Indexed(idx as u8);
                                }
                            }
                            Some(2) => {
                                let r = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                let g = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                let b = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                s.cur_fg = Color::Rgb(r as u8, g as u8, b as u8);
                            }
                            _ => {}
                        }
                    }
                }
                39 => s.cur_fg = Color::Default,
                40..=47 => s.cur_bg = Color::Indexed((code - 40) as u8),
                48 => {
                    if let Some(next) = iter.next() {
                        match next.first().copied() {
                            Some(5) => {
                                if let Some(idx) = iter.next().and_then(|p| p.first().copied()) {
                                    s.cur_bg = Color::Indexed(idx as u8);
                                }
                            }
                            Some(2) => {
                                let r = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                let g = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                let b = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
                                s.cur_bg = Color::Rgb(r as u8, g as u8, b as u8);
                            }
                            _ => {}
                        }
                    }
                }
                49 => s.cur_bg = Color::Default,
                90..=97 => s.cur_fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => s.cur_bg = Color::Indexed((code - 100 + 8) as u8),
                _ => {}
            }
        }
    }

    fn set_reset_mode(&mut self, params: &Params, is_private: bool, set: bool) {
        for p in params.iter() {
            let Some(&code) = p.first() else { continue };
            if !is_private {
                // No ANSI (non-private) modes are tracked beyond the
                // private DEC set this emulator targets.
                continue;
            }
            match code {
                mode_id::ALT_SCREEN => {
                    if set {
                        self.screens.enter_alt_screen(false);
                    } else {
                        self.screens.leave_alt_screen();
                    }
                }
                mode_id::ALT_SCREEN_SAVE_CURSOR => {
                    if set {
                        self.screens.enter_alt_screen(true);
                    } else {
                        self.screens.leave_alt_screen();
                    }
                }
                mode_id::CURSOR_VISIBLE
                | mode_id::AUTO_WRAP
                | mode_id::BRACKETED_PASTE
                | mode_id::FOCUS_REPORTING
                | mode_id::MOUSE_X10
                | mode_id::MOUSE_VT200
                | mode_id::MOUSE_BUTTON_EVENT
                | mode_id::MOUSE_ANY_EVENT
                | mode_id::MOUSE_SGR
                | mode_id::APPLICATION_CURSOR_KEYS => {
                    if set {
                        self.screens.modes.set(code);
                    } else {
                        self.screens.modes.reset(code);
                    }
                }
                _ => self.screens.unknown_sequences += 1,
            }
        }
    }

    /// XTWINOPS size queries: honors `cell_size` (default 8x16 pixels) and
    /// grid dimensions. Only the report-size variants are implemented;
    /// window-manipulation variants (move, raise, iconify) are a renderer
    /// concern and are ignored.
    fn xtwinops(&mut self, params: &Params) {
        let op = param_or(params, 0, 0);
        let (cell_w, cell_h) = self.screens.cell_size;
        let (cols, rows) = (self.screens.active().width(), self.screens.active().height());
        match op {
            14 => {
                let resp = format!("\x1b[4;{};{}t", rows * cell_h, cols * cell_w);
                self.reply(resp.as_bytes());
            }
            16 => {
                let resp = format!("\x1b[6;{cell_h};{cell_w}t");
                self.reply(resp.as_bytes());
            }
            18 => {
                let resp = format!("\x1b[8;{rows};{cols}t");
                self.reply(resp.as_bytes());
            }
            _ => {}
        }
    }

    /// Parse `OSC 4 ; index ; spec ; index ; spec ...` and apply palette
    /// overrides for indices 0-15 (the only overridable range; out-of-range
    /// indices are simply rejected by `Palette::set_override`). Supports
    /// the common `rgb:RR/GG/BB` and `#RRGGBB` color spec forms;
    /// unrecognized specs are ignored.
    fn osc_set_palette(&mut self, pairs: &[&[u8]]) {
        for chunk in pairs.chunks(2) {
            let [index_bytes, spec_bytes] = chunk else { continue };
            let Ok(index) = std::str::from_utf8(index_bytes).unwrap_or_default().parse::<u8>() else { continue };
            if let Some(rgb) = parse_color_spec(spec_bytes) {
                self.screens.palette.set_override(index, rgb);
            }
        }
    }
}

/// Parse a `rgb:RR/GG/BB` (each component 2-4 hex digits, high byte used) or
/// `#RRGGBB` color spec into 8-bit-per-channel RGB.
fn parse_color_spec(spec: &[u8]) -> Option<(u8, u8, u8)> {
    let text = std::str::from_utf8(spec).ok()?;
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some((r, g, b));
        }
        return None;
    }
    let rest = text.strip_prefix("rgb:")?;
    let mut parts = rest.split('/');
    let take = |s: &str| -> Option<u8> {
        let truncated = &s[..s.len().min(2)];
        u8::from_str_radix(truncated, 16).ok()
    };
    let r = take(parts.next()?)?;
    let g = take(parts.next()?)?;
    let b = take(parts.next()?)?;
    Some((r, g, b))
}
