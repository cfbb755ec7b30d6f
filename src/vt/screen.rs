//! Screen grid, cursor, and the main/alternate screen pair.

use crate::vt::cell::{Attrs, Cell, Color};
use crate::vt::modes::Modes;
use crate::vt::palette::Palette;
use crate::vt::scrollback::{Line, Scrollback};

/// A single screen buffer: a grid of cells plus cursor and per-screen
/// save-state. Both the main and alternate screens are this type; only the
/// main screen ever has scrollback attached (scrollback lives one level up,
/// on [`Screens`]).
#[derive(Debug, Clone)]
pub struct Screen {
    rows: Vec<Vec<Cell>>,
    width: u16,
    height: u16,
    pub cursor_x: u16,
    pub cursor_y: u16,
    saved_cursor: Option<(u16, u16, Attrs, Color, Color)>,
    pub cur_attrs: Attrs,
    pub cur_fg: Color,
    pub cur_bg: Color,
    /// True right after printing in the last column with auto-wrap enabled:
    /// the next printable character wraps first, then prints.
    pub wrap_pending: bool,
}

impl Screen {
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            rows: vec![vec![Cell::blank(); width as usize]; height as usize],
            width,
            height,
            cursor_x: 0,
            cursor_y: 0,
            saved_cursor: None,
            cur_attrs: Attrs::default(),
            cur_fg: Color::Default,
            cur_bg: Color::Default,
            wrap_pending: false,
        }
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[must_use]
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.rows.get(y as usize)?.get(x as usize)
    }

    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(row) = self.rows.get_mut(y as usize) {
            if let Some(slot) = row.get_mut(x as usize) {
                *slot = cell;
            }
        }
    }

    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        self.rows.get(y as usize).map(Vec::as_slice)
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor_x, self.cursor_y, self.cur_attrs, self.cur_fg, self.cur_bg));
    }

    pub fn restore_cursor(&mut self) {
        if let Some((x, y, attrs, fg, bg)) = self.saved_cursor {
            self.cursor_x = x.min(self.width.saturating_sub(1));
            self.cursor_y = y.min(self.height.saturating_sub(1));
            self.cur_attrs = attrs;
            self.cur_fg = fg;
            self.cur_bg = bg;
            self.wrap_pending = false;
        }
    }

    pub fn clamp_cursor(&mut self) {
        self.cursor_x = self.cursor_x.min(self.width.saturating_sub(1));
        self.cursor_y = self.cursor_y.min(self.height.saturating_sub(1));
    }

    /// Shift every row up by one, clearing the new bottom row. Returns the
    /// evicted top row so callers can push it to scrollback.
    pub fn scroll_up(&mut self) -> Vec<Cell> {
        let evicted = self.rows.remove(0);
        self.rows.push(vec![Cell::blank(); self.width as usize]);
        evicted
    }

    pub fn scroll_down(&mut self) {
        self.rows.pop();
        self.rows.insert(0, vec![Cell::blank(); self.width as usize]);
    }

    pub fn clear_all(&mut self) {
        for row in &mut self.rows {
            row.fill(Cell::blank());
        }
    }

    pub fn clear_row(&mut self, y: u16) {
        if let Some(row) = self.rows.get_mut(y as usize) {
            row.fill(Cell::blank());
        }
    }

    pub fn clear_row_from(&mut self, y: u16, from_x: u16) {
        if let Some(row) = self.rows.get_mut(y as usize) {
            for cell in row.iter_mut().skip(from_x as usize) {
                *cell = Cell::blank();
            }
        }
    }

    pub fn clear_row_to(&mut self, y: u16, to_x: u16) {
        if let Some(row) = self.rows.get_mut(y as usize) {
            for cell in row.iter_mut().take((to_x as usize + 1).min(row.len())) {
                *cell = Cell::blank();
            }
        }
    }

    /// Resize the grid in place, without reflow (reflow happens on
    /// scrollback, owned by [`Screens::resize`], before this is called).
    /// Extra rows are filled blank; removed rows are simply dropped — the
    /// caller is responsible for pushing evicted main-screen rows to
    /// scrollback first.
    pub fn resize_grid(&mut self, width: u16, height: u16) -> Vec<Vec<Cell>> {
        let width = width.max(1);
        let height = height.max(1);
        let mut evicted = Vec::new();

        if width != self.width {
            for row in &mut self.rows {
                row.resize(width as usize, Cell::blank());
            }
        }

        match height.cmp(&self.height) {
            std::cmp::Ordering::Less => {
                let to_remove = (self.height - height) as usize;
                for _ in 0..to_remove {
                    evicted.push(self.rows.remove(0));
                }
            }
            std::cmp::Ordering::Greater => {
                let to_add = (height - self.height) as usize;
                for _ in 0..to_add {
                    self.rows.push(vec![Cell::blank(); width as usize]);
                }
            }
            std::cmp::Ordering::Equal => {}
        }

        self.width = width;
        self.height = height;
        self.clamp_cursor();
        evicted
    }

    /// Replace the grid contents wholesale (used when reflowing the main
    /// screen from rebuilt scrollback + visible rows).
    pub fn set_rows(&mut self, rows: Vec<Vec<Cell>>) {
        self.rows = rows;
    }

    #[must_use]
    pub fn contents(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            for cell in row {
                if !cell.continuation {
                    out.push(cell.ch);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Owns the main/alternate screen pair, scrollback, modes, and the cell
/// pixel size used for XTWINOPS size reports.
pub struct Screens {
    pub main: Screen,
    pub alt: Screen,
    pub alt_active: bool,
    pub modes: Modes,
    pub scrollback: Scrollback,
    pub cell_size: (u16, u16),
    pub unknown_sequences: u64,
    pub palette: Palette,
    saved_main_cursor: Option<(u16, u16)>,
}

impl Screens {
    #[must_use]
    pub fn new(width: u16, height: u16, scrollback_max_lines: usize) -> Self {
        Self {
            main: Screen::new(width, height),
            alt: Screen::new(width, height),
            alt_active: false,
            modes: Modes::new(),
            scrollback: Scrollback::new(scrollback_max_lines),
            cell_size: (8, 16),
            unknown_sequences: 0,
            palette: Palette::new(),
            saved_main_cursor: None,
        }
    }

    #[must_use]
    pub fn active(&self) -> &Screen {
        if self.alt_active { &self.alt } else { &self.main }
    }

    pub fn active_mut(&mut self) -> &mut Screen {
        if self.alt_active { &mut self.alt } else { &mut self.main }
    }

    pub fn enter_alt_screen(&mut self, save_cursor: bool) {
        if self.alt_active {
            return;
        }
        if save_cursor {
            self.saved_main_cursor = Some((self.main.cursor_x, self.main.cursor_y));
        }
        self.alt.clear_all();
        self.alt.cursor_x = 0;
        self.alt.cursor_y = 0;
        self.alt_active = true;
        self.modes.set(crate::vt::modes::mode_id::ALT_SCREEN);
    }

    pub fn leave_alt_screen(&mut self) {
        if !self.alt_active {
            return;
        }
        self.alt_active = false;
        if let Some((x, y)) = self.saved_main_cursor.take() {
            self.main.cursor_x = x;
            self.main.cursor_y = y;
        }
        self.modes.reset(crate::vt::modes::mode_id::ALT_SCREEN);
    }

    /// Switch buffers directly without clearing or saving — used only
    /// during session-state restoration.
    pub fn restore_alt_screen(&mut self, alt: bool) {
        self.alt_active = alt;
    }

    /// Push a line scrolled off the top of the main screen into scrollback.
    /// Only the main screen accumulates scrollback.
    pub fn push_main_row_to_scrollback(&mut self, row: Vec<Cell>, wrapped: bool) {
        self.scrollback.push(Line::new(row, wrapped));
    }

    /// Resize both screens. Width changes reflow scrollback first; height
    /// shrinks on the main screen push evicted rows into scrollback before
    /// the cursor is clamped.
    pub fn resize(&mut self, width: u16, height: u16) {
        let width = width.max(1);
        let height = height.max(1);

        if width != self.main.width() {
            self.scrollback.reflow(width as usize);
        }

        let evicted_main = self.main.resize_grid(width, height);
        for row in evicted_main {
            self.scrollback.push(Line::new(row, false));
        }
        self.alt.resize_grid(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_screen_clamps_nonpositive_to_one() {
        let s = Screen::new(0, 0);
        assert_eq!(s.width(), 1);
        assert_eq!(s.height(), 1);
    }

    #[test]
    fn test_scroll_up_clears_new_bottom_row() {
        let mut s = Screen::new(3, 2);
        s.set_cell(0, 0, {
            let mut c = Cell::blank();
            c.ch = 'x';
            c
        });
        let evicted = s.scroll_up();
        assert_eq!(evicted[0].ch, 'x');
        assert!(s.row(1).unwrap().iter().all(Cell::is_blank));
    }

    #[test]
    fn test_resize_grid_shrink_height_evicts_top_rows() {
        let mut s = Screen::new(3, 3);
        s.set_cell(0, 0, {
            let mut c = Cell::blank();
            c.ch = 'a';
            c
        });
        let evicted = s.resize_grid(3, 2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0][0].ch, 'a');
        assert_eq!(s.height(), 2);
    }

    #[test]
    fn test_resize_grid_cursor_clamped_after_shrink() {
        let mut s = Screen::new(5, 5);
        s.cursor_x = 4;
        s.cursor_y = 4;
        s.resize_grid(2, 2);
        assert!(s.cursor_x < 2);
        assert!(s.cursor_y < 2);
    }

    #[test]
    fn test_screens_resize_reflows_scrollback_on_width_change() {
        let mut screens = Screens::new(6, 2, 100);
        screens.push_main_row_to_scrollback("abc".chars().map(|ch| {
            let mut c = Cell::blank();
            c.ch = ch;
            c
        }).collect(), true);
        screens.push_main_row_to_scrollback("def".chars().map(|ch| {
            let mut c = Cell::blank();
            c.ch = ch;
            c
        }).collect(), false);

        screens.resize(3, 2);
        assert_eq!(screens.scrollback.len(), 2);
        let joined: String = screens
            .scrollback
            .line(0)
            .unwrap()
            .cells
            .iter()
            .map(|c| c.ch)
            .collect();
        assert_eq!(joined, "abc");
    }

    #[test]
    fn test_enter_and_leave_alt_screen_restores_cursor() {
        let mut screens = Screens::new(10, 5, 100);
        screens.main.cursor_x = 3;
        screens.main.cursor_y = 2;
        screens.enter_alt_screen(true);
        assert!(screens.alt_active);
        screens.alt.cursor_x = 9;
        screens.leave_alt_screen();
        assert!(!screens.alt_active);
        assert_eq!(screens.main.cursor_x, 3);
        assert_eq!(screens.main.cursor_y, 2);
    }

    #[test]
    fn test_restore_alt_screen_has_no_side_effects() {
        let mut screens = Screens::new(10, 5, 100);
        screens.main.set_cell(0, 0, {
            let mut c = Cell::blank();
            c.ch = 'z';
            c
        });
        screens.restore_alt_screen(true);
        assert!(screens.alt_active);
        // Switching back should not have cleared anything.
        screens.restore_alt_screen(false);
        assert_eq!(screens.main.cell(0, 0).unwrap().ch, 'z');
    }
}
