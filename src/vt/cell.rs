//! Grid cell representation.

use serde::{Deserialize, Serialize};

/// A color as understood by SGR parameters: the default terminal color, one
/// of the 256 indexed palette entries, or a direct 24-bit RGB value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Self::Default
    }
}

/// Text attributes carried by SGR sequences, independent of color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attrs {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
}

/// One screen/scrollback cell.
///
/// Double-wide characters occupy two adjacent cells: the first carries the
/// glyph, the second is a `continuation` placeholder so column math stays
/// simple (every cell is exactly one grid column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub ch: char,
    pub width: u8,
    pub continuation: bool,
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

impl Cell {
    #[must_use]
    pub fn blank() -> Self {
        Self {
            ch: ' ',
            width: 1,
            continuation: false,
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attrs::default(),
        }
    }

    #[must_use]
    pub fn continuation_of(other: &Cell) -> Self {
        Self {
            ch: '\0',
            width: 0,
            continuation: true,
            fg: other.fg,
            bg: other.bg,
            attrs: other.attrs,
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && !self.continuation && self.attrs == Attrs::default()
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cell_defaults() {
        let c = Cell::blank();
        assert!(c.is_blank());
        assert_eq!(c.width, 1);
        assert_eq!(c.fg, Color::Default);
    }

    #[test]
    fn test_continuation_cell_inherits_style() {
        let mut wide = Cell::blank();
        wide.attrs.bold = true;
        wide.width = 2;
        let cont = Cell::continuation_of(&wide);
        assert!(cont.continuation);
        assert_eq!(cont.width, 0);
        assert!(cont.attrs.bold);
    }
}
