//! 256-color indexed palette plus default foreground/background/cursor
//! colors: 256 indexed colors plus default foreground/background/cursor,
//! with palette indices 0-15 overridable by a theme.
//!
//! The base 256-entry table follows the standard xterm layout (16 ANSI
//! colors, a 6x6x6 color cube, a 24-step grayscale ramp) — the same table
//! the teacher's `ansi_color::constants::ANSI_COLOR_PALETTE` encodes, rebuilt
//! here from the formula rather than pulled in as a dependency: this crate
//! only ever needs the 256 RGB triples for override/lookup, not the
//! `ansi_color` crate's RGB<->ANSI256 distance-matching conversions.

/// An RGB triple, as resolved from either a palette index or a direct SGR
/// truecolor value.
pub type Rgb = (u8, u8, u8);

const STANDARD_16: [Rgb; 16] = [
    (0x00, 0x00, 0x00),
    (0xcd, 0x00, 0x00),
    (0x00, 0xcd, 0x00),
    (0xcd, 0xcd, 0x00),
    (0x00, 0x00, 0xee),
    (0xcd, 0x00, 0xcd),
    (0x00, 0xcd, 0xcd),
    (0xe5, 0xe5, 0xe5),
    (0x7f, 0x7f, 0x7f),
    (0xff, 0x00, 0x00),
    (0x00, 0xff, 0x00),
    (0xff, 0xff, 0x00),
    (0x5c, 0x5c, 0xff),
    (0xff, 0x00, 0xff),
    (0x00, 0xff, 0xff),
    (0xff, 0xff, 0xff),
];

const CUBE_STEPS: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

fn build_default_256() -> [Rgb; 256] {
    let mut table = [(0u8, 0u8, 0u8); 256];
    table[..16].copy_from_slice(&STANDARD_16);

    let mut i = 0usize;
    while i < 216 {
        let r = CUBE_STEPS[i / 36];
        let g = CUBE_STEPS[(i / 6) % 6];
        let b = CUBE_STEPS[i % 6];
        table[16 + i] = (r, g, b);
        i += 1;
    }

    let mut i = 0usize;
    while i < 24 {
        let v = 8 + (i as u16 * 10) as u8;
        table[232 + i] = (v, v, v);
        i += 1;
    }

    table
}

/// Live 256-color palette for one VT emulator instance. Indices 0-15 are the
/// only ones a theme may override; the cube and grayscale
/// ramp (16-255) are fixed.
#[derive(Debug, Clone)]
pub struct Palette {
    table: [Rgb; 256],
    pub default_fg: Rgb,
    pub default_bg: Rgb,
    pub default_cursor: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            table: build_default_256(),
            default_fg: (0xe5, 0xe5, 0xe5),
            default_bg: (0x00, 0x00, 0x00),
            default_cursor: (0xe5, 0xe5, 0xe5),
        }
    }
}

impl Palette {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resolve(&self, index: u8) -> Rgb {
        self.table[index as usize]
    }

    /// Override one of the first 16 entries. Indices 16-255 are the fixed
    /// color cube / grayscale ramp and are silently ignored.
    pub fn set_override(&mut self, index: u8, rgb: Rgb) {
        if index < 16 {
            self.table[index as usize] = rgb;
        }
    }

    /// Reset indices 0-15 back to the standard ANSI 16-color defaults,
    /// leaving the cube/grayscale ramp and default fg/bg/cursor untouched.
    pub fn reset_overrides(&mut self) {
        self.table[..16].copy_from_slice(&STANDARD_16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_matches_standard_ansi_16() {
        let p = Palette::new();
        assert_eq!(p.resolve(1), (0xcd, 0x00, 0x00));
        assert_eq!(p.resolve(15), (0xff, 0xff, 0xff));
    }

    #[test]
    fn test_cube_and_grayscale_entries_are_fixed() {
        let p = Palette::new();
        assert_eq!(p.resolve(16), (0x00, 0x00, 0x00));
        assert_eq!(p.resolve(231), (0xff, 0xff, 0xff));
        assert_eq!(p.resolve(232), (8, 8, 8));
        assert_eq!(p.resolve(255), (238, 238, 238));
    }

    #[test]
    fn test_override_low_16_then_reset() {
        let mut p = Palette::new();
        p.set_override(1, (1, 2, 3));
        assert_eq!(p.resolve(1), (1, 2, 3));
        p.reset_overrides();
        assert_eq!(p.resolve(1), (0xcd, 0x00, 0x00));
    }

    #[test]
    fn test_override_ignores_indices_above_15() {
        let mut p = Palette::new();
        let before = p.resolve(20);
        p.set_override(20, (9, 9, 9));
        assert_eq!(p.resolve(20), before);
    }
}
