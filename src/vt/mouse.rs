//! Mouse event encoding for the currently enabled tracking protocol.

use crate::vt::modes::{MouseMode, Modes};

/// A mouse event as observed by the host terminal, independent of any
/// particular wire encoding.
#[derive(Debug, Clone, Copy)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub pressed: bool,
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Motion,
    WheelUp,
    WheelDown,
}

fn button_code(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::Motion => 3,
        MouseButton::WheelUp => 64,
        MouseButton::WheelDown => 65,
    }
}

/// Produce the escape sequence a running application expects for this
/// event, given the currently enabled mouse-tracking mode. Returns an empty
/// vector if no mouse mode is enabled.
#[must_use]
pub fn encode_mouse_event(modes: &Modes, event: MouseEvent) -> Vec<u8> {
    if modes.mouse_mode().is_none() {
        return Vec::new();
    }

    let mut code = button_code(event.button);
    if event.shift {
        code |= 0x04;
    }
    if event.alt {
        code |= 0x08;
    }
    if event.ctrl {
        code |= 0x10;
    }
    if event.button == MouseButton::Motion {
        code |= 0x20;
    }

    if modes.mouse_sgr() {
        let final_byte = if event.pressed { 'M' } else { 'm' };
        format!("\x1b[<{};{};{}{}", code, event.x + 1, event.y + 1, final_byte).into_bytes()
    } else {
        // X10/normal encoding: bytes must stay in the printable range, so
        // coordinates beyond 223 saturate rather than overflow.
        let cb = 32 + if event.pressed { code } else { 3 };
        let cx = 32 + (event.x + 1).min(223) as u8;
        let cy = 32 + (event.y + 1).min(223) as u8;
        vec![0x1b, b'[', b'M', cb, cx, cy]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vt::modes::mode_id;

    #[test]
    fn test_no_mouse_mode_produces_empty_sequence() {
        let modes = Modes::new();
        let ev = MouseEvent { x: 1, y: 1, button: MouseButton::Left, pressed: true, shift: false, alt: false, ctrl: false };
        assert!(encode_mouse_event(&modes, ev).is_empty());
    }

    #[test]
    fn test_sgr_mode_encodes_press_and_release() {
        let mut modes = Modes::new();
        modes.set(mode_id::MOUSE_VT200);
        modes.set(mode_id::MOUSE_SGR);
        let press = MouseEvent { x: 4, y: 2, button: MouseButton::Left, pressed: true, shift: false, alt: false, ctrl: false };
        let encoded = encode_mouse_event(&modes, press);
        assert_eq!(encoded, b"\x1b[<0;5;3M");

        let release = MouseEvent { pressed: false, ..press };
        let encoded = encode_mouse_event(&modes, release);
        assert_eq!(encoded, b"\x1b[<0;5;3m");
    }

    #[test]
    fn test_x10_mode_encodes_printable_bytes() {
        let mut modes = Modes::new();
        modes.set(mode_id::MOUSE_X10);
        let ev = MouseEvent { x: 0, y: 0, button: MouseButton::Left, pressed: true, shift: false, alt: false, ctrl: false };
        let encoded = encode_mouse_event(&modes, ev);
        assert_eq!(encoded[..3], [0x1b, b'[', b'M']);
        assert!(encoded.iter().skip(3).all(|&b| b >= 32));
    }
}
