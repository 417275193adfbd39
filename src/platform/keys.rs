//! Input vocabulary shared by the dispatcher and the hook classifier.
//!
//! Synthetic keys are described by hardware scan code, not virtual key:
//! toolkit hosts that filter synthetic input honour scan-code input more
//! reliably. Observed hook events arrive as virtual-key codes.

/// Set-1 scan codes used for synthesis.
pub mod scan {
    pub const CONTROL: u16 = 0x1D;
    pub const SHIFT_LEFT: u16 = 0x2A;
    pub const SHIFT_RIGHT: u16 = 0x36;
    pub const ALT: u16 = 0x38;
    pub const V: u16 = 0x2F;
}

/// Virtual-key codes as reported by the low-level keyboard hook.
pub mod vk {
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const LWIN: u16 = 0x5B;
    pub const RWIN: u16 = 0x5C;
    pub const LSHIFT: u16 = 0xA0;
    pub const RSHIFT: u16 = 0xA1;
    pub const LCONTROL: u16 = 0xA2;
    pub const RCONTROL: u16 = 0xA3;
    pub const LMENU: u16 = 0xA4;
    pub const RMENU: u16 = 0xA5;
}

/// One synthetic keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub scan_code: u16,
    pub key_up: bool,
    /// Extended-key flag (E0 prefix), set for the right-hand Ctrl/Alt.
    pub extended: bool,
}

impl KeyStroke {
    pub const fn down(scan_code: u16) -> Self {
        Self {
            scan_code,
            key_up: false,
            extended: false,
        }
    }

    pub const fn up(scan_code: u16) -> Self {
        Self {
            scan_code,
            key_up: true,
            extended: false,
        }
    }

    pub const fn extended(mut self) -> Self {
        self.extended = true;
        self
    }
}

/// Mouse button transition carried by a [`MouseInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Move,
    LeftDown,
    LeftUp,
}

/// One synthetic mouse event in normalized absolute virtual-desktop
/// coordinates (0..=65535 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseInput {
    pub action: MouseAction,
    pub abs_x: i32,
    pub abs_y: i32,
}

/// Bounding rectangle of the whole virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualScreen {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl VirtualScreen {
    /// Map a pixel position to normalized absolute coordinates, or `None`
    /// when the reported desktop size is unusable.
    pub fn normalize(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let scale = |offset: i32, extent: i32| -> i32 {
            let span = f64::from((extent - 1).max(1));
            (f64::from(offset) * 65535.0 / span).round() as i32
        };
        Some((
            scale(x - self.left, self.width),
            scale(y - self.top, self.height),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(left: i32, top: i32, width: i32, height: i32) -> VirtualScreen {
        VirtualScreen {
            left,
            top,
            width,
            height,
        }
    }

    #[test]
    fn normalize_corners_of_single_monitor() {
        let s = screen(0, 0, 1920, 1080);
        assert_eq!(s.normalize(0, 0), Some((0, 0)));
        assert_eq!(s.normalize(1919, 1079), Some((65535, 65535)));
    }

    #[test]
    fn normalize_accounts_for_negative_origin() {
        // Secondary monitor to the left of the primary.
        let s = screen(-1280, 0, 3200, 1080);
        assert_eq!(s.normalize(-1280, 0), Some((0, 0)));
        let (ax, _) = s.normalize(0, 0).unwrap();
        assert_eq!(ax, (1280.0_f64 * 65535.0 / 3199.0).round() as i32);
    }

    #[test]
    fn normalize_rejects_empty_desktop() {
        assert_eq!(screen(0, 0, 0, 1080).normalize(5, 5), None);
        assert_eq!(screen(0, 0, 1920, -1).normalize(5, 5), None);
    }

    #[test]
    fn stroke_builders() {
        assert_eq!(
            KeyStroke::up(scan::CONTROL).extended(),
            KeyStroke {
                scan_code: 0x1D,
                key_up: true,
                extended: true
            }
        );
        assert!(!KeyStroke::down(scan::V).key_up);
    }
}
