//! Chord parser: "Ctrl+C" to a modifier set and virtual key.
//!
//! Parses user-provided chord strings into modifier sets and Win32
//! virtual-key codes. A chord may consist of modifiers only ("Ctrl+Alt"),
//! which is how hold gestures are described.

use std::fmt;

use super::HotkeyError;

/// Set of logical modifiers, side-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const CTRL: Self = Self(0b0001);
    pub const SHIFT: Self = Self(0b0010);
    pub const ALT: Self = Self(0b0100);
    pub const WIN: Self = Self(0b1000);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CTRL, "Ctrl"),
            (Self::SHIFT, "Shift"),
            (Self::ALT, "Alt"),
            (Self::WIN, "Win"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A parsed chord: modifiers plus an optional non-modifier key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    pub modifiers: Modifiers,
    /// Virtual-key code of the non-modifier key, if any.
    pub key: Option<u16>,
    /// Original user-provided string.
    pub raw: String,
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a chord specification.
///
/// Format: `Modifier[+Modifier...][+Key]`
///
/// Modifiers: `Shift`, `Control`/`Ctrl`, `Alt`, `Win`/`Super`
/// Keys: single letter (A-Z), digit (0-9), F1-F24, or named key
/// (space, return, escape, tab, backspace, insert, ...).
///
/// At least one modifier is required.
pub fn parse_chord(spec: &str) -> Result<Chord, HotkeyError> {
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    if parts.iter().all(|p| p.is_empty()) {
        return Err(HotkeyError::InvalidBinding("empty binding".into()));
    }

    let mut modifiers = Modifiers::NONE;
    let mut key = None;
    for (i, &part) in parts.iter().enumerate() {
        if let Some(m) = parse_modifier(part) {
            modifiers = modifiers | m;
            continue;
        }
        if i + 1 != parts.len() {
            return Err(HotkeyError::InvalidBinding(format!(
                "unknown modifier: {part:?}"
            )));
        }
        key = Some(
            key_name_to_vk(part)
                .ok_or_else(|| HotkeyError::InvalidBinding(format!("unknown key: {part:?}")))?,
        );
    }

    if modifiers.is_empty() {
        return Err(HotkeyError::InvalidBinding(format!(
            "bare key without modifier: {spec:?}"
        )));
    }

    Ok(Chord {
        modifiers,
        key,
        raw: spec.to_string(),
    })
}

fn parse_modifier(name: &str) -> Option<Modifiers> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Some(Modifiers::SHIFT),
        "control" | "ctrl" => Some(Modifiers::CTRL),
        "alt" | "menu" => Some(Modifiers::ALT),
        "win" | "super" => Some(Modifiers::WIN),
        _ => None,
    }
}

/// Map a key name to a Win32 virtual-key code.
fn key_name_to_vk(name: &str) -> Option<u16> {
    // Letters and digits share their uppercase ASCII value.
    if name.len() == 1 {
        let ch = name.chars().next()?;
        if ch.is_ascii_alphanumeric() {
            return Some(ch.to_ascii_uppercase() as u16);
        }
    }

    // VK_F1 = 0x70 .. VK_F24 = 0x87
    if let Some(rest) = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))
        && let Ok(n) = rest.parse::<u16>()
        && (1..=24).contains(&n)
    {
        return Some(0x70 + n - 1);
    }

    match name.to_ascii_lowercase().as_str() {
        "space" => Some(0x20),
        "return" | "enter" => Some(0x0D),
        "escape" | "esc" => Some(0x1B),
        "tab" => Some(0x09),
        "backspace" => Some(0x08),
        "delete" => Some(0x2E),
        "insert" => Some(0x2D),
        "home" => Some(0x24),
        "end" => Some(0x23),
        "page_up" | "pageup" | "prior" => Some(0x21),
        "page_down" | "pagedown" | "next" => Some(0x22),
        "up" => Some(0x26),
        "down" => Some(0x28),
        "left" => Some(0x25),
        "right" => Some(0x27),
        _ => None,
    }
}
