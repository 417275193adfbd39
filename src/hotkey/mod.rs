//! Hotkey classifier: raw global keyboard events to discrete triggers.
//!
//! Fed from the low-level keyboard hook, so everything here is pure
//! in-memory state: no waits, no OS calls. Injected events (our own
//! synthetic Ctrl+V included) are dropped before they touch any state.

pub mod keybinding;
pub mod pipeline;

use std::time::{Duration, Instant};

use crate::platform::keys::vk;

pub use keybinding::{Chord, Modifiers, parse_chord};

/// Hotkey errors.
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid key binding: {0}")]
    InvalidBinding(String),
    #[error("keyboard hook: {0}")]
    Hook(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// One observed keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk: u16,
    pub transition: KeyTransition,
    /// Synthesized by some process rather than typed.
    pub injected: bool,
    pub at: Instant,
}

impl KeyEvent {
    pub fn down(vk: u16, at: Instant) -> Self {
        Self {
            vk,
            transition: KeyTransition::Down,
            injected: false,
            at,
        }
    }

    pub fn up(vk: u16, at: Instant) -> Self {
        Self {
            vk,
            transition: KeyTransition::Up,
            injected: false,
            at,
        }
    }

    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }
}

/// Discrete trigger produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyTrigger {
    /// The double chord was pressed twice within the window.
    DoubleChord,
    /// Every modifier of the hold chord is now down.
    HoldStart,
    /// A modifier of an active hold chord was released after a clean hold.
    HoldEnd,
    /// The hold ended without qualifying: another key was pressed during
    /// it (a shortcut such as Ctrl+Alt+T, or an AltGr character), it was
    /// too short or too long, or the modifier state went stale.
    HoldCancel,
}

/// Physical modifier levels, left and right tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierState(u8);

impl ModifierState {
    const L_CTRL: u8 = 1 << 0;
    const R_CTRL: u8 = 1 << 1;
    const L_SHIFT: u8 = 1 << 2;
    const R_SHIFT: u8 = 1 << 3;
    const L_ALT: u8 = 1 << 4;
    const R_ALT: u8 = 1 << 5;
    const L_WIN: u8 = 1 << 6;
    const R_WIN: u8 = 1 << 7;

    fn bit(key: u16) -> Option<u8> {
        // Generic codes are reported for some synthetic or remapped
        // input; they count as the left-hand key.
        match key {
            vk::LCONTROL | vk::CONTROL => Some(Self::L_CTRL),
            vk::RCONTROL => Some(Self::R_CTRL),
            vk::LSHIFT | vk::SHIFT => Some(Self::L_SHIFT),
            vk::RSHIFT => Some(Self::R_SHIFT),
            vk::LMENU | vk::MENU => Some(Self::L_ALT),
            vk::RMENU => Some(Self::R_ALT),
            vk::LWIN => Some(Self::L_WIN),
            vk::RWIN => Some(Self::R_WIN),
            _ => None,
        }
    }

    /// Record a transition. Returns false when `key` is not a modifier.
    pub fn apply(&mut self, key: u16, transition: KeyTransition) -> bool {
        let Some(bit) = Self::bit(key) else {
            return false;
        };
        match transition {
            KeyTransition::Down => self.0 |= bit,
            KeyTransition::Up => self.0 &= !bit,
        }
        true
    }

    /// Logical modifiers currently held on either side.
    pub fn active(&self) -> Modifiers {
        let mut m = Modifiers::NONE;
        if self.0 & (Self::L_CTRL | Self::R_CTRL) != 0 {
            m = m | Modifiers::CTRL;
        }
        if self.0 & (Self::L_SHIFT | Self::R_SHIFT) != 0 {
            m = m | Modifiers::SHIFT;
        }
        if self.0 & (Self::L_ALT | Self::R_ALT) != 0 {
            m = m | Modifiers::ALT;
        }
        if self.0 & (Self::L_WIN | Self::R_WIN) != 0 {
            m = m | Modifiers::WIN;
        }
        m
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyConfig {
    /// Chord that must be pressed twice, e.g. Ctrl+C.
    pub double_chord: Chord,
    pub double_window: Duration,
    /// Modifier-only chord whose hold starts a deferred paste.
    pub hold_chord: Chord,
    /// Holds released sooner than this are cancelled.
    pub hold_min: Duration,
    /// Holds released later than this are cancelled.
    pub hold_max: Duration,
    /// Held modifiers with no modifier event for this long are assumed
    /// released. Key-ups are not delivered to the hook while the secure
    /// desktop is up, so levels can otherwise latch.
    pub modifier_stale_after: Duration,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            double_chord: Chord {
                modifiers: Modifiers::CTRL,
                key: Some(0x43),
                raw: "Ctrl+C".into(),
            },
            double_window: Duration::from_millis(450),
            hold_chord: Chord {
                modifiers: Modifiers::CTRL | Modifiers::ALT,
                key: None,
                raw: "Ctrl+Alt".into(),
            },
            hold_min: Duration::from_millis(200),
            hold_max: Duration::from_secs(30),
            modifier_stale_after: Duration::from_secs(10),
        }
    }
}

/// Progress of the hold chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hold {
    started: Instant,
    /// A non-modifier key went down during the hold.
    interrupted: bool,
}

/// Owned classifier state for one installed hook.
#[derive(Debug)]
pub struct HotkeyClassifier {
    config: HotkeyConfig,
    modifiers: ModifierState,
    last_modifier_event: Option<Instant>,
    /// Trigger key currently held; further downs are auto-repeat.
    trigger_down: bool,
    last_press: Option<Instant>,
    hold: Option<Hold>,
}

impl HotkeyClassifier {
    pub fn new(config: HotkeyConfig) -> Self {
        Self {
            config,
            modifiers: ModifierState::default(),
            last_modifier_event: None,
            trigger_down: false,
            last_press: None,
            hold: None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers.active()
    }

    /// Forget all key state. Returns `HoldCancel` if a hold was active.
    pub fn reset(&mut self) -> Option<HotkeyTrigger> {
        let cancelled = self.hold.take().map(|_| HotkeyTrigger::HoldCancel);
        self.modifiers = ModifierState::default();
        self.last_modifier_event = None;
        self.trigger_down = false;
        self.last_press = None;
        cancelled
    }

    /// Fold one event into the state. Never blocks.
    pub fn on_event(&mut self, event: &KeyEvent) -> Option<HotkeyTrigger> {
        if event.injected {
            return None;
        }

        let expired = self.expire_stale(event.at);

        if self.modifiers.apply(event.vk, event.transition) {
            self.last_modifier_event = Some(event.at);
            if expired.is_some() {
                return expired;
            }
            return self.update_hold(event.at);
        }

        if event.transition == KeyTransition::Down
            && let Some(hold) = self.hold.as_mut()
        {
            hold.interrupted = true;
        }

        if Some(event.vk) != self.config.double_chord.key {
            return expired;
        }
        let pressed = match event.transition {
            KeyTransition::Up => {
                self.trigger_down = false;
                None
            }
            KeyTransition::Down if self.trigger_down => None,
            KeyTransition::Down => {
                self.trigger_down = true;
                if self.modifiers().contains(self.config.double_chord.modifiers) {
                    self.register_press(event.at)
                } else {
                    None
                }
            }
        };
        expired.or(pressed)
    }

    fn expire_stale(&mut self, now: Instant) -> Option<HotkeyTrigger> {
        let last = self.last_modifier_event?;
        if self.modifiers.active().is_empty()
            || now.saturating_duration_since(last) < self.config.modifier_stale_after
        {
            return None;
        }
        tracing::debug!(
            idle_ms = now.saturating_duration_since(last).as_millis() as u64,
            "modifier state went stale, resyncing"
        );
        self.reset()
    }

    fn register_press(&mut self, at: Instant) -> Option<HotkeyTrigger> {
        match self.last_press {
            Some(prev) if at.saturating_duration_since(prev) <= self.config.double_window => {
                self.last_press = None;
                Some(HotkeyTrigger::DoubleChord)
            }
            _ => {
                self.last_press = Some(at);
                None
            }
        }
    }

    fn update_hold(&mut self, at: Instant) -> Option<HotkeyTrigger> {
        let wanted = self.config.hold_chord.modifiers;
        let held = !wanted.is_empty() && self.modifiers().contains(wanted);
        match (held, self.hold) {
            (true, None) => {
                self.hold = Some(Hold {
                    started: at,
                    interrupted: false,
                });
                Some(HotkeyTrigger::HoldStart)
            }
            (false, Some(hold)) => {
                self.hold = None;
                let length = at.saturating_duration_since(hold.started);
                if hold.interrupted
                    || length < self.config.hold_min
                    || length > self.config.hold_max
                {
                    Some(HotkeyTrigger::HoldCancel)
                } else {
                    Some(HotkeyTrigger::HoldEnd)
                }
            }
            _ => None,
        }
    }
}
