//! Input dispatcher. Executes exactly one delivery mechanism per paste.
//!
//! Legacy edit controls get a direct paste message. Everything else gets
//! a synthetic Ctrl+V built from scan codes; IDE processes and toolkit
//! hosts have slower input pipelines and get the chord held down a
//! little longer before release. The clipboard has already been written
//! by the caller; nothing here writes it again or retries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::platform::keys::{MouseAction, scan};
use crate::platform::{InputInjector, KeyStroke, MouseInput, ScreenPoint, WindowHandle};
use crate::resolver::{ClassificationRules, WindowTarget};
use crate::transaction::trace::{PasteTrace, Stage};

/// Key-ups for every modifier form the trigger hotkey may have left
/// pressed: Ctrl, Shift and Alt, left and right.
const MODIFIER_RELEASE: [KeyStroke; 6] = [
    KeyStroke::up(scan::CONTROL),
    KeyStroke::up(scan::CONTROL).extended(),
    KeyStroke::up(scan::SHIFT_LEFT),
    KeyStroke::up(scan::SHIFT_RIGHT),
    KeyStroke::up(scan::ALT),
    KeyStroke::up(scan::ALT).extended(),
];

const PASTE_DOWN: [KeyStroke; 2] = [KeyStroke::down(scan::CONTROL), KeyStroke::down(scan::V)];
const PASTE_UP: [KeyStroke; 2] = [KeyStroke::up(scan::V), KeyStroke::up(scan::CONTROL)];

/// The control that had keyboard focus after activation and click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedControl {
    pub handle: WindowHandle,
    pub class_name: String,
}

/// Which mechanism was (or will be) used for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Paste message sent straight to a legacy edit control.
    DirectMessage { window: WindowHandle },
    /// Synthetic Ctrl+V, held for `hold` before release.
    KeyChord { hold: Duration },
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectMessage { window } => write!(f, "paste message to {window}"),
            Self::KeyChord { hold } => write!(f, "ctrl+v hold_ms={}", hold.as_millis()),
        }
    }
}

/// Dispatcher timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTiming {
    /// Extra hold for IDE processes and toolkit hosts.
    pub slow_host_hold: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            slow_host_hold: Duration::from_millis(35),
        }
    }
}

pub struct InputDispatcher {
    input: Arc<dyn InputInjector>,
    rules: Arc<ClassificationRules>,
    clock: Arc<dyn Clock>,
    timing: DispatchTiming,
}

impl InputDispatcher {
    pub fn new(
        input: Arc<dyn InputInjector>,
        rules: Arc<ClassificationRules>,
        clock: Arc<dyn Clock>,
        timing: DispatchTiming,
    ) -> Self {
        Self {
            input,
            rules,
            clock,
            timing,
        }
    }

    /// Decide the delivery mechanism. Evaluated in order:
    ///
    /// 1. deep child or focused control is a classic edit → message;
    /// 2. IDE process, or any toolkit-host class → held chord;
    /// 3. otherwise → chord with no hold.
    pub fn plan(&self, target: &WindowTarget, focused: &FocusedControl) -> Delivery {
        if target.deep_child.is_some() && self.rules.is_classic_edit(&target.window_class_name) {
            return Delivery::DirectMessage {
                window: target.deep_child,
            };
        }
        if focused.handle.is_some() && self.rules.is_classic_edit(&focused.class_name) {
            return Delivery::DirectMessage {
                window: focused.handle,
            };
        }

        let slow_host = self.rules.is_developer_process(&target.owner_process_name)
            || self.rules.is_toolkit_host(&target.top_class_name)
            || self.rules.is_toolkit_host(&target.window_class_name)
            || self.rules.is_toolkit_host(&focused.class_name);

        Delivery::KeyChord {
            hold: if slow_host {
                self.timing.slow_host_hold
            } else {
                Duration::ZERO
            },
        }
    }

    /// Plan and execute exactly one delivery.
    pub fn deliver(
        &self,
        target: &WindowTarget,
        focused: &FocusedControl,
        trace: &mut PasteTrace,
    ) -> Delivery {
        let delivery = self.plan(target, focused);
        self.execute(delivery, trace);
        delivery
    }

    pub fn execute(&self, delivery: Delivery, trace: &mut PasteTrace) {
        match delivery {
            Delivery::DirectMessage { window } => {
                let sent = self.input.send_paste_message(window);
                trace.log(
                    self.clock.now(),
                    Stage::Message,
                    format!("paste message to {window} sent={sent}"),
                );
            }
            Delivery::KeyChord { hold } => {
                self.release_modifiers(trace);
                self.send_paste_chord(hold, trace);
            }
        }
    }

    /// Synthetic key-ups for all modifier forms, so a modifier still
    /// held from the trigger hotkey cannot leak into the chord.
    pub fn release_modifiers(&self, trace: &mut PasteTrace) {
        let sent = self.input.send_keys(&MODIFIER_RELEASE);
        trace.log(
            self.clock.now(),
            Stage::Keys,
            format!("modifiers released sent={sent}"),
        );
    }

    /// One Ctrl+V down batch, optional hold, one up batch.
    pub fn send_paste_chord(&self, hold: Duration, trace: &mut PasteTrace) {
        let down = self.input.send_keys(&PASTE_DOWN);
        if !hold.is_zero() {
            self.clock.sleep(hold);
        }
        let up = self.input.send_keys(&PASTE_UP);
        trace.log(
            self.clock.now(),
            Stage::Keys,
            format!("ctrl+v down={down} up={up} hold_ms={}", hold.as_millis()),
        );
    }

    /// Best-effort left click at `point` to place a caret. Returns
    /// whether any event was injected.
    pub fn click_at(&self, point: ScreenPoint, trace: &mut PasteTrace) -> bool {
        let Some(screen) = self.input.virtual_screen() else {
            trace.log(self.clock.now(), Stage::Click, "virtual screen unavailable");
            return false;
        };
        let Some((abs_x, abs_y)) = screen.normalize(point.x, point.y) else {
            trace.log(
                self.clock.now(),
                Stage::Click,
                "virtual screen size invalid",
            );
            return false;
        };

        let events = [
            MouseAction::Move,
            MouseAction::LeftDown,
            MouseAction::LeftUp,
        ]
        .map(|action| MouseInput {
                action,
                abs_x,
                abs_y,
            });
        let sent = self.input.send_mouse(&events);
        trace.log(
            self.clock.now(),
            Stage::Click,
            format!("click at {point} abs=({abs_x},{abs_y}) sent={sent}"),
        );
        sent > 0
    }
}
