//! Paste orchestration.
//!
//! One attempt runs resolve, clipboard write, activation, click, focus
//! settle and delivery in that order, exactly once. Every failure is
//! terminal for the attempt and lands in the trace; nothing here retries
//! a whole transaction. Panics are caught at the public entry points so
//! a caller on the hook path never unwinds.

pub mod trace;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clipboard::{ClipboardError, ClipboardTransaction};
use crate::clock::{self, Clock, PollPolicy, RetryPolicy};
use crate::dispatch::{Delivery, DispatchTiming, FocusedControl, InputDispatcher};
use crate::focus::FocusCoordinator;
use crate::platform::{ClipboardBackend, PlatformSet, ScreenPoint, WindowHandle, WindowQuery};
use crate::resolver::{ClassificationRules, TargetResolver, WindowTarget};

use trace::{PasteTrace, Stage, TransactionId};

#[derive(Debug, thiserror::Error)]
pub enum PasteError {
    #[error("clipboard acquisition timed out after {attempts} attempts")]
    ClipboardAcquisitionTimeout { attempts: u32 },

    #[error(transparent)]
    Clipboard(ClipboardError),

    #[error("target window {window} lost the foreground race")]
    FocusActivationRaceLost { window: WindowHandle },

    #[error("no focused control found under the target")]
    NoFocusedControlFound,

    #[error("target resolution failed: {0}")]
    Resolution(String),

    #[error("paste attempt panicked: {0}")]
    Panicked(String),
}

impl From<ClipboardError> for PasteError {
    fn from(e: ClipboardError) -> Self {
        match e {
            ClipboardError::AcquisitionTimeout { attempts } => {
                Self::ClipboardAcquisitionTimeout { attempts }
            }
            other => Self::Clipboard(other),
        }
    }
}

/// Waits and bounds used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTiming {
    pub clipboard: RetryPolicy,
    /// Pause after the caret click before reading focus.
    pub click_settle: Duration,
    pub focus_poll: PollPolicy,
    pub slow_host_hold: Duration,
    /// Pause between activating a remembered window and the chord.
    pub deferred_settle: Duration,
    /// How long to wait for copied text to show up on the clipboard.
    pub capture_poll: PollPolicy,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            clipboard: RetryPolicy {
                attempts: 20,
                backoff: Duration::from_millis(20),
            },
            click_settle: Duration::from_millis(120),
            focus_poll: PollPolicy {
                timeout: Duration::from_millis(40),
                interval: Duration::from_millis(10),
            },
            slow_host_hold: Duration::from_millis(35),
            deferred_settle: Duration::from_millis(80),
            capture_poll: PollPolicy {
                timeout: Duration::from_millis(200),
                interval: Duration::from_millis(25),
            },
        }
    }
}

/// State of one paste attempt. Discarded once the attempt finishes.
#[derive(Debug)]
pub struct PasteTransaction {
    pub cursor: Option<ScreenPoint>,
    pub target: WindowTarget,
    pub focused_after: FocusedControl,
    pub trace: PasteTrace,
}

impl PasteTransaction {
    fn new(clock: &dyn Clock) -> Self {
        Self {
            cursor: None,
            target: WindowTarget::default(),
            focused_after: FocusedControl::default(),
            trace: PasteTrace::new(TransactionId::new(), clock.now()),
        }
    }

    pub fn id(&self) -> &TransactionId {
        self.trace.id()
    }
}

/// What a caller gets back from one attempt.
#[derive(Debug)]
pub struct PasteOutcome {
    pub id: TransactionId,
    pub result: Result<Delivery, PasteError>,
}

impl PasteOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct PasteEngine {
    windows: Arc<dyn WindowQuery>,
    resolver: TargetResolver,
    clipboard: ClipboardTransaction,
    focus: FocusCoordinator,
    dispatcher: InputDispatcher,
    clock: Arc<dyn Clock>,
    timing: EngineTiming,
    deferred: Mutex<WindowHandle>,
    /// Held for the whole of one attempt so transactions never interleave.
    serial: Mutex<()>,
}

impl PasteEngine {
    pub fn new(
        platform: PlatformSet,
        clipboard: Box<dyn ClipboardBackend>,
        rules: Arc<ClassificationRules>,
        clock: Arc<dyn Clock>,
        timing: EngineTiming,
    ) -> Self {
        Self {
            windows: platform.windows.clone(),
            resolver: TargetResolver::new(platform.windows, rules.clone()),
            clipboard: ClipboardTransaction::new(clipboard, clock.clone(), timing.clipboard),
            focus: FocusCoordinator::new(platform.focus, clock.clone()),
            dispatcher: InputDispatcher::new(
                platform.input,
                rules,
                clock.clone(),
                DispatchTiming {
                    slow_host_hold: timing.slow_host_hold,
                },
            ),
            clock,
            timing,
            deferred: Mutex::new(WindowHandle::NONE),
            serial: Mutex::new(()),
        }
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Paste `text` into whatever owns `point`.
    pub fn paste_at_point(&self, point: ScreenPoint, text: &str) -> PasteOutcome {
        self.run(|txn| self.deliver_at_point(point, text, txn))
    }

    /// Paste under the current pointer position, or into the foreground
    /// window when the position cannot be read.
    pub fn paste_at_cursor(&self, text: &str) -> PasteOutcome {
        self.run(|txn| match self.windows.cursor_position() {
            Some(point) => self.deliver_at_point(point, text, txn),
            None => {
                txn.trace.log(
                    self.clock.now(),
                    Stage::Resolve,
                    "cursor position unavailable, falling back to foreground",
                );
                self.deliver_to_foreground(text, txn)
            }
        })
    }

    pub fn paste_to_foreground(&self, text: &str) -> PasteOutcome {
        self.run(|txn| self.deliver_to_foreground(text, txn))
    }

    /// Remember `window` as the target of the next deferred paste.
    pub fn begin_deferred(&self, window: WindowHandle) {
        *self.lock_deferred() = window;
        tracing::debug!(hwnd = %window, "deferred paste target set");
    }

    pub fn cancel_deferred(&self) {
        *self.lock_deferred() = WindowHandle::NONE;
    }

    /// Remember the current foreground window for the next deferred
    /// paste and return it.
    pub fn begin_deferred_foreground(&self) -> WindowHandle {
        let window = self.focus.foreground_window();
        self.begin_deferred(window);
        window
    }

    pub fn has_deferred_target(&self) -> bool {
        self.lock_deferred().is_some()
    }

    /// Paste into the remembered window and forget it. Without one the
    /// text goes to the foreground window.
    pub fn paste_deferred(&self, text: &str) -> PasteOutcome {
        let target = std::mem::take(&mut *self.lock_deferred());
        if target.is_none() {
            return self.paste_to_foreground(text);
        }
        self.run(|txn| self.deliver_to_window(target, text, txn))
    }

    /// Text currently on the clipboard, waiting briefly for a copy that
    /// another application is still completing.
    pub fn capture_clipboard_text(&self) -> Result<Option<String>, PasteError> {
        let _serial = self.lock_serial();
        clock::poll_until(self.clock.as_ref(), self.timing.capture_poll, || {
            match self.clipboard.get_text() {
                Ok(Some(text)) if !text.is_empty() => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(PasteError::from(e))),
            }
        })
        .transpose()
    }

    fn run(
        &self,
        body: impl FnOnce(&mut PasteTransaction) -> Result<Delivery, PasteError>,
    ) -> PasteOutcome {
        let _serial = self.lock_serial();
        let mut txn = PasteTransaction::new(self.clock.as_ref());
        let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut txn)))
            .unwrap_or_else(|payload| Err(PasteError::Panicked(panic_message(payload.as_ref()))));

        let now = self.clock.now();
        match &result {
            Ok(delivery) => txn.trace.log(now, Stage::Result, delivery.to_string()),
            Err(e) => txn.trace.log(now, Stage::Error, e.to_string()),
        }
        txn.trace.flush(result.is_ok());

        PasteOutcome {
            id: txn.id().clone(),
            result,
        }
    }

    fn deliver_at_point(
        &self,
        point: ScreenPoint,
        text: &str,
        txn: &mut PasteTransaction,
    ) -> Result<Delivery, PasteError> {
        txn.cursor = Some(point);
        txn.target = self.resolver.resolve(point);
        let target = &txn.target;
        txn.trace.log(
            self.clock.now(),
            Stage::Resolve,
            format!(
                "point={point} top={} deep={} class={:?} top_class={:?} process={:?} category={}",
                target.top_level,
                target.deep_child,
                target.window_class_name,
                target.top_class_name,
                target.owner_process_name,
                self.resolver.categorize(target),
            ),
        );

        self.write_clipboard(text, txn)?;

        let top = txn.target.top_level;
        if top.is_some() {
            self.activate(top, txn)?;
        } else {
            txn.trace.log(
                self.clock.now(),
                Stage::Activate,
                "no top-level window, skipped",
            );
        }

        self.dispatcher.click_at(point, &mut txn.trace);
        self.clock.sleep(self.timing.click_settle);

        let focused = if top.is_some() {
            self.focus.wait_for_focus(top, self.timing.focus_poll)
        } else {
            WindowHandle::NONE
        };
        txn.focused_after = FocusedControl {
            handle: focused,
            class_name: self.resolver.class_name(focused),
        };
        txn.trace.log(
            self.clock.now(),
            Stage::Focus,
            format!(
                "focused after click={} ({:?})",
                focused, txn.focused_after.class_name
            ),
        );

        if txn.target.deep_child.is_none() && focused.is_none() {
            return Err(PasteError::NoFocusedControlFound);
        }

        Ok(self
            .dispatcher
            .deliver(&txn.target, &txn.focused_after, &mut txn.trace))
    }

    fn deliver_to_foreground(
        &self,
        text: &str,
        txn: &mut PasteTransaction,
    ) -> Result<Delivery, PasteError> {
        let foreground = self.focus.foreground_window();
        txn.trace.log(
            self.clock.now(),
            Stage::Resolve,
            format!("foreground window={foreground}"),
        );
        if foreground.is_none() {
            self.write_clipboard(text, txn)?;
            return Err(PasteError::Resolution(
                "no foreground window; text left on clipboard".into(),
            ));
        }
        self.deliver_to_window(foreground, text, txn)
    }

    fn deliver_to_window(
        &self,
        window: WindowHandle,
        text: &str,
        txn: &mut PasteTransaction,
    ) -> Result<Delivery, PasteError> {
        self.write_clipboard(text, txn)?;

        let top = self.windows.root_ancestor(window).or(window);
        txn.target = WindowTarget {
            top_level: top,
            point: window,
            deep_child: WindowHandle::NONE,
            window_class_name: String::new(),
            top_class_name: self.resolver.class_name(top),
            owner_process_name: self.windows.process_name(top),
        };
        self.activate(top, txn)?;
        self.clock.sleep(self.timing.deferred_settle);

        let delivery = Delivery::KeyChord {
            hold: Duration::ZERO,
        };
        self.dispatcher.execute(delivery, &mut txn.trace);
        Ok(delivery)
    }

    fn write_clipboard(&self, text: &str, txn: &mut PasteTransaction) -> Result<(), PasteError> {
        self.clipboard.set_text(text)?;
        txn.trace.log(
            self.clock.now(),
            Stage::Clipboard,
            format!("text set, {} chars", text.chars().count()),
        );
        Ok(())
    }

    fn activate(&self, top: WindowHandle, txn: &mut PasteTransaction) -> Result<(), PasteError> {
        let ok = self.focus.activate(top);
        txn.trace.log(
            self.clock.now(),
            Stage::Activate,
            format!(
                "bring to foreground {top} ok={ok} foreground={}",
                self.focus.foreground_window()
            ),
        );
        if ok {
            Ok(())
        } else {
            Err(PasteError::FocusActivationRaceLost { window: top })
        }
    }

    fn lock_serial(&self) -> MutexGuard<'_, ()> {
        self.serial
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_deferred(&self) -> MutexGuard<'_, WindowHandle> {
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
