//! Pluggable OS adapters.
//!
//! Extracts every OS surface the paste engine consumes (window hit
//! testing, focus and activation, input synthesis, clipboard memory)
//! into composable sub-interfaces. The Win32 adapter implements all of
//! them; tests use the scripted fake.

pub mod keys;
#[cfg(windows)]
pub mod win32;

#[cfg(test)]
pub mod fake;

use std::fmt;
use std::sync::Arc;

pub use keys::{KeyStroke, MouseInput, VirtualScreen};

/// Errors returned by platform adapters.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Another process currently holds the clipboard open.
    #[error("clipboard is held by another process")]
    ClipboardBusy,

    /// An OS call failed.
    #[error("{call} failed: {detail}")]
    Call { call: &'static str, detail: String },

    /// The operation has no implementation on this platform.
    #[error("not supported on this platform")]
    Unsupported,
}

impl PlatformError {
    pub fn call(call: &'static str, detail: impl fmt::Display) -> Self {
        Self::Call {
            call,
            detail: detail.to_string(),
        }
    }
}

/// Integer point in virtual-screen device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Opaque OS window handle. Equality only; this program never owns or
/// frees the window behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    /// `self` unless it is empty, in which case `other`.
    pub fn or(self, other: Self) -> Self {
        if self.is_some() { self } else { other }
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// A movable global memory block holding clipboard data.
///
/// Not `Clone`: whoever holds the value is responsible for it. Handing
/// it to [`ClipboardBackend::hand_off_unicode`] moves it to the OS.
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    raw: isize,
}

impl MemoryBlock {
    pub fn from_raw(raw: isize) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> isize {
        self.raw
    }
}

/// Window hierarchy and metadata queries.
pub trait WindowQuery: Send + Sync {
    /// Window geometrically containing `point`, or none.
    fn window_from_point(&self, point: ScreenPoint) -> WindowHandle;

    /// Root ancestor of `window`, or none.
    fn root_ancestor(&self, window: WindowHandle) -> WindowHandle;

    /// Convert a screen point to client coordinates of `window`.
    fn screen_to_client(&self, window: WindowHandle, point: ScreenPoint) -> Option<ScreenPoint>;

    /// Most specific enabled, visible, non-transparent child of `window`
    /// at a client-space point. May return `window` itself, or none.
    fn child_at_client_point(&self, window: WindowHandle, client: ScreenPoint) -> WindowHandle;

    /// Window class name, empty when unavailable.
    fn class_name(&self, window: WindowHandle) -> String;

    /// Owning process name without directory or extension, empty when
    /// unavailable (e.g. elevated targets).
    fn process_name(&self, window: WindowHandle) -> String;

    /// Current pointer position.
    fn cursor_position(&self) -> Option<ScreenPoint>;
}

/// Activation, keyboard focus and input-queue attachment.
pub trait FocusControl: Send + Sync {
    fn is_minimized(&self, window: WindowHandle) -> bool;
    fn restore(&self, window: WindowHandle);
    fn foreground_window(&self) -> WindowHandle;
    fn set_foreground(&self, window: WindowHandle) -> bool;
    fn set_focus(&self, window: WindowHandle) -> bool;
    /// Focused window of the calling thread's (possibly attached) input
    /// queue.
    fn focused_window(&self) -> WindowHandle;
    /// Thread that owns `window`, 0 when unknown.
    fn window_thread(&self, window: WindowHandle) -> u32;
    fn current_thread(&self) -> u32;
    /// Join (`attach = true`) or split the input queues of two threads.
    fn attach_input(&self, from: u32, to: u32, attach: bool) -> bool;
}

/// Synthetic input and direct window messages.
pub trait InputInjector: Send + Sync {
    /// Inject keyboard events as one batch. Returns the number of events
    /// the OS accepted.
    fn send_keys(&self, strokes: &[KeyStroke]) -> u32;

    /// Inject mouse events as one batch.
    fn send_mouse(&self, events: &[MouseInput]) -> u32;

    fn virtual_screen(&self) -> Option<VirtualScreen>;

    /// Send the "paste" control message directly to `window`.
    fn send_paste_message(&self, window: WindowHandle) -> bool;
}

/// Low-level clipboard primitives. Callers own the open/close bracket.
pub trait ClipboardBackend: Send {
    /// Try to open the clipboard once. Fails with
    /// [`PlatformError::ClipboardBusy`] when another process holds it.
    fn open(&mut self) -> Result<(), PlatformError>;

    fn close(&mut self);

    fn empty(&mut self) -> Result<(), PlatformError>;

    /// Allocate a movable, zero-initialised block of `units.len()` UTF-16
    /// units and copy `units` into it. `units` already carries the
    /// terminating zero.
    fn alloc_unicode(&mut self, units: &[u16]) -> Result<MemoryBlock, PlatformError>;

    /// Hand `block` to the clipboard as its Unicode text payload. On
    /// failure the block is returned so the caller can free it.
    fn hand_off_unicode(&mut self, block: MemoryBlock) -> Result<(), (PlatformError, MemoryBlock)>;

    fn free(&mut self, block: MemoryBlock);

    /// Current Unicode text payload, `None` when the clipboard holds no
    /// text. Requires the clipboard to be open.
    fn read_unicode(&mut self) -> Result<Option<String>, PlatformError>;
}

/// A composed set of platform adapters.
///
/// Constructed at startup and shared by the engine components. The
/// clipboard backend is moved into the clipboard transaction separately
/// because it is not `Sync`.
#[derive(Clone)]
pub struct PlatformSet {
    pub windows: Arc<dyn WindowQuery>,
    pub focus: Arc<dyn FocusControl>,
    pub input: Arc<dyn InputInjector>,
}

/// Adapters for the current OS.
#[cfg(windows)]
pub fn native() -> Result<(PlatformSet, Box<dyn ClipboardBackend>), PlatformError> {
    let set = PlatformSet {
        windows: Arc::new(win32::Win32Windows),
        focus: Arc::new(win32::Win32Focus),
        input: Arc::new(win32::Win32Input),
    };
    Ok((set, Box::new(win32::Win32Clipboard)))
}

/// Adapters for the current OS.
#[cfg(not(windows))]
pub fn native() -> Result<(PlatformSet, Box<dyn ClipboardBackend>), PlatformError> {
    Err(PlatformError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_or_prefers_non_empty() {
        assert_eq!(WindowHandle(5).or(WindowHandle(9)), WindowHandle(5));
        assert_eq!(WindowHandle::NONE.or(WindowHandle(9)), WindowHandle(9));
        assert!(WindowHandle::NONE.or(WindowHandle::NONE).is_none());
    }

    #[test]
    fn handle_display_is_hex() {
        assert_eq!(WindowHandle(0x1A2B).to_string(), "0x1A2B");
        assert_eq!(ScreenPoint::new(-3, 40).to_string(), "(-3,40)");
    }
}
