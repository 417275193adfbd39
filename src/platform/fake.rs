//! Scripted in-memory platform for tests.
//!
//! One [`FakeOs`] implements every adapter trait over a shared state so
//! tests can assert the relative order of clipboard writes, activation
//! calls and injected input through a single call log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    ClipboardBackend, FocusControl, InputInjector, KeyStroke, MemoryBlock, MouseInput,
    PlatformError, PlatformSet, ScreenPoint, VirtualScreen, WindowHandle, WindowQuery,
    keys::MouseAction,
};

/// Everything the fake observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Restore(WindowHandle),
    Attach { from: u32, to: u32, attach: bool },
    SetForeground(WindowHandle),
    SetFocus(WindowHandle),
    Keys(Vec<KeyStroke>),
    Mouse(Vec<MouseInput>),
    PasteMessage(WindowHandle),
    ClipboardOpen,
    ClipboardClose,
    ClipboardEmpty,
    ClipboardSet(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakeWindow {
    pub class: String,
    pub process: String,
    pub root: WindowHandle,
    pub thread: u32,
    /// Deep child reported for any client point.
    pub child: Option<WindowHandle>,
    pub minimized: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub windows: HashMap<WindowHandle, FakeWindow>,
    pub at_point: HashMap<(i32, i32), WindowHandle>,
    pub screen_to_client_fails: bool,
    pub cursor: Option<ScreenPoint>,

    pub current_thread: u32,
    pub foreground: WindowHandle,
    pub focused: WindowHandle,
    /// Window that takes focus when a click lands.
    pub focus_after_click: Option<WindowHandle>,
    /// Number of upcoming `set_foreground` calls another app will win.
    pub lose_foreground_races: u32,
    /// Foreground window installed by a lost race.
    pub rival: WindowHandle,
    pub attached: Vec<(u32, u32)>,
    pub virtual_screen: Option<VirtualScreen>,

    pub clipboard_contents: Option<String>,
    pub clipboard_open: bool,
    pub clipboard_hostile: bool,
    pub clipboard_busy_opens: u32,
    pub clipboard_open_attempts: u32,
    pub clipboard_overlap: bool,
    pub fail_alloc: bool,
    pub fail_empty: bool,
    pub fail_hand_off: bool,
    pub next_block: isize,
    pub live_blocks: HashMap<isize, Vec<u16>>,
    pub os_owned: Vec<isize>,
    pub freed: Vec<isize>,

    pub calls: Vec<Call>,
}

/// Shared handle to the fake OS. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct FakeOs {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOs {
    pub fn new() -> Self {
        let os = Self::default();
        {
            let mut s = os.state();
            s.current_thread = 1;
            s.next_block = 0x1000;
            s.virtual_screen = Some(VirtualScreen {
                left: 0,
                top: 0,
                width: 1920,
                height: 1080,
            });
        }
        os
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Register a top-level window owned by `thread` in `process`.
    pub fn add_window(
        &self,
        handle: isize,
        class: &str,
        process: &str,
        thread: u32,
    ) -> WindowHandle {
        let h = WindowHandle(handle);
        self.state().windows.insert(
            h,
            FakeWindow {
                class: class.into(),
                process: process.into(),
                root: h,
                thread,
                child: None,
                minimized: false,
            },
        );
        h
    }

    /// Register a child of `parent` and make it the deep child at any
    /// client point of the parent.
    pub fn add_child(&self, parent: WindowHandle, handle: isize, class: &str) -> WindowHandle {
        let h = WindowHandle(handle);
        let mut s = self.state();
        let parent_window = s.windows.get(&parent).cloned().unwrap_or_default();
        s.windows.insert(
            h,
            FakeWindow {
                class: class.into(),
                process: parent_window.process.clone(),
                root: parent_window.root.or(parent),
                thread: parent_window.thread,
                child: None,
                minimized: false,
            },
        );
        if let Some(p) = s.windows.get_mut(&parent) {
            p.child = Some(h);
        }
        h
    }

    pub fn place(&self, point: ScreenPoint, window: WindowHandle) {
        self.state().at_point.insert((point.x, point.y), window);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn key_batches(&self) -> Vec<Vec<KeyStroke>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Keys(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    pub fn paste_messages(&self) -> Vec<WindowHandle> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PasteMessage(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn platform(&self) -> PlatformSet {
        PlatformSet {
            windows: Arc::new(self.clone()),
            focus: Arc::new(self.clone()),
            input: Arc::new(self.clone()),
        }
    }

    pub fn clipboard(&self) -> Box<dyn ClipboardBackend> {
        Box::new(self.clone())
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

impl WindowQuery for FakeOs {
    fn window_from_point(&self, point: ScreenPoint) -> WindowHandle {
        self.state()
            .at_point
            .get(&(point.x, point.y))
            .copied()
            .unwrap_or_default()
    }

    fn root_ancestor(&self, window: WindowHandle) -> WindowHandle {
        self.state()
            .windows
            .get(&window)
            .map(|w| w.root)
            .unwrap_or_default()
    }

    fn screen_to_client(&self, window: WindowHandle, point: ScreenPoint) -> Option<ScreenPoint> {
        let s = self.state();
        if s.screen_to_client_fails || !s.windows.contains_key(&window) {
            return None;
        }
        Some(point)
    }

    fn child_at_client_point(&self, window: WindowHandle, _client: ScreenPoint) -> WindowHandle {
        self.state()
            .windows
            .get(&window)
            .map(|w| w.child.unwrap_or(window))
            .unwrap_or_default()
    }

    fn class_name(&self, window: WindowHandle) -> String {
        self.state()
            .windows
            .get(&window)
            .map(|w| w.class.clone())
            .unwrap_or_default()
    }

    fn process_name(&self, window: WindowHandle) -> String {
        self.state()
            .windows
            .get(&window)
            .map(|w| w.process.clone())
            .unwrap_or_default()
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        self.state().cursor
    }
}

impl FocusControl for FakeOs {
    fn is_minimized(&self, window: WindowHandle) -> bool {
        self.state()
            .windows
            .get(&window)
            .is_some_and(|w| w.minimized)
    }

    fn restore(&self, window: WindowHandle) {
        if let Some(w) = self.state().windows.get_mut(&window) {
            w.minimized = false;
        }
        self.record(Call::Restore(window));
    }

    fn foreground_window(&self) -> WindowHandle {
        self.state().foreground
    }

    fn set_foreground(&self, window: WindowHandle) -> bool {
        self.record(Call::SetForeground(window));
        let mut s = self.state();
        if s.lose_foreground_races > 0 {
            s.lose_foreground_races -= 1;
            s.foreground = s.rival;
            return true;
        }
        s.foreground = window;
        true
    }

    fn set_focus(&self, window: WindowHandle) -> bool {
        self.record(Call::SetFocus(window));
        self.state().focused = window;
        true
    }

    fn focused_window(&self) -> WindowHandle {
        self.state().focused
    }

    fn window_thread(&self, window: WindowHandle) -> u32 {
        self.state()
            .windows
            .get(&window)
            .map(|w| w.thread)
            .unwrap_or(0)
    }

    fn current_thread(&self) -> u32 {
        self.state().current_thread
    }

    fn attach_input(&self, from: u32, to: u32, attach: bool) -> bool {
        self.record(Call::Attach { from, to, attach });
        let mut s = self.state();
        if attach {
            s.attached.push((from, to));
            true
        } else if let Some(pos) = s.attached.iter().rposition(|&p| p == (from, to)) {
            s.attached.remove(pos);
            true
        } else {
            false
        }
    }
}

impl InputInjector for FakeOs {
    fn send_keys(&self, strokes: &[KeyStroke]) -> u32 {
        self.record(Call::Keys(strokes.to_vec()));
        strokes.len() as u32
    }

    fn send_mouse(&self, events: &[MouseInput]) -> u32 {
        self.record(Call::Mouse(events.to_vec()));
        let mut s = self.state();
        if events.iter().any(|e| e.action == MouseAction::LeftUp)
            && let Some(target) = s.focus_after_click
        {
            s.focused = target;
        }
        events.len() as u32
    }

    fn virtual_screen(&self) -> Option<VirtualScreen> {
        self.state().virtual_screen
    }

    fn send_paste_message(&self, window: WindowHandle) -> bool {
        self.record(Call::PasteMessage(window));
        true
    }
}

impl ClipboardBackend for FakeOs {
    fn open(&mut self) -> Result<(), PlatformError> {
        let mut s = self.state();
        s.clipboard_open_attempts += 1;
        if s.clipboard_hostile {
            return Err(PlatformError::ClipboardBusy);
        }
        if s.clipboard_busy_opens > 0 {
            s.clipboard_busy_opens -= 1;
            return Err(PlatformError::ClipboardBusy);
        }
        if s.clipboard_open {
            s.clipboard_overlap = true;
            return Err(PlatformError::ClipboardBusy);
        }
        s.clipboard_open = true;
        s.calls.push(Call::ClipboardOpen);
        Ok(())
    }

    fn close(&mut self) {
        let mut s = self.state();
        s.clipboard_open = false;
        s.calls.push(Call::ClipboardClose);
    }

    fn empty(&mut self) -> Result<(), PlatformError> {
        let mut s = self.state();
        if s.fail_empty {
            return Err(PlatformError::call("EmptyClipboard", "scripted failure"));
        }
        s.clipboard_contents = None;
        s.calls.push(Call::ClipboardEmpty);
        Ok(())
    }

    fn alloc_unicode(&mut self, units: &[u16]) -> Result<MemoryBlock, PlatformError> {
        let mut s = self.state();
        if s.fail_alloc {
            return Err(PlatformError::call("GlobalAlloc", "scripted failure"));
        }
        let raw = s.next_block;
        s.next_block += 1;
        s.live_blocks.insert(raw, units.to_vec());
        Ok(MemoryBlock::from_raw(raw))
    }

    fn hand_off_unicode(&mut self, block: MemoryBlock) -> Result<(), (PlatformError, MemoryBlock)> {
        let mut s = self.state();
        if s.fail_hand_off {
            return Err((
                PlatformError::call("SetClipboardData", "scripted failure"),
                block,
            ));
        }
        let units = s.live_blocks.remove(&block.raw()).unwrap_or_default();
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        let text = String::from_utf16_lossy(&units[..end]);
        s.os_owned.push(block.raw());
        s.clipboard_contents = Some(text.clone());
        s.calls.push(Call::ClipboardSet(text));
        Ok(())
    }

    fn free(&mut self, block: MemoryBlock) {
        let mut s = self.state();
        s.live_blocks.remove(&block.raw());
        s.freed.push(block.raw());
    }

    fn read_unicode(&mut self) -> Result<Option<String>, PlatformError> {
        let s = self.state();
        if !s.clipboard_open {
            return Err(PlatformError::call("GetClipboardData", "clipboard not open"));
        }
        Ok(s.clipboard_contents.clone())
    }
}
