use windows::Win32::System::Threading::{AttachThreadInput, GetCurrentThreadId};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetFocus, SetFocus};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, IsIconic, SW_RESTORE, SetForegroundWindow,
    ShowWindow,
};

use super::{from_hwnd, to_hwnd};
use crate::platform::{FocusControl, WindowHandle};

pub struct Win32Focus;

impl FocusControl for Win32Focus {
    fn is_minimized(&self, window: WindowHandle) -> bool {
        unsafe { IsIconic(to_hwnd(window)) }.as_bool()
    }

    fn restore(&self, window: WindowHandle) {
        // Return value is the previous visibility, not success.
        let _ = unsafe { ShowWindow(to_hwnd(window), SW_RESTORE) };
    }

    fn foreground_window(&self) -> WindowHandle {
        from_hwnd(unsafe { GetForegroundWindow() })
    }

    fn set_foreground(&self, window: WindowHandle) -> bool {
        unsafe { SetForegroundWindow(to_hwnd(window)) }.as_bool()
    }

    fn set_focus(&self, window: WindowHandle) -> bool {
        unsafe { SetFocus(Some(to_hwnd(window))) }.is_ok()
    }

    fn focused_window(&self) -> WindowHandle {
        from_hwnd(unsafe { GetFocus() })
    }

    fn window_thread(&self, window: WindowHandle) -> u32 {
        if window.is_none() {
            return 0;
        }
        unsafe { GetWindowThreadProcessId(to_hwnd(window), None) }
    }

    fn current_thread(&self) -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    fn attach_input(&self, from: u32, to: u32, attach: bool) -> bool {
        unsafe { AttachThreadInput(from, to, attach) }.as_bool()
    }
}
