use std::mem::size_of;

use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, MOUSE_EVENT_FLAGS,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE,
    MOUSEEVENTF_VIRTUALDESK, MOUSEINPUT, SendInput, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
    SendMessageW, WM_PASTE,
};

use super::to_hwnd;
use crate::platform::keys::MouseAction;
use crate::platform::{InputInjector, KeyStroke, MouseInput, VirtualScreen, WindowHandle};

pub struct Win32Input;

fn key_input(stroke: &KeyStroke) -> INPUT {
    let mut flags: KEYBD_EVENT_FLAGS = KEYEVENTF_SCANCODE;
    if stroke.key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    if stroke.extended {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: stroke.scan_code,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(event: &MouseInput) -> INPUT {
    let mut flags: MOUSE_EVENT_FLAGS = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK;
    flags |= match event.action {
        MouseAction::Move => MOUSEEVENTF_MOVE,
        MouseAction::LeftDown => MOUSEEVENTF_LEFTDOWN,
        MouseAction::LeftUp => MOUSEEVENTF_LEFTUP,
    };
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: event.abs_x,
                dy: event.abs_y,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> u32 {
    if inputs.is_empty() {
        return 0;
    }
    let sent = unsafe { SendInput(inputs, size_of::<INPUT>() as i32) };
    if (sent as usize) < inputs.len() {
        tracing::warn!(
            sent,
            expected = inputs.len(),
            "SendInput accepted a partial batch"
        );
    }
    sent
}

impl InputInjector for Win32Input {
    fn send_keys(&self, strokes: &[KeyStroke]) -> u32 {
        let inputs: Vec<INPUT> = strokes.iter().map(key_input).collect();
        send(&inputs)
    }

    fn send_mouse(&self, events: &[MouseInput]) -> u32 {
        let inputs: Vec<INPUT> = events.iter().map(mouse_input).collect();
        send(&inputs)
    }

    fn virtual_screen(&self) -> Option<VirtualScreen> {
        let screen = unsafe {
            VirtualScreen {
                left: GetSystemMetrics(SM_XVIRTUALSCREEN),
                top: GetSystemMetrics(SM_YVIRTUALSCREEN),
                width: GetSystemMetrics(SM_CXVIRTUALSCREEN),
                height: GetSystemMetrics(SM_CYVIRTUALSCREEN),
            }
        };
        (screen.width > 0 && screen.height > 0).then_some(screen)
    }

    fn send_paste_message(&self, window: WindowHandle) -> bool {
        if window.is_none() {
            return false;
        }
        // WM_PASTE has no meaningful result; delivery is all we can check.
        unsafe {
            SendMessageW(
                to_hwnd(window),
                WM_PASTE,
                Some(WPARAM(0)),
                Some(LPARAM(0)),
            )
        };
        true
    }
}
