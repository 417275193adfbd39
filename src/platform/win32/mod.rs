//! Win32 adapters.
//!
//! Thin wrappers over the `windows` crate. Every function here is a
//! direct translation of one trait method into one or two OS calls; the
//! policy lives in the engine.

mod clipboard;
mod focus;
pub mod hook;
mod input;
mod window;

use std::ffi::c_void;

use windows::Win32::Foundation::HWND;

pub use clipboard::Win32Clipboard;
pub use focus::Win32Focus;
pub use input::Win32Input;
pub use window::Win32Windows;

use super::WindowHandle;

fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}
