use windows::Win32::Foundation::{CloseHandle, POINT};
use windows::Win32::Graphics::Gdi::ScreenToClient;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CWP_SKIPDISABLED, CWP_SKIPINVISIBLE, CWP_SKIPTRANSPARENT, ChildWindowFromPointEx, GA_ROOT,
    GetAncestor, GetClassNameW, GetCursorPos, GetWindowThreadProcessId, WindowFromPoint,
};
use windows::core::PWSTR;

use super::{from_hwnd, to_hwnd};
use crate::platform::{ScreenPoint, WindowHandle, WindowQuery};

pub struct Win32Windows;

impl WindowQuery for Win32Windows {
    fn window_from_point(&self, point: ScreenPoint) -> WindowHandle {
        let pt = POINT {
            x: point.x,
            y: point.y,
        };
        from_hwnd(unsafe { WindowFromPoint(pt) })
    }

    fn root_ancestor(&self, window: WindowHandle) -> WindowHandle {
        if window.is_none() {
            return WindowHandle::NONE;
        }
        from_hwnd(unsafe { GetAncestor(to_hwnd(window), GA_ROOT) })
    }

    fn screen_to_client(&self, window: WindowHandle, point: ScreenPoint) -> Option<ScreenPoint> {
        let mut pt = POINT {
            x: point.x,
            y: point.y,
        };
        let ok = unsafe { ScreenToClient(to_hwnd(window), &mut pt) };
        ok.as_bool().then(|| ScreenPoint::new(pt.x, pt.y))
    }

    fn child_at_client_point(&self, window: WindowHandle, client: ScreenPoint) -> WindowHandle {
        let pt = POINT {
            x: client.x,
            y: client.y,
        };
        let flags = CWP_SKIPDISABLED | CWP_SKIPINVISIBLE | CWP_SKIPTRANSPARENT;
        from_hwnd(unsafe { ChildWindowFromPointEx(to_hwnd(window), pt, flags) })
    }

    fn class_name(&self, window: WindowHandle) -> String {
        if window.is_none() {
            return String::new();
        }
        let mut buf = [0u16; 256];
        let len = unsafe { GetClassNameW(to_hwnd(window), &mut buf) };
        if len <= 0 {
            return String::new();
        }
        String::from_utf16_lossy(&buf[..len as usize])
    }

    fn process_name(&self, window: WindowHandle) -> String {
        if window.is_none() {
            return String::new();
        }
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(to_hwnd(window), Some(&mut pid)) };
        if pid == 0 {
            return String::new();
        }
        image_name(pid)
            .map(|path| file_stem(&path))
            .unwrap_or_default()
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        let mut pt = POINT::default();
        unsafe { GetCursorPos(&mut pt) }.ok()?;
        Some(ScreenPoint::new(pt.x, pt.y))
    }
}

/// Full image path of process `pid`. Fails for elevated processes when
/// we are not elevated ourselves.
fn image_name(pid: u32) -> Option<String> {
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
    let mut buf = [0u16; 1024];
    let mut len = buf.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        )
    };
    let _ = unsafe { CloseHandle(process) };
    queried.ok()?;
    Some(String::from_utf16_lossy(&buf[..len as usize]))
}

/// `C:\dir\devenv.exe` -> `devenv`
fn file_stem(path: &str) -> String {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_strips_directory_and_extension() {
        assert_eq!(
            file_stem(r"C:\Program Files\Microsoft VS\devenv.exe"),
            "devenv"
        );
        assert_eq!(file_stem("notepad.exe"), "notepad");
        assert_eq!(file_stem(r"C:\tools\noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
