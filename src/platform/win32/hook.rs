//! Low-level keyboard hook thread.
//!
//! The hook callback runs on the thread that installed it, inside that
//! thread's message loop. The pipeline is parked in a thread-local so
//! the callback can reach it without locks.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, KBDLLHOOKSTRUCT, LLKHF_INJECTED,
    LLKHF_LOWER_IL_INJECTED, MSG, PM_NOREMOVE, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, WH_KEYBOARD_LL, WM_KEYDOWN,
    WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
};

use crate::hotkey::pipeline::HookPipeline;
use crate::hotkey::{HotkeyError, KeyEvent, KeyTransition};

thread_local! {
    static PIPELINE: RefCell<Option<HookPipeline>> = const { RefCell::new(None) };
}

/// An installed keyboard hook. Dropping it removes the hook and joins
/// the hook thread.
pub struct KeyboardHook {
    thread_id: u32,
    join: Option<JoinHandle<()>>,
}

impl KeyboardHook {
    /// Spawn the hook thread and install the hook on it. Returns once
    /// the hook is live.
    pub fn install(pipeline: HookPipeline) -> Result<Self, HotkeyError> {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let join = thread::Builder::new()
            .name("keyboard-hook".into())
            .spawn(move || hook_thread(pipeline, ready_tx))
            .map_err(|e| HotkeyError::Hook(format!("spawn hook thread: {e}")))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| HotkeyError::Hook("hook thread exited during setup".into()))??;
        tracing::info!(thread_id, "keyboard hook installed");
        Ok(Self {
            thread_id,
            join: Some(join),
        })
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        if let Err(e) =
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
        {
            tracing::warn!(error = %e, "failed to stop keyboard hook thread");
            return;
        }
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            tracing::warn!("keyboard hook thread panicked");
        }
        tracing::info!("keyboard hook removed");
    }
}

fn hook_thread(pipeline: HookPipeline, ready: std_mpsc::Sender<Result<u32, HotkeyError>>) {
    PIPELINE.with(|slot| *slot.borrow_mut() = Some(pipeline));

    let installed = unsafe {
        GetModuleHandleW(None).and_then(|module| {
            SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                Some(HINSTANCE(module.0)),
                0,
            )
        })
    };
    let hook = match installed {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(HotkeyError::Hook(e.to_string())));
            PIPELINE.with(|slot| slot.borrow_mut().take());
            return;
        }
    };

    // Force creation of this thread's message queue so WM_QUIT posted
    // right after setup is not lost.
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    // 0 is WM_QUIT, -1 an error; both end the loop.
    while unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 > 0 {
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
        tracing::warn!(error = %e, "UnhookWindowsHookEx failed");
    }
    PIPELINE.with(|slot| slot.borrow_mut().take());
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let transition = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::Up),
            _ => None,
        };
        if let Some(transition) = transition {
            let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
            let event = KeyEvent {
                vk: info.vkCode as u16,
                transition,
                injected: info.flags.0 & (LLKHF_INJECTED.0 | LLKHF_LOWER_IL_INJECTED.0) != 0,
                at: Instant::now(),
            };
            // Unwinding across the OS boundary aborts the process.
            let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                PIPELINE.with(|slot| {
                    if let Ok(mut slot) = slot.try_borrow_mut()
                        && let Some(pipeline) = slot.as_mut()
                    {
                        pipeline.ingest(event);
                    }
                })
            }));
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}
