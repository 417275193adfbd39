use std::ffi::c_void;

use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, GetClipboardData, IsClipboardFormatAvailable, OpenClipboard,
    SetClipboardData,
};
use windows::Win32::System::Memory::{
    GMEM_MOVEABLE, GMEM_ZEROINIT, GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock,
};
use windows::Win32::System::Ole::CF_UNICODETEXT;

use crate::platform::{ClipboardBackend, MemoryBlock, PlatformError};

pub struct Win32Clipboard;

fn unicode_format() -> u32 {
    u32::from(CF_UNICODETEXT.0)
}

fn hglobal(block: &MemoryBlock) -> HGLOBAL {
    HGLOBAL(block.raw() as *mut c_void)
}

impl ClipboardBackend for Win32Clipboard {
    fn open(&mut self) -> Result<(), PlatformError> {
        unsafe { OpenClipboard(None) }.map_err(|e| {
            tracing::trace!(error = %e, "OpenClipboard refused");
            PlatformError::ClipboardBusy
        })
    }

    fn close(&mut self) {
        if let Err(e) = unsafe { CloseClipboard() } {
            tracing::warn!(error = %e, "CloseClipboard failed");
        }
    }

    fn empty(&mut self) -> Result<(), PlatformError> {
        unsafe { EmptyClipboard() }.map_err(|e| PlatformError::call("EmptyClipboard", e))
    }

    fn alloc_unicode(&mut self, units: &[u16]) -> Result<MemoryBlock, PlatformError> {
        let bytes = std::mem::size_of_val(units);
        let mem = unsafe { GlobalAlloc(GMEM_MOVEABLE | GMEM_ZEROINIT, bytes) }
            .map_err(|e| PlatformError::call("GlobalAlloc", e))?;
        let block = MemoryBlock::from_raw(mem.0 as isize);

        let dst = unsafe { GlobalLock(mem) } as *mut u16;
        if dst.is_null() {
            self.free(block);
            return Err(PlatformError::call("GlobalLock", "returned null"));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(units.as_ptr(), dst, units.len());
            // Unlock reports an error once the lock count reaches zero;
            // that is the expected outcome here.
            let _ = GlobalUnlock(mem);
        }
        Ok(block)
    }

    fn hand_off_unicode(&mut self, block: MemoryBlock) -> Result<(), (PlatformError, MemoryBlock)> {
        let handle = HANDLE(hglobal(&block).0);
        match unsafe { SetClipboardData(unicode_format(), Some(handle)) } {
            Ok(_) => Ok(()),
            Err(e) => Err((PlatformError::call("SetClipboardData", e), block)),
        }
    }

    fn free(&mut self, block: MemoryBlock) {
        if let Err(e) = unsafe { GlobalFree(Some(hglobal(&block))) } {
            tracing::warn!(error = %e, "GlobalFree failed");
        }
    }

    fn read_unicode(&mut self) -> Result<Option<String>, PlatformError> {
        if unsafe { IsClipboardFormatAvailable(unicode_format()) }.is_err() {
            return Ok(None);
        }
        let data = unsafe { GetClipboardData(unicode_format()) }
            .map_err(|e| PlatformError::call("GetClipboardData", e))?;
        let mem = HGLOBAL(data.0);
        let src = unsafe { GlobalLock(mem) } as *const u16;
        if src.is_null() {
            return Err(PlatformError::call("GlobalLock", "returned null"));
        }
        // Another process wrote this block; a missing terminator must not
        // walk us past its end.
        let capacity = unsafe { GlobalSize(mem) } / std::mem::size_of::<u16>();
        let text = unsafe {
            let units = std::slice::from_raw_parts(src, capacity);
            let text = decode_terminated(units);
            let _ = GlobalUnlock(mem);
            text
        };
        Ok(Some(text))
    }
}

/// Decode UTF-16 up to the first NUL, or the whole slice when there is none.
fn decode_terminated(units: &[u16]) -> String {
    let len = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..len])
}
