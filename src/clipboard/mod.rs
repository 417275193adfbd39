//! Clipboard transaction: acquire, write one Unicode payload, release.
//!
//! The clipboard is a single OS-wide resource that only one process may
//! hold open, so acquisition retries under a bounded [`RetryPolicy`].
//! Once the hand-off succeeds the OS owns the memory block; on any
//! failure after allocation the block is freed here before returning.
//! Calls are serialized by an internal mutex: concurrent callers queue.

use std::sync::{Arc, Mutex};

use crate::clock::{self, Clock, RetryPolicy};
use crate::platform::{ClipboardBackend, MemoryBlock, PlatformError};

/// Clipboard transaction failures. Callers abort the current paste
/// attempt on any of these; they never retry the whole transaction.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard acquisition timed out after {attempts} attempts")]
    AcquisitionTimeout { attempts: u32 },

    #[error("clipboard allocation failed: {0}")]
    Allocation(PlatformError),

    #[error("emptying clipboard failed: {0}")]
    Empty(PlatformError),

    #[error("clipboard hand-off failed: {0}")]
    HandOff(PlatformError),

    #[error("clipboard read failed: {0}")]
    Read(PlatformError),
}

/// Serialized writer for the OS clipboard.
pub struct ClipboardTransaction {
    backend: Mutex<Box<dyn ClipboardBackend>>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl ClipboardTransaction {
    pub fn new(
        backend: Box<dyn ClipboardBackend>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend: Mutex::new(backend),
            clock,
            policy,
        }
    }

    /// Replace the clipboard contents with `text`.
    pub fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut units: Vec<u16> = text.encode_utf16().collect();
        units.push(0);

        let mut backend = self.lock_backend();
        let open = self.acquire(backend.as_mut())?;

        let block = open
            .backend
            .alloc_unicode(&units)
            .map_err(ClipboardError::Allocation)?;

        if let Err(e) = open.backend.empty() {
            open.backend.free(block);
            return Err(ClipboardError::Empty(e));
        }

        match open.backend.hand_off_unicode(block) {
            Ok(()) => {
                tracing::debug!(units = units.len(), "clipboard text set");
                Ok(())
            }
            Err((e, block)) => {
                free_unowned(&mut *open.backend, block);
                Err(ClipboardError::HandOff(e))
            }
        }
    }

    /// Current Unicode text on the clipboard, if any.
    pub fn get_text(&self) -> Result<Option<String>, ClipboardError> {
        let mut backend = self.lock_backend();
        let open = self.acquire(backend.as_mut())?;
        open.backend.read_unicode().map_err(ClipboardError::Read)
    }

    fn lock_backend(&self) -> std::sync::MutexGuard<'_, Box<dyn ClipboardBackend>> {
        // A panic mid-transaction leaves the backend usable: the open
        // guard has already closed the clipboard during unwinding.
        self.backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn acquire<'a>(
        &self,
        backend: &'a mut dyn ClipboardBackend,
    ) -> Result<OpenClipboard<'a>, ClipboardError> {
        let result = clock::retry(self.clock.as_ref(), self.policy, |attempt| {
            let r = backend.open();
            if let Err(e) = &r {
                tracing::trace!(attempt, error = %e, "clipboard open failed");
            }
            r
        });
        match result {
            Ok(((), attempts)) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "clipboard acquired after contention");
                }
                Ok(OpenClipboard { backend })
            }
            Err(exhausted) => {
                tracing::warn!(
                    attempts = exhausted.attempts,
                    last_error = ?exhausted.last_error,
                    "clipboard acquisition timed out"
                );
                Err(ClipboardError::AcquisitionTimeout {
                    attempts: exhausted.attempts,
                })
            }
        }
    }
}

/// Open clipboard bracket; closes on drop.
struct OpenClipboard<'a> {
    backend: &'a mut dyn ClipboardBackend,
}

impl Drop for OpenClipboard<'_> {
    fn drop(&mut self) {
        self.backend.close();
    }
}

fn free_unowned(backend: &mut dyn ClipboardBackend, block: MemoryBlock) {
    tracing::debug!(
        block = block.raw(),
        "freeing clipboard block after failed hand-off"
    );
    backend.free(block);
}
