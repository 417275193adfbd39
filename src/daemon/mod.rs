//! Hotkey listener: keyboard hook triggers wired to the paste engine.
//!
//! - DoubleChord copies the current clipboard text into a single-slot
//!   relay buffer.
//! - HoldStart remembers the foreground window as the deferred target.
//! - HoldEnd pastes the relay into that window, then forgets the target.
//! - HoldCancel forgets the target without pasting.
//!
//! Triggers run one at a time in arrival order. The blocking engine work
//! happens on the blocking pool and is awaited before the next trigger
//! is taken, so paste transactions never interleave.

use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::{ConfigError, Settings};
use crate::hotkey::pipeline::{self, HookPipeline};
use crate::hotkey::{HotkeyError, HotkeyTrigger};
use crate::platform::{self, PlatformError};
use crate::transaction::{PasteEngine, PasteOutcome};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
    #[error("trigger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Applies triggers to the engine and owns the relay buffer.
pub struct TriggerRouter {
    engine: Arc<PasteEngine>,
    /// `None` until the first capture. Not cleared by a paste, so the
    /// same text can be pasted repeatedly.
    relay: Option<String>,
}

impl TriggerRouter {
    pub fn new(engine: Arc<PasteEngine>) -> Self {
        Self {
            engine,
            relay: None,
        }
    }

    pub fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    /// Handle one trigger. Returns the outcome when a paste was attempted.
    pub fn handle(&mut self, trigger: HotkeyTrigger) -> Option<PasteOutcome> {
        match trigger {
            HotkeyTrigger::DoubleChord => {
                self.capture();
                None
            }
            HotkeyTrigger::HoldStart => {
                let window = self.engine.begin_deferred_foreground();
                tracing::debug!(hwnd = %window, "hold started");
                None
            }
            HotkeyTrigger::HoldEnd => {
                let outcome = match self.relay.as_deref() {
                    Some(text) => Some(self.engine.paste_deferred(text)),
                    None => {
                        tracing::debug!("hold ended with an empty relay");
                        None
                    }
                };
                self.engine.cancel_deferred();
                outcome
            }
            HotkeyTrigger::HoldCancel => {
                tracing::debug!("hold cancelled");
                self.engine.cancel_deferred();
                None
            }
        }
    }

    fn capture(&mut self) {
        match self.engine.capture_clipboard_text() {
            Ok(Some(text)) => {
                tracing::info!(chars = text.chars().count(), "captured clipboard text");
                self.relay = Some(text);
            }
            Ok(None) => tracing::debug!("no clipboard text to capture"),
            Err(e) => tracing::warn!(error = %e, "clipboard capture failed"),
        }
    }
}

/// Engine over the native platform adapters.
pub fn native_engine(settings: &Settings) -> Result<PasteEngine, DaemonError> {
    let (platform, clipboard) = platform::native()?;
    Ok(PasteEngine::new(
        platform,
        clipboard,
        settings.classification_rules()?,
        Arc::new(SystemClock),
        settings.timing.engine_timing(),
    ))
}

/// Run the listener until Ctrl+C.
pub async fn run(settings: &Settings) -> Result<(), DaemonError> {
    let hotkeys = settings.hotkeys.hotkey_config()?;
    let engine = Arc::new(native_engine(settings)?);

    let (pipeline, mut triggers, stats) =
        pipeline::channel(hotkeys.clone(), settings.hotkeys.queue_capacity);
    let hook = install_hook(pipeline)?;
    tracing::info!(
        double_chord = %hotkeys.double_chord,
        hold_chord = %hotkeys.hold_chord,
        "listening"
    );

    let mut router = TriggerRouter::new(engine);
    loop {
        tokio::select! {
            trigger = triggers.recv() => {
                let Some(trigger) = trigger else {
                    tracing::warn!("trigger queue closed");
                    break;
                };
                tracing::debug!(?trigger, "trigger received");
                let (returned, outcome) = tokio::task::spawn_blocking(move || {
                    let outcome = router.handle(trigger);
                    (router, outcome)
                })
                .await?;
                router = returned;
                if let Some(outcome) = outcome
                    && let Err(e) = &outcome.result
                {
                    tracing::warn!(txn = %outcome.id, error = %e, "paste failed");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    drop(hook);
    tracing::info!(
        dropped = stats.dropped(),
        panics = stats.panics(),
        "listener stopped"
    );
    Ok(())
}

#[cfg(windows)]
fn install_hook(
    pipeline: HookPipeline,
) -> Result<platform::win32::hook::KeyboardHook, DaemonError> {
    Ok(platform::win32::hook::KeyboardHook::install(pipeline)?)
}

#[cfg(not(windows))]
fn install_hook(_pipeline: HookPipeline) -> Result<(), DaemonError> {
    Err(PlatformError::Unsupported.into())
}
