//! Structured per-transaction trace.
//!
//! Entries are buffered for the lifetime of one paste attempt and
//! flushed to `tracing` in one go when the attempt finishes, so a
//! transaction's lines stay together in the log even when the hook
//! thread is logging concurrently.

use std::fmt;
use std::time::{Duration, Instant};

/// Short opaque token identifying one paste attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Step of the paste pipeline an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Clipboard,
    Activate,
    Click,
    Focus,
    Keys,
    Message,
    Result,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Clipboard => "clipboard",
            Self::Activate => "activate",
            Self::Click => "click",
            Self::Focus => "focus",
            Self::Keys => "keys",
            Self::Message => "message",
            Self::Result => "result",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub at: Duration,
    pub stage: Stage,
    pub message: String,
}

/// Ordered log of one transaction.
#[derive(Debug)]
pub struct PasteTrace {
    id: TransactionId,
    started: Instant,
    entries: Vec<TraceEntry>,
}

impl PasteTrace {
    pub fn new(id: TransactionId, started: Instant) -> Self {
        Self {
            id,
            started,
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn log(&mut self, now: Instant, stage: Stage, message: impl Into<String>) {
        self.entries.push(TraceEntry {
            at: now.saturating_duration_since(self.started),
            stage,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.entries.iter().any(|e| e.stage == stage)
    }

    /// Emit every entry, then a summary line.
    pub fn flush(&self, succeeded: bool) {
        for entry in &self.entries {
            tracing::info!(
                txn = %self.id,
                at_ms = entry.at.as_millis() as u64,
                stage = %entry.stage,
                "{}",
                entry.message
            );
        }
        let total_ms = self.entries.last().map_or(0, |e| e.at.as_millis() as u64);
        if succeeded {
            tracing::info!(txn = %self.id, total_ms, "paste transaction finished");
        } else {
            tracing::warn!(txn = %self.id, total_ms, "paste transaction failed");
        }
    }
}
