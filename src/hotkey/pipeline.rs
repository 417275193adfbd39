//! Bounded ingestion for the hook callback.
//!
//! The OS silently unhooks a low-level hook whose callback runs too long,
//! so [`HookPipeline::ingest`] only folds the event into the classifier
//! and offers any trigger to a bounded queue with `try_send`. A full
//! queue drops the trigger and bumps a counter instead of waiting. A
//! panic in the classifier is caught here and never reaches the OS.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::{HotkeyClassifier, HotkeyConfig, HotkeyTrigger, KeyEvent};

/// Counters shared between the hook thread and the consumer.
#[derive(Debug, Default)]
pub struct PipelineStats {
    dropped: AtomicU64,
    panics: AtomicU64,
}

impl PipelineStats {
    /// Triggers discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Classifier panics caught in the callback.
    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

/// Owned hook state: the classifier plus the sending side of the queue.
pub struct HookPipeline {
    classifier: HotkeyClassifier,
    config: HotkeyConfig,
    tx: mpsc::Sender<HotkeyTrigger>,
    stats: Arc<PipelineStats>,
}

/// Create a pipeline and the receiver that drains it.
pub fn channel(
    config: HotkeyConfig,
    capacity: usize,
) -> (HookPipeline, mpsc::Receiver<HotkeyTrigger>, Arc<PipelineStats>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(PipelineStats::default());
    let pipeline = HookPipeline {
        classifier: HotkeyClassifier::new(config.clone()),
        config,
        tx,
        stats: Arc::clone(&stats),
    };
    (pipeline, rx, stats)
}

impl HookPipeline {
    /// Process one event. Returns the trigger it produced, if any,
    /// whether or not the queue accepted it.
    pub fn ingest(&mut self, event: KeyEvent) -> Option<HotkeyTrigger> {
        let classifier = &mut self.classifier;
        let trigger = match panic::catch_unwind(AssertUnwindSafe(|| classifier.on_event(&event))) {
            Ok(trigger) => trigger,
            Err(_) => {
                self.stats.panics.fetch_add(1, Ordering::Relaxed);
                self.classifier = HotkeyClassifier::new(self.config.clone());
                return None;
            }
        };

        let trigger = trigger?;
        if self.tx.try_send(trigger).is_err() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Some(trigger)
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }
}
