//! Settings file with classification rules, timing and hotkeys.
//!
//! Optional JSON file; every field has a default so a partial file (or
//! none at all) is valid. Durations are written as integer milliseconds.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{PollPolicy, RetryPolicy};
use crate::gesture::{GestureClassifier, GestureConfig};
use crate::hotkey::{HotkeyConfig, HotkeyError, parse_chord};
use crate::resolver::{ClassificationRules, RulePatterns};
use crate::transaction::EngineTiming;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed parsing settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid classification pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
    #[error("{0}")]
    Invalid(String),
}

/// Serialize a `Duration` as whole milliseconds.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub clipboard_attempts: u32,
    #[serde(rename = "clipboard_backoff_ms", with = "millis")]
    pub clipboard_backoff: Duration,
    #[serde(rename = "click_settle_ms", with = "millis")]
    pub click_settle: Duration,
    #[serde(rename = "focus_timeout_ms", with = "millis")]
    pub focus_timeout: Duration,
    #[serde(rename = "focus_interval_ms", with = "millis")]
    pub focus_interval: Duration,
    #[serde(rename = "slow_host_hold_ms", with = "millis")]
    pub slow_host_hold: Duration,
    #[serde(rename = "deferred_settle_ms", with = "millis")]
    pub deferred_settle: Duration,
    #[serde(rename = "capture_timeout_ms", with = "millis")]
    pub capture_timeout: Duration,
    #[serde(rename = "capture_interval_ms", with = "millis")]
    pub capture_interval: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self::from(EngineTiming::default())
    }
}

impl From<EngineTiming> for TimingSettings {
    fn from(t: EngineTiming) -> Self {
        Self {
            clipboard_attempts: t.clipboard.attempts,
            clipboard_backoff: t.clipboard.backoff,
            click_settle: t.click_settle,
            focus_timeout: t.focus_poll.timeout,
            focus_interval: t.focus_poll.interval,
            slow_host_hold: t.slow_host_hold,
            deferred_settle: t.deferred_settle,
            capture_timeout: t.capture_poll.timeout,
            capture_interval: t.capture_poll.interval,
        }
    }
}

impl TimingSettings {
    pub fn engine_timing(&self) -> EngineTiming {
        EngineTiming {
            clipboard: RetryPolicy {
                attempts: self.clipboard_attempts,
                backoff: self.clipboard_backoff,
            },
            click_settle: self.click_settle,
            focus_poll: PollPolicy {
                timeout: self.focus_timeout,
                interval: self.focus_interval,
            },
            slow_host_hold: self.slow_host_hold,
            deferred_settle: self.deferred_settle,
            capture_poll: PollPolicy {
                timeout: self.capture_timeout,
                interval: self.capture_interval,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub double_chord: String,
    #[serde(rename = "double_window_ms", with = "millis")]
    pub double_window: Duration,
    pub hold_chord: String,
    #[serde(rename = "hold_min_ms", with = "millis")]
    pub hold_min: Duration,
    #[serde(rename = "hold_max_ms", with = "millis")]
    pub hold_max: Duration,
    /// Held modifiers with no key traffic for this long are treated as
    /// released.
    #[serde(rename = "modifier_stale_ms", with = "millis")]
    pub modifier_stale_after: Duration,
    /// Triggers buffered between the hook thread and the engine.
    pub queue_capacity: usize,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        let defaults = HotkeyConfig::default();
        Self {
            double_chord: defaults.double_chord.raw,
            double_window: defaults.double_window,
            hold_chord: defaults.hold_chord.raw,
            hold_min: defaults.hold_min,
            hold_max: defaults.hold_max,
            modifier_stale_after: defaults.modifier_stale_after,
            queue_capacity: 64,
        }
    }
}

impl HotkeySettings {
    pub fn hotkey_config(&self) -> Result<HotkeyConfig, ConfigError> {
        let double_chord = parse_chord(&self.double_chord)?;
        if double_chord.key.is_none() {
            return Err(ConfigError::Invalid(format!(
                "double_chord needs a non-modifier key: {:?}",
                self.double_chord
            )));
        }
        let hold_chord = parse_chord(&self.hold_chord)?;
        if hold_chord.key.is_some() {
            return Err(ConfigError::Invalid(format!(
                "hold_chord must consist of modifiers only: {:?}",
                self.hold_chord
            )));
        }
        if self.hold_min > self.hold_max {
            return Err(ConfigError::Invalid(
                "hotkeys.hold_min_ms must not exceed hotkeys.hold_max_ms".into(),
            ));
        }
        Ok(HotkeyConfig {
            double_chord,
            double_window: self.double_window,
            hold_chord,
            hold_min: self.hold_min,
            hold_max: self.hold_max,
            modifier_stale_after: self.modifier_stale_after,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rules: RulePatterns,
    pub timing: TimingSettings,
    pub hotkeys: HotkeySettings,
    /// Thresholds for a host's pointer surface. `listen` has no pointer
    /// input of its own; hosts build their classifier from here.
    pub gesture: GestureConfig,
}

impl Settings {
    /// Load from `path`, or defaults when no path is given. A path that
    /// does not exist is an error: it was asked for explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Check everything that is only checked lazily elsewhere.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classification_rules()?;
        self.hotkeys.hotkey_config()?;
        if self.timing.clipboard_attempts == 0 {
            return Err(ConfigError::Invalid(
                "timing.clipboard_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn gesture_classifier(&self) -> GestureClassifier {
        GestureClassifier::new(self.gesture)
    }

    pub fn classification_rules(&self) -> Result<Arc<ClassificationRules>, ConfigError> {
        Ok(Arc::new(ClassificationRules::compile(&self.rules)?))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
