//! Pointer gesture recognition: tap vs drag, and hover arming.
//!
//! A press becomes a drag once the pointer has moved far enough from
//! the press origin or the press has lasted long enough. Once dragging,
//! the press stays a drag until release. While dragging, holding the
//! pointer still for the hover interval arms a paste-on-drop.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::platform::ScreenPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Distance from the press origin, in pixels, that starts a drag.
    pub distance_threshold: f64,
    #[serde(rename = "time_threshold_ms", with = "crate::config::millis")]
    pub time_threshold: Duration,
    /// Movement below this many pixels does not count as motion while
    /// waiting to arm.
    pub hover_slop: f64,
    #[serde(rename = "hover_ms", with = "crate::config::millis")]
    pub hover_interval: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 6.0,
            time_threshold: Duration::from_millis(170),
            hover_slop: 3.0,
            hover_interval: Duration::from_millis(1000),
        }
    }
}

/// How a press ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEnd {
    Tap,
    DragEnd,
}

/// State of one press–release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GestureState {
    pub is_down: bool,
    pub is_dragging: bool,
    pub down_point: ScreenPoint,
    pub down_time: Option<Instant>,
    pub last_point: ScreenPoint,
}

fn distance_sq(a: ScreenPoint, b: ScreenPoint) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    dx * dx + dy * dy
}

#[derive(Debug)]
pub struct GestureClassifier {
    config: GestureConfig,
    state: GestureState,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::default(),
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    pub fn on_down(&mut self, point: ScreenPoint, now: Instant) {
        self.state = GestureState {
            is_down: true,
            is_dragging: false,
            down_point: point,
            down_time: Some(now),
            last_point: point,
        };
    }

    /// Track a move. Returns whether the press is now a drag.
    pub fn on_move(&mut self, point: ScreenPoint, now: Instant) -> bool {
        self.state.last_point = point;
        if !self.state.is_down || self.state.is_dragging {
            return self.state.is_dragging;
        }
        let threshold = self.config.distance_threshold;
        if distance_sq(point, self.state.down_point) >= threshold * threshold
            || self.elapsed(now) > self.config.time_threshold
        {
            self.state.is_dragging = true;
        }
        self.state.is_dragging
    }

    /// True while down, not dragging, within the time threshold and
    /// closer to the origin than the distance threshold.
    pub fn is_tap_now(&self, now: Instant) -> bool {
        if !self.state.is_down || self.state.is_dragging {
            return false;
        }
        let threshold = self.config.distance_threshold;
        self.elapsed(now) <= self.config.time_threshold
            && distance_sq(self.state.last_point, self.state.down_point) < threshold * threshold
    }

    /// End the press. `None` when no press was in progress.
    pub fn on_up(&mut self, now: Instant) -> Option<GestureEnd> {
        if !self.state.is_down {
            return None;
        }
        let end = if self.is_tap_now(now) {
            GestureEnd::Tap
        } else {
            GestureEnd::DragEnd
        };
        self.reset();
        Some(end)
    }

    /// Forget the current press, e.g. when the surface is detached.
    pub fn reset(&mut self) {
        self.state = GestureState::default();
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.state
            .down_time
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
    }
}

/// Arms paste-on-drop after the pointer rests during a drag.
#[derive(Debug)]
pub struct HoverArm {
    config: GestureConfig,
    anchor: ScreenPoint,
    last_motion: Option<Instant>,
    armed: bool,
}

impl HoverArm {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            anchor: ScreenPoint::default(),
            last_motion: None,
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Start watching from a fresh press.
    pub fn on_down(&mut self, point: ScreenPoint, now: Instant) {
        self.anchor = point;
        self.last_motion = Some(now);
        self.armed = false;
    }

    /// Pointer moved while dragging. Motion beyond the slop restarts the
    /// idle timer and disarms.
    pub fn on_drag_move(&mut self, point: ScreenPoint, now: Instant) {
        let slop = self.config.hover_slop;
        if distance_sq(point, self.anchor) > slop * slop {
            self.anchor = point;
            self.last_motion = Some(now);
            self.armed = false;
        }
    }

    /// Periodic check. Returns true on the tick that arms.
    pub fn tick(&mut self, dragging: bool, now: Instant) -> bool {
        if !dragging || self.armed {
            return false;
        }
        let Some(since) = self.last_motion else {
            return false;
        };
        if now.saturating_duration_since(since) < self.config.hover_interval {
            return false;
        }
        self.armed = true;
        tracing::debug!("paste on drop armed");
        true
    }

    /// Report whether the drop should paste, and disarm.
    pub fn take_on_drop(&mut self) -> bool {
        let armed = self.armed;
        self.reset();
        armed
    }

    pub fn reset(&mut self) {
        self.armed = false;
        self.last_motion = None;
    }
}
