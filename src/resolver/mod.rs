//! Target resolution: which window and control own a screen point.
//!
//! A toolkit host is a single OS window subdivided by the toolkit's own
//! scene graph, so deep resolution often returns the same handle as the
//! shallow lookup. Classification tolerates that equality.

pub mod rules;

use std::sync::Arc;

use crate::platform::{ScreenPoint, WindowHandle, WindowQuery};

pub use rules::{ClassificationRules, DeliveryCategory, RulePatterns};

/// Everything known about the window under a point. Resolved once per
/// paste transaction and never mutated afterward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowTarget {
    pub top_level: WindowHandle,
    pub point: WindowHandle,
    pub deep_child: WindowHandle,
    /// Class of the deep child.
    pub window_class_name: String,
    pub top_class_name: String,
    pub owner_process_name: String,
}

impl WindowTarget {
    pub fn is_empty(&self) -> bool {
        self.top_level.is_none() && self.point.is_none() && self.deep_child.is_none()
    }
}

/// Resolves points to [`WindowTarget`]s and classifies them.
pub struct TargetResolver {
    windows: Arc<dyn WindowQuery>,
    rules: Arc<ClassificationRules>,
}

impl TargetResolver {
    pub fn new(windows: Arc<dyn WindowQuery>, rules: Arc<ClassificationRules>) -> Self {
        Self { windows, rules }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// Resolve the window hierarchy at `point`. An empty point window
    /// yields an empty target.
    pub fn resolve(&self, point: ScreenPoint) -> WindowTarget {
        let point_window = self.windows.window_from_point(point);
        if point_window.is_none() {
            tracing::debug!(%point, "no window at point");
            return WindowTarget::default();
        }

        let top_level = self.windows.root_ancestor(point_window).or(point_window);
        let deep_child = self.deep_child_at(point);

        let target = WindowTarget {
            top_level,
            point: point_window,
            deep_child,
            window_class_name: self.windows.class_name(deep_child),
            top_class_name: self.windows.class_name(top_level),
            owner_process_name: self.windows.process_name(top_level),
        };
        tracing::debug!(
            %point,
            top = %target.top_level,
            deep = %target.deep_child,
            class = %target.window_class_name,
            process = %target.owner_process_name,
            "target resolved"
        );
        target
    }

    /// Deep resolution: the most specific interactive child at `point`,
    /// falling back to the window directly under it.
    fn deep_child_at(&self, point: ScreenPoint) -> WindowHandle {
        let first = self.windows.window_from_point(point);
        if first.is_none() {
            return WindowHandle::NONE;
        }
        let Some(client) = self.windows.screen_to_client(first, point) else {
            return first;
        };
        self.windows.child_at_client_point(first, client).or(first)
    }

    /// Category of a resolved target. The deep child's class is tried
    /// first; a toolkit host's top-level class is consulted when the
    /// deep class alone is unclassified.
    pub fn categorize(&self, target: &WindowTarget) -> DeliveryCategory {
        match self
            .rules
            .classify(&target.window_class_name, &target.owner_process_name)
        {
            DeliveryCategory::Unclassified => self
                .rules
                .classify(&target.top_class_name, &target.owner_process_name),
            category => category,
        }
    }

    /// Category of an arbitrary handle, e.g. the control focused after
    /// activation.
    pub fn categorize_handle(&self, window: WindowHandle) -> DeliveryCategory {
        if window.is_none() {
            return DeliveryCategory::Unclassified;
        }
        let class = self.windows.class_name(window);
        let root = self.windows.root_ancestor(window).or(window);
        let process = self.windows.process_name(root);
        self.rules.classify(&class, &process)
    }

    pub fn class_name(&self, window: WindowHandle) -> String {
        if window.is_none() {
            return String::new();
        }
        self.windows.class_name(window)
    }

    /// Resolve and classify in one step.
    pub fn probe(&self, point: ScreenPoint) -> (WindowTarget, DeliveryCategory) {
        let target = self.resolve(point);
        let category = self.categorize(&target);
        (target, category)
    }
}
