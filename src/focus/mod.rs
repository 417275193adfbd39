//! Foreground activation and cross-thread keyboard focus.
//!
//! Changing or querying focus owned by another thread requires joining
//! that thread's input queue to ours for the duration of the call.
//! Leaving queues joined corrupts input routing for the whole session,
//! so every join is paired with an [`AttachGuard`] whose drop splits the
//! queues again on every exit path. Guards drop in reverse declaration
//! order, which gives the required reverse unjoin order.

use std::sync::Arc;

use crate::clock::{self, Clock, PollPolicy};
use crate::platform::{FocusControl, WindowHandle};

/// Joined input queues of the calling thread and one other thread.
pub struct AttachGuard<'a> {
    focus: &'a dyn FocusControl,
    from: u32,
    to: u32,
    attached: bool,
}

impl<'a> AttachGuard<'a> {
    /// Join `from` with `to`. Joining a thread with itself or with an
    /// unknown thread (0) is a no-op.
    pub fn attach(focus: &'a dyn FocusControl, from: u32, to: u32) -> Self {
        let attached = from != 0 && to != 0 && from != to && focus.attach_input(from, to, true);
        Self {
            focus,
            from,
            to,
            attached,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if self.attached && !self.focus.attach_input(self.from, self.to, false) {
            tracing::warn!(from = self.from, to = self.to, "input queue detach failed");
        }
    }
}

/// Brings windows to the foreground and reads their keyboard focus.
pub struct FocusCoordinator {
    focus: Arc<dyn FocusControl>,
    clock: Arc<dyn Clock>,
}

impl FocusCoordinator {
    pub fn new(focus: Arc<dyn FocusControl>, clock: Arc<dyn Clock>) -> Self {
        Self { focus, clock }
    }

    /// Activate `top` and give it keyboard focus. If another window wins
    /// the foreground race, activation is attempted exactly once more.
    /// Returns whether `top` ends up in the foreground.
    pub fn activate(&self, top: WindowHandle) -> bool {
        if top.is_none() {
            return false;
        }

        if self.focus.is_minimized(top) {
            self.focus.restore(top);
            tracing::debug!(hwnd = %top, "restored minimized window");
        }

        self.bring_to_foreground(top);
        if self.focus.foreground_window() == top {
            return true;
        }

        tracing::debug!(
            hwnd = %top,
            foreground = %self.focus.foreground_window(),
            "foreground race lost, retrying once"
        );
        self.bring_to_foreground(top);
        self.focus.foreground_window() == top
    }

    /// Attach to the foreground and target input queues, then ask for the
    /// foreground. The caller checks the result by reading the foreground
    /// window back, since a granted request can still lose to another
    /// process.
    fn bring_to_foreground(&self, top: WindowHandle) {
        let current = self.focus.current_thread();
        let foreground_thread = self.focus.window_thread(self.focus.foreground_window());
        let target_thread = self.focus.window_thread(top);

        let _fg = AttachGuard::attach(self.focus.as_ref(), current, foreground_thread);
        let _target = AttachGuard::attach(self.focus.as_ref(), current, target_thread);

        let granted = self.focus.set_foreground(top);
        let focused = self.focus.set_focus(top);
        tracing::debug!(hwnd = %top, granted, focused, "foreground requested");
    }

    /// Window that holds keyboard focus inside `top`'s thread, or none.
    pub fn current_focus(&self, top: WindowHandle) -> WindowHandle {
        if top.is_none() {
            return WindowHandle::NONE;
        }
        let current = self.focus.current_thread();
        let target_thread = self.focus.window_thread(top);
        let _guard = AttachGuard::attach(self.focus.as_ref(), current, target_thread);
        self.focus.focused_window()
    }

    /// Poll [`current_focus`](Self::current_focus) until a focused
    /// window appears or the policy times out.
    pub fn wait_for_focus(&self, top: WindowHandle, policy: PollPolicy) -> WindowHandle {
        clock::poll_until(self.clock.as_ref(), policy, || {
            let focused = self.current_focus(top);
            focused.is_some().then_some(focused)
        })
        .unwrap_or_default()
    }

    pub fn foreground_window(&self) -> WindowHandle {
        self.focus.foreground_window()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::platform::fake::{Call, FakeOs};

    fn coordinator(os: &FakeOs) -> (FocusCoordinator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let coordinator = FocusCoordinator::new(os.platform().focus, clock.clone());
        (coordinator, clock)
    }

    fn setup() -> (FakeOs, WindowHandle, WindowHandle) {
        let os = FakeOs::new();
        let other = os.add_window(10, "Other", "other", 20);
        let target = os.add_window(30, "Target", "target", 40);
        os.state().foreground = other;
        (os, other, target)
    }

    #[test]
    fn activation_joins_and_splits_queues_in_reverse_order() {
        let (os, _, target) = setup();
        let (fc, _) = coordinator(&os);

        assert!(fc.activate(target));
        assert_eq!(
            os.calls(),
            vec![
                Call::Attach {
                    from: 1,
                    to: 20,
                    attach: true,
                },
                Call::Attach {
                    from: 1,
                    to: 40,
                    attach: true,
                },
                Call::SetForeground(target),
                Call::SetFocus(target),
                Call::Attach {
                    from: 1,
                    to: 40,
                    attach: false,
                },
                Call::Attach {
                    from: 1,
                    to: 20,
                    attach: false,
                },
            ]
        );
        assert!(os.state().attached.is_empty());
    }

    #[test]
    fn minimized_window_is_restored_first() {
        let (os, _, target) = setup();
        os.state().windows.get_mut(&target).unwrap().minimized = true;
        let (fc, _) = coordinator(&os);

        assert!(fc.activate(target));
        assert_eq!(os.calls()[0], Call::Restore(target));
    }

    #[test]
    fn lost_race_is_retried_exactly_once() {
        let (os, other, target) = setup();
        {
            let mut s = os.state();
            s.lose_foreground_races = 1;
            s.rival = other;
        }
        let (fc, _) = coordinator(&os);

        assert!(fc.activate(target));
        let sets = os
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::SetForeground(_)))
            .count();
        assert_eq!(sets, 2);
        assert!(os.state().attached.is_empty());
    }

    #[test]
    fn persistent_rival_reports_failure_after_one_retry() {
        let (os, other, target) = setup();
        {
            let mut s = os.state();
            s.lose_foreground_races = 100;
            s.rival = other;
        }
        let (fc, _) = coordinator(&os);

        assert!(!fc.activate(target));
        assert_eq!(os.state().lose_foreground_races, 98);
        assert!(os.state().attached.is_empty());
    }

    #[test]
    fn same_thread_is_not_attached() {
        let os = FakeOs::new();
        let mine = os.add_window(5, "Mine", "me", 1);
        os.state().foreground = mine;
        let (fc, _) = coordinator(&os);

        assert!(fc.activate(mine));
        assert!(!os.calls().iter().any(|c| matches!(c, Call::Attach { .. })));
    }

    #[test]
    fn empty_target_is_not_activated() {
        let os = FakeOs::new();
        let (fc, _) = coordinator(&os);
        assert!(!fc.activate(WindowHandle::NONE));
        assert!(os.calls().is_empty());
    }

    #[test]
    fn current_focus_is_scoped_attach() {
        let (os, _, target) = setup();
        let edit = os.add_child(target, 31, "Edit");
        os.state().focused = edit;
        let (fc, _) = coordinator(&os);

        assert_eq!(fc.current_focus(target), edit);
        assert_eq!(
            os.calls(),
            vec![
                Call::Attach {
                    from: 1,
                    to: 40,
                    attach: true,
                },
                Call::Attach {
                    from: 1,
                    to: 40,
                    attach: false,
                },
            ]
        );
    }

    #[test]
    fn detach_runs_when_focus_query_panics() {
        struct Panicky(FakeOs);
        impl FocusControl for Panicky {
            fn is_minimized(&self, w: WindowHandle) -> bool {
                self.0.is_minimized(w)
            }
            fn restore(&self, w: WindowHandle) {
                self.0.restore(w)
            }
            fn foreground_window(&self) -> WindowHandle {
                self.0.foreground_window()
            }
            fn set_foreground(&self, w: WindowHandle) -> bool {
                self.0.set_foreground(w)
            }
            fn set_focus(&self, w: WindowHandle) -> bool {
                self.0.set_focus(w)
            }
            fn focused_window(&self) -> WindowHandle {
                panic!("focus query blew up")
            }
            fn window_thread(&self, w: WindowHandle) -> u32 {
                self.0.window_thread(w)
            }
            fn current_thread(&self) -> u32 {
                self.0.current_thread()
            }
            fn attach_input(&self, f: u32, t: u32, a: bool) -> bool {
                self.0.attach_input(f, t, a)
            }
        }

        let (os, _, target) = setup();
        let fc = FocusCoordinator::new(Arc::new(Panicky(os.clone())), Arc::new(ManualClock::new()));
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fc.current_focus(target)));
        assert!(result.is_err());
        assert!(
            os.state().attached.is_empty(),
            "queues left joined after panic"
        );
    }

    #[test]
    fn wait_for_focus_polls_until_timeout() {
        let (os, _, target) = setup();
        let (fc, clock) = coordinator(&os);
        let policy = PollPolicy {
            timeout: Duration::from_millis(40),
            interval: Duration::from_millis(10),
        };
        assert!(fc.wait_for_focus(target, policy).is_none());
        assert_eq!(clock.elapsed(), Duration::from_millis(40));
        assert!(os.state().attached.is_empty());
    }
}
