//! Time source and wait policies.
//!
//! Every wait in the paste path (clipboard acquisition backoff, click
//! settle, focus polling, slow-host key hold) goes through [`Clock`] so
//! tests can run against virtual time. The OS operations being waited on
//! have no completion callback; these waits are heuristic
//! synchronization, never busy loops.

use std::time::{Duration, Instant};

/// Source of "now" and of blocking waits.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Bounded retry: at most `attempts` tries, `backoff` between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Worst-case time spent sleeping between attempts.
    pub fn worst_case_wait(&self) -> Duration {
        self.backoff * self.attempts.saturating_sub(1)
    }
}

/// Outcome of an exhausted [`retry`] loop.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: Option<E>,
}

/// Run `op` until it succeeds or the policy's attempts are spent.
///
/// Sleeps `backoff` after every failed attempt except the last, so the
/// total wait never exceeds `(attempts - 1) * backoff`.
pub fn retry<T, E>(
    clock: &dyn Clock,
    policy: RetryPolicy,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<(T, u32), Exhausted<E>> {
    let mut last_error = None;
    for attempt in 1..=policy.attempts {
        match op(attempt) {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => {
                last_error = Some(e);
                if attempt < policy.attempts {
                    clock.sleep(policy.backoff);
                }
            }
        }
    }
    Err(Exhausted {
        attempts: policy.attempts,
        last_error,
    })
}

/// Poll-with-timeout: probe every `interval` until it yields a value or
/// `timeout` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Probe once immediately, then after each interval until the deadline.
pub fn poll_until<T>(
    clock: &dyn Clock,
    policy: PollPolicy,
    mut probe: impl FnMut() -> Option<T>,
) -> Option<T> {
    let deadline = clock.now() + policy.timeout;
    loop {
        if let Some(value) = probe() {
            return Some(value);
        }
        let now = clock.now();
        if now >= deadline || policy.interval.is_zero() {
            return None;
        }
        clock.sleep(policy.interval.min(deadline - now));
    }
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    fn policy(attempts: u32, backoff_ms: u64) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    #[test]
    fn retry_returns_first_success_and_attempt_number() {
        let clock = ManualClock::new();
        let result = retry(&clock, policy(5, 20), |attempt| {
            if attempt < 3 {
                Err("busy")
            } else {
                Ok(attempt * 10)
            }
        });
        let (value, attempts) = result.unwrap();
        assert_eq!(value, 30);
        assert_eq!(attempts, 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn retry_exhaustion_is_bounded() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let result: Result<((), u32), _> = retry(&clock, policy(20, 20), |_| {
            calls += 1;
            Err("busy")
        });
        let exhausted = result.unwrap_err();
        assert_eq!(calls, 20);
        assert_eq!(exhausted.attempts, 20);
        assert_eq!(exhausted.last_error, Some("busy"));
        assert!(clock.elapsed() <= Duration::from_millis(20 * 20));
        assert_eq!(clock.elapsed(), policy(20, 20).worst_case_wait());
    }

    #[test]
    fn retry_zero_attempts_never_calls() {
        let clock = ManualClock::new();
        let result: Result<((), u32), Exhausted<&str>> =
            retry(&clock, policy(0, 20), |_| panic!("must not run"));
        assert!(result.unwrap_err().last_error.is_none());
    }

    #[test]
    fn poll_returns_immediately_when_ready() {
        let clock = ManualClock::new();
        let policy = PollPolicy {
            timeout: Duration::from_millis(100),
            interval: Duration::from_millis(10),
        };
        assert_eq!(poll_until(&clock, policy, || Some(7)), Some(7));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn poll_gives_up_at_deadline() {
        let clock = ManualClock::new();
        let policy = PollPolicy {
            timeout: Duration::from_millis(45),
            interval: Duration::from_millis(10),
        };
        let mut probes = 0;
        let result: Option<()> = poll_until(&clock, policy, || {
            probes += 1;
            None
        });
        assert!(result.is_none());
        assert_eq!(clock.elapsed(), Duration::from_millis(45));
        assert_eq!(probes, 6);
    }

    #[test]
    fn poll_succeeds_after_some_intervals() {
        let clock = ManualClock::new();
        let policy = PollPolicy {
            timeout: Duration::from_millis(100),
            interval: Duration::from_millis(10),
        };
        let mut probes = 0;
        let result = poll_until(&clock, policy, || {
            probes += 1;
            (probes == 3).then_some("ready")
        });
        assert_eq!(result, Some("ready"));
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }
}
