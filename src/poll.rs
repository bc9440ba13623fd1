//! Time and bounded readiness polling.
//!
//! tmux offers no notification when a freshly created window or session is
//! ready, so dependent operations poll for it. [`wait_until`] retries a probe
//! a fixed number of times at a fixed interval and reports how it ended;
//! callers proceed either way. Time goes through a [`Clock`] so tests can run
//! without sleeping.

use std::sync::Mutex;
use std::time::Duration;

/// Source of sleeping.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that records sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct FakeClock {
    slept: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Attempt count and spacing for a readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(100),
        }
    }
}

/// How a readiness poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Probe until it returns true or the attempts run out.
///
/// The probe runs at least once, and there is no sleep after the final
/// attempt.
pub fn wait_until(
    clock: &dyn Clock,
    policy: PollPolicy,
    mut probe: impl FnMut() -> bool,
) -> Readiness {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if probe() {
            return Readiness::Ready { attempts: attempt };
        }
        if attempt < attempts {
            clock.sleep(policy.interval);
        }
    }
    Readiness::TimedOut { attempts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_immediately() {
        let clock = FakeClock::new();
        let outcome = wait_until(&clock, PollPolicy::default(), || true);
        assert_eq!(outcome, Readiness::Ready { attempts: 1 });
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_ready_after_retries() {
        let clock = FakeClock::new();
        let mut calls = 0;
        let policy = PollPolicy {
            attempts: 5,
            interval: Duration::from_millis(10),
        };
        let outcome = wait_until(&clock, policy, || {
            calls += 1;
            calls == 3
        });
        assert_eq!(outcome, Readiness::Ready { attempts: 3 });
        assert_eq!(clock.total(), Duration::from_millis(20));
    }

    #[test]
    fn test_times_out() {
        let clock = FakeClock::new();
        let policy = PollPolicy {
            attempts: 4,
            interval: Duration::from_millis(50),
        };
        let outcome = wait_until(&clock, policy, || false);
        assert_eq!(outcome, Readiness::TimedOut { attempts: 4 });
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[test]
    fn test_zero_attempts_still_probes_once() {
        let clock = FakeClock::new();
        let policy = PollPolicy {
            attempts: 0,
            interval: Duration::from_millis(50),
        };
        assert!(wait_until(&clock, policy, || true).is_ready());
    }
}
