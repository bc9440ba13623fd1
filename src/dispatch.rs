//! Delayed command dispatch.
//!
//! A subsession with a `delay` gets its command after the session is
//! created, without holding up the rest of the build. [`Scheduler::schedule`]
//! runs the job on its own thread after sleeping on the scheduler's
//! [`Clock`], and hands back a [`DispatchHandle`] that can cancel the job
//! before it fires and report how it ended.

use crate::error::MuxError;
use crate::poll::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// How a scheduled dispatch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent,
    Cancelled,
    Failed(String),
}

/// Handle to one scheduled dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    label: String,
    cancelled: Arc<AtomicBool>,
    outcome: Receiver<DispatchOutcome>,
}

impl DispatchHandle {
    /// What the dispatch is for, e.g. the subsession name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Ask the job not to run. Has no effect once it has fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// The outcome, if the job has finished.
    pub fn try_outcome(&self) -> Option<DispatchOutcome> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(DispatchOutcome::Failed("dispatch thread exited".into()))
            }
        }
    }

    /// Block until the job finishes.
    pub fn wait(self) -> DispatchOutcome {
        self.outcome
            .recv()
            .unwrap_or_else(|_| DispatchOutcome::Failed("dispatch thread exited".into()))
    }
}

/// Spawns delayed jobs.
#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run `job` after `delay` on a background thread.
    pub fn schedule<F>(&self, label: &str, delay: Duration, job: F) -> DispatchHandle
    where
        F: FnOnce() -> Result<(), MuxError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = DispatchHandle {
            label: label.to_string(),
            cancelled: Arc::clone(&cancelled),
            outcome: rx,
        };

        let clock = Arc::clone(&self.clock);
        let name = label.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("dispatch-{}", label))
            .spawn(move || {
                clock.sleep(delay);
                let outcome = if cancelled.load(Ordering::SeqCst) {
                    log::info!("{}: delayed command cancelled", name);
                    DispatchOutcome::Cancelled
                } else {
                    match job() {
                        Ok(()) => {
                            log::info!("{}: delayed command sent", name);
                            DispatchOutcome::Sent
                        }
                        Err(e) => {
                            log::warn!("{}: delayed command failed: {}", name, e);
                            DispatchOutcome::Failed(e.to_string())
                        }
                    }
                };
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            log::warn!("{}: could not start dispatch thread: {}", label, e);
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::FakeClock;
    use std::sync::Mutex;
    use std::sync::mpsc::Sender;

    /// Sleeps until the test releases it.
    struct GateClock {
        gate: Mutex<Receiver<()>>,
    }

    impl GateClock {
        fn new() -> (Self, Sender<()>) {
            let (tx, rx) = mpsc::channel();
            (Self { gate: Mutex::new(rx) }, tx)
        }
    }

    impl Clock for GateClock {
        fn sleep(&self, _: Duration) {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
        }
    }

    #[test]
    fn test_runs_job_after_delay() {
        let clock = Arc::new(FakeClock::new());
        let scheduler = Scheduler::new(clock.clone());
        let handle = scheduler.schedule("api", Duration::from_secs(2), || Ok(()));
        assert_eq!(handle.label(), "api");
        assert_eq!(handle.wait(), DispatchOutcome::Sent);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_reports_failure() {
        let scheduler = Scheduler::new(Arc::new(FakeClock::new()));
        let handle = scheduler.schedule("api", Duration::from_secs(1), || {
            Err(MuxError::Missing("session demo_api".into()))
        });
        assert!(matches!(handle.wait(), DispatchOutcome::Failed(msg) if msg.contains("demo_api")));
    }

    #[test]
    fn test_cancel_before_firing() {
        let (clock, release) = GateClock::new();
        let scheduler = Scheduler::new(Arc::new(clock));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = scheduler.schedule("api", Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(handle.try_outcome(), None);
        handle.cancel();
        release.send(()).unwrap();
        assert_eq!(handle.wait(), DispatchOutcome::Cancelled);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
