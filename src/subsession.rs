//! Subsession lifecycle.
//!
//! A subsession is a detached tmux session named `<workspace>_<name>` that
//! runs one long-lived command. Windows show it by nesting a client inside a
//! pane, so the command survives the pane, the window, and even the
//! top-level session.

use crate::cascade::{self, Cascade, OptionCommand};
use crate::config::{Config, Subsession};
use crate::dispatch::{DispatchHandle, DispatchOutcome, Scheduler};
use crate::error::{MuxError, MuxwrightError, Result};
use crate::mux::{Multiplexer, OptionTarget, PaneId, SharedMux, WindowId};
use crate::shell;
use std::sync::Arc;
use std::time::Duration;

/// Excludes the session from tmux-resurrect snapshots.
pub const RESURRECT_EXCLUDE: &str = "@resurrect-exclude";

/// How the command of a freshly started subsession was sent.
#[derive(Debug)]
pub enum Dispatch {
    /// Nothing to send.
    Nothing,
    /// Sent during start.
    Immediate(DispatchOutcome),
    /// Will be sent after the delay.
    Scheduled(DispatchHandle),
}

#[derive(Debug)]
pub enum StartOutcome {
    AlreadyRunning,
    Started { dispatch: Dispatch },
}

impl StartOutcome {
    /// Take the pending dispatch handle, if any.
    pub fn into_handle(self) -> Option<DispatchHandle> {
        match self {
            StartOutcome::Started {
                dispatch: Dispatch::Scheduled(handle),
            } => Some(handle),
            _ => None,
        }
    }
}

/// Lines to type into a subsession, each with whether to submit it.
pub fn command_lines(sub: &Subsession) -> Vec<(String, bool)> {
    if sub.command.is_empty() && sub.env.is_empty() {
        return Vec::new();
    }
    if sub.execute {
        return vec![(shell::compose(&sub.command, &sub.env, sub.history), true)];
    }
    let mut lines = Vec::new();
    if !sub.env.is_empty() {
        lines.push((shell::with_history(&shell::exports(&sub.env), sub.history), true));
    }
    if !sub.command.is_empty() {
        lines.push((shell::with_history(&sub.command, sub.history), false));
    }
    lines
}

fn send_lines(
    mux: &dyn Multiplexer,
    pane: &PaneId,
    lines: &[(String, bool)],
) -> std::result::Result<(), MuxError> {
    for (text, submit) in lines {
        mux.send_text(pane, text, *submit)?;
    }
    Ok(())
}

/// Starts, stops and styles the subsessions of one workspace.
pub struct Lifecycle<'a> {
    mux: &'a SharedMux,
    config: &'a Config,
    cascade: &'a Cascade,
    scheduler: &'a Scheduler,
    grace: Duration,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        mux: &'a SharedMux,
        config: &'a Config,
        cascade: &'a Cascade,
        scheduler: &'a Scheduler,
        grace: Duration,
    ) -> Self {
        Self {
            mux,
            config,
            cascade,
            scheduler,
            grace,
        }
    }

    fn lookup(&self, name: &str) -> Result<&'a Subsession> {
        self.config
            .subsession(name)
            .ok_or_else(|| MuxwrightError::TargetNotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.mux.has_session(&self.config.subsession_session(name))
    }

    /// Create the subsession and send its command, unless it is running.
    pub fn start(&self, name: &str) -> Result<StartOutcome> {
        let sub = self.lookup(name)?;
        let session = self.config.subsession_session(name);
        if self.mux.has_session(&session) {
            log::info!("subsession {} already running", name);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let dir = sub.dir.clone().unwrap_or_default();
        if !dir.is_dir() {
            return Err(MuxwrightError::MissingDir {
                name: name.to_string(),
                dir,
            });
        }

        self.mux.new_session(&session, &dir, Some(name))?;
        log::info!("subsession {} started in {}", name, dir.display());
        if let Err(e) = self
            .mux
            .set_option(&OptionTarget::Session(session.clone()), RESURRECT_EXCLUDE, "on")
        {
            log::warn!("subsession {}: {}", name, e);
        }

        let lines = command_lines(sub);
        if lines.is_empty() {
            return Ok(StartOutcome::Started {
                dispatch: Dispatch::Nothing,
            });
        }
        let pane = PaneId::of_session(&session);

        if sub.delay > Duration::ZERO {
            let mux = Arc::clone(self.mux);
            let handle = self
                .scheduler
                .schedule(name, sub.delay, move || send_lines(mux.as_ref(), &pane, &lines));
            return Ok(StartOutcome::Started {
                dispatch: Dispatch::Scheduled(handle),
            });
        }

        let outcome = match send_lines(self.mux.as_ref(), &pane, &lines) {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                log::warn!("subsession {}: command not sent: {}", name, e);
                DispatchOutcome::Failed(e.to_string())
            }
        };
        Ok(StartOutcome::Started {
            dispatch: Dispatch::Immediate(outcome),
        })
    }

    /// Kill the subsession. Returns whether it was running.
    pub fn stop(&self, name: &str) -> Result<bool> {
        self.lookup(name)?;
        let session = self.config.subsession_session(name);
        if !self.mux.has_session(&session) {
            return Ok(false);
        }
        self.mux.kill_session(&session)?;
        log::info!("subsession {} stopped", name);
        Ok(true)
    }

    /// Stop, wait out the grace period, start again and restyle.
    pub fn restart(&self, name: &str) -> Result<StartOutcome> {
        if self.stop(name)? {
            self.scheduler.clock().sleep(self.grace);
        }
        let outcome = self.start(name)?;
        for e in self.apply_style(name)? {
            log::warn!("subsession {}: {}", name, e);
        }
        Ok(outcome)
    }

    /// Option commands for the subsession's resolved color and options.
    pub fn style_commands(&self, name: &str) -> Result<Vec<OptionCommand>> {
        let sub = self.lookup(name)?;
        let session = self.config.subsession_session(name);
        let effective = self.cascade.subsession(self.config, sub);
        let window = WindowId::of_session(&session);
        Ok(cascade::plan(&effective, &session, Some(&window)))
    }

    /// Apply the subsession's resolved color and options.
    ///
    /// Individual option failures are returned rather than aborting.
    pub fn apply_style(&self, name: &str) -> Result<Vec<MuxError>> {
        let failures = self
            .style_commands(name)?
            .into_iter()
            .filter_map(|c| self.mux.set_option(&c.target, &c.name, &c.value).err())
            .collect();
        Ok(failures)
    }

    /// Show the subsession inside `pane`, first sending `command` into it.
    pub fn attach_pane(&self, pane: &PaneId, name: &str, command: Option<&str>) -> Result<()> {
        self.lookup(name)?;
        let session = self.config.subsession_session(name);
        if !self.mux.has_session(&session) {
            return Err(MuxError::Missing(format!("subsession {}", name)).into());
        }
        if let Some(command) = command.filter(|c| !c.is_empty()) {
            self.mux
                .send_text(&PaneId::of_session(&session), command, true)?;
        }
        self.mux.nest_session(pane, &session)?;
        Ok(())
    }
}
