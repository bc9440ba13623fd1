//! Session orchestration.
//!
//! [`Orchestrator::start`] builds a workspace in a fixed order:
//!
//! ```text
//! Absent -> Creating -> SubsessionsStarted -> WindowsBuilt
//!        -> SubsessionsAttached -> Ready
//! ```
//!
//! If the top-level session already exists it goes straight to `Ready`.
//! Only creating the top-level session is fatal; any other failed window,
//! pane or option is logged, recorded in the [`BuildReport`], and skipped.

use crate::cascade::{self, Cascade, OptionCommand};
use crate::config::{Config, Overlay, Pane, Window};
use crate::dispatch::{DispatchHandle, Scheduler};
use crate::error::{ConfigError, MuxError, MuxwrightError, Result};
use crate::layout::{self, Materialized};
use crate::mux::{PaneId, SharedMux, WindowId};
use crate::poll::{self, Clock, PollPolicy, Readiness, SystemClock};
use crate::prompt::Confirm;
use crate::runtime::RuntimeFiles;
use crate::shell;
use crate::subsession::{Lifecycle, StartOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RESTART_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    SubsessionsStarted,
    WindowsBuilt,
    SubsessionsAttached,
    Ready,
    Stopped,
    Killed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::SubsessionsStarted => "subsessions started",
            Phase::WindowsBuilt => "windows built",
            Phase::SubsessionsAttached => "subsessions attached",
            Phase::Ready => "ready",
            Phase::Stopped => "stopped",
            Phase::Killed => "killed",
        };
        f.write_str(name)
    }
}

/// Something the build asked for but did not get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    /// e.g. `window main` or `subsession api`.
    pub scope: String,
    pub message: String,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

/// What a build or refresh did.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub phases: Vec<Phase>,
    pub discrepancies: Vec<Discrepancy>,
    /// Delayed subsession commands still pending.
    pub dispatches: Vec<DispatchHandle>,
    /// Option commands that were applied.
    pub options: Vec<OptionCommand>,
    /// The session was already running and was left as is.
    pub already_running: bool,
}

impl BuildReport {
    fn enter(&mut self, phase: Phase) {
        log::info!("phase: {}", phase);
        self.phases.push(phase);
    }

    fn record(&mut self, scope: impl Into<String>, message: impl fmt::Display) {
        let discrepancy = Discrepancy {
            scope: scope.into(),
            message: message.to_string(),
        };
        log::warn!("{}", discrepancy);
        self.discrepancies.push(discrepancy);
    }

    /// The phase the build ended in.
    pub fn phase(&self) -> Option<Phase> {
        self.phases.last().copied()
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// One line of `status` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub session: String,
    pub running: bool,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.running { "running" } else { "stopped" };
        write!(f, "{}  {}", self.session, state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    /// Sessions that were killed, subsessions first.
    Killed(Vec<String>),
    Declined,
    /// Nobody could be asked and `--yes` was not given.
    NotConfirmed,
}

#[derive(Debug)]
pub enum Restarted {
    Session(BuildReport),
    Subsession {
        outcome: StartOutcome,
        discrepancies: Vec<Discrepancy>,
    },
}

/// A subsession opened on its own.
#[derive(Debug)]
pub struct Opened {
    pub session: String,
    pub dispatch: Option<DispatchHandle>,
}

/// A window built during `start`.
struct Built<'c> {
    window: &'c Window,
    id: WindowId,
    panes: Materialized,
}

/// Builds and manages one workspace.
pub struct Orchestrator {
    config: Config,
    mux: SharedMux,
    scheduler: Scheduler,
    policy: PollPolicy,
    grace: Duration,
    defaults: Overlay,
    runtime: Option<RuntimeFiles>,
}

impl Orchestrator {
    pub fn new(config: Config, mux: SharedMux) -> Self {
        Self {
            config,
            mux,
            scheduler: Scheduler::new(Arc::new(SystemClock)),
            policy: PollPolicy::default(),
            grace: DEFAULT_RESTART_GRACE,
            defaults: Overlay::default(),
            runtime: None,
        }
    }

    /// Time source for polls, grace periods and delayed commands.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.scheduler = Scheduler::new(clock);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_restart_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Global default options from the tool settings.
    pub fn with_default_options(mut self, defaults: Overlay) -> Self {
        self.defaults = defaults;
        self
    }

    /// Write and clean up runtime files. Without them the status bar shows
    /// a plain `%H:%M` clock.
    pub fn with_runtime(mut self, runtime: RuntimeFiles) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn clock(&self) -> &dyn Clock {
        self.scheduler.clock()
    }

    fn cascade(&self) -> Cascade {
        let cascade = Cascade::new(&self.config, &self.defaults);
        match &self.runtime {
            Some(runtime) if self.config.wants_clock() => {
                cascade.with_clock(runtime.clock_segment())
            }
            _ => cascade,
        }
    }

    fn lifecycle<'a>(&'a self, cascade: &'a Cascade) -> Lifecycle<'a> {
        Lifecycle::new(&self.mux, &self.config, cascade, &self.scheduler, self.grace)
    }

    fn apply(&self, commands: Vec<OptionCommand>, scope: &str, report: &mut BuildReport) {
        for command in commands {
            match self.mux.set_option(&command.target, &command.name, &command.value) {
                Ok(()) => report.options.push(command),
                Err(e) => report.record(scope, format!("option {}: {}", command.name, e)),
            }
        }
    }

    fn write_clock(&self, report: &mut BuildReport) {
        if let Some(runtime) = &self.runtime {
            if let Err(e) = runtime.write_clock(&self.config) {
                report.record("runtime", format!("cannot write clock script: {}", e));
            }
        }
    }

    fn write_conf(&self, report: &mut BuildReport) {
        if let Some(runtime) = &self.runtime {
            if let Err(e) = runtime.write_conf(&self.config, &report.options) {
                report.record("runtime", format!("cannot write tmux.conf: {}", e));
            }
        }
    }

    fn remove_runtime(&self) {
        if let Some(runtime) = &self.runtime {
            if let Err(e) = runtime.remove() {
                log::warn!("cannot remove {}: {}", runtime.dir().display(), e);
            }
        }
    }

    /// Build the workspace, or leave it be if it is already running.
    pub fn start(&self) -> Result<BuildReport> {
        let name = self.config.name.as_str();
        let mut report = BuildReport::default();
        if self.mux.has_session(name) {
            log::info!("session {} already running", name);
            report.already_running = true;
            report.enter(Phase::Ready);
            return Ok(report);
        }
        report.enter(Phase::Absent);
        self.write_clock(&mut report);
        let cascade = self.cascade();
        let lifecycle = self.lifecycle(&cascade);

        report.enter(Phase::Creating);
        let first = self.config.windows.first().ok_or(ConfigError::NoWindows)?;
        let first_id = self.mux.new_session(name, &first.dir, Some(first.name.as_str()))?;
        let session_plan = cascade::plan(&cascade.session(&self.config), name, None);
        self.apply(session_plan, "session", &mut report);

        report.enter(Phase::SubsessionsStarted);
        for sub in &self.config.subsessions {
            let scope = format!("subsession {}", sub.name);
            match lifecycle.start(&sub.name) {
                Ok(outcome) => {
                    report.dispatches.extend(outcome.into_handle());
                    match lifecycle.style_commands(&sub.name) {
                        Ok(commands) => self.apply(commands, &scope, &mut report),
                        Err(e) => report.record(&scope, e),
                    }
                }
                Err(e) => report.record(&scope, e),
            }
        }

        report.enter(Phase::WindowsBuilt);
        let mut built = Vec::with_capacity(self.config.windows.len());
        for (i, window) in self.config.windows.iter().enumerate() {
            let scope = format!("window {}", window.name);
            let id = if i == 0 {
                first_id.clone()
            } else {
                match self.mux.new_window(name, &window.name, &window.dir) {
                    Ok(id) => id,
                    Err(e) => {
                        report.record(&scope, format!("not created: {}", e));
                        continue;
                    }
                }
            };
            let window_plan = cascade::plan(&cascade.window(window), name, Some(&id));
            self.apply(window_plan, &scope, &mut report);

            let panes = layout::materialize(
                self.mux.as_ref(),
                &id,
                &window.dir,
                &layout::plan(window.panes.len()),
            );
            if panes.created() < panes.requested() {
                report.record(
                    &scope,
                    format!("requested {} panes, created {}", panes.requested(), panes.created()),
                );
            }
            self.populate(window, &panes, &mut report);
            built.push(Built { window, id, panes });
        }

        report.enter(Phase::SubsessionsAttached);
        for b in &built {
            self.attach_subsession_panes(&lifecycle, b, &mut report);
        }

        report.enter(Phase::Ready);
        if let Some(b) = built.first() {
            if let Err(e) = self.mux.select_window(&b.id) {
                report.record(format!("window {}", b.window.name), e);
            }
            if let Some(pane) = b.panes.first() {
                if let Err(e) = self.mux.select_pane(pane) {
                    report.record(format!("window {}", b.window.name), e);
                }
            }
        }
        self.write_conf(&mut report);
        Ok(report)
    }

    /// Send the commands of command panes.
    fn populate(&self, window: &Window, panes: &Materialized, report: &mut BuildReport) {
        for (index, pane) in window.panes.iter().enumerate() {
            let Pane::Command { cmd, execute, history } = pane else {
                continue;
            };
            let Some(target) = panes.pane(index) else {
                continue;
            };
            if cmd.is_empty() {
                continue;
            }
            let line = shell::with_history(cmd, *history);
            let result = self.mux.send_text(target, &line, *execute);
            if let Err(e) = result {
                report.record(format!("window {} pane {}", window.name, index + 1), e);
            }
        }
    }

    fn attach_subsession_panes(
        &self,
        lifecycle: &Lifecycle<'_>,
        built: &Built<'_>,
        report: &mut BuildReport,
    ) {
        let scope = format!("window {}", built.window.name);
        let readiness =
            poll::wait_until(self.clock(), self.policy, || self.mux.window_exists(&built.id));
        if let Readiness::TimedOut { attempts } = readiness {
            report.record(&scope, format!("not ready after {} attempts", attempts));
        }
        for (index, pane) in built.window.panes.iter().enumerate() {
            let Pane::Subsession { name, cmd } = pane else {
                continue;
            };
            let Some(target) = built.panes.pane(index) else {
                continue;
            };
            let scope = format!("window {} pane {}", built.window.name, index + 1);
            self.attach_one(lifecycle, target, name, cmd.as_deref(), &scope, report);
        }
    }

    fn attach_one(
        &self,
        lifecycle: &Lifecycle<'_>,
        target: &PaneId,
        name: &str,
        cmd: Option<&str>,
        scope: &str,
        report: &mut BuildReport,
    ) {
        let session = self.config.subsession_session(name);
        let readiness =
            poll::wait_until(self.clock(), self.policy, || self.mux.has_session(&session));
        if !readiness.is_ready() {
            report.record(scope, format!("subsession {} is not running", name));
            return;
        }
        if let Err(e) = lifecycle.attach_pane(target, name, cmd) {
            report.record(scope, e);
        }
    }

    /// Running state of the workspace and each subsession.
    pub fn status(&self) -> Vec<SessionStatus> {
        let mut statuses = vec![SessionStatus {
            session: self.config.name.clone(),
            running: self.mux.has_session(&self.config.name),
        }];
        for sub in &self.config.subsessions {
            let session = self.config.subsession_session(&sub.name);
            statuses.push(SessionStatus {
                running: self.mux.has_session(&session),
                session,
            });
        }
        statuses
    }

    /// Kill the top-level session; subsessions keep running.
    ///
    /// Returns whether the session was running.
    pub fn stop(&self) -> Result<bool> {
        let name = &self.config.name;
        let running = self.mux.has_session(name);
        if running {
            self.mux.kill_session(name)?;
            log::info!("phase: {}", Phase::Stopped);
        }
        self.remove_runtime();
        Ok(running)
    }

    /// Kill every subsession and the top-level session after confirmation.
    pub fn kill(&self, confirm: &dyn Confirm) -> Result<KillOutcome> {
        let question = format!(
            "Kill workspace {} and its {} subsession(s)?",
            self.config.name,
            self.config.subsessions.len()
        );
        match confirm.confirm(&question) {
            None => return Ok(KillOutcome::NotConfirmed),
            Some(false) => return Ok(KillOutcome::Declined),
            Some(true) => {}
        }

        let cascade = self.cascade();
        let lifecycle = self.lifecycle(&cascade);
        let mut killed = Vec::new();
        for sub in &self.config.subsessions {
            match lifecycle.stop(&sub.name) {
                Ok(true) => killed.push(self.config.subsession_session(&sub.name)),
                Ok(false) => {}
                Err(e) => log::warn!("subsession {}: {}", sub.name, e),
            }
        }
        if self.stop()? {
            killed.push(self.config.name.clone());
        }
        log::info!("phase: {}", Phase::Killed);
        Ok(KillOutcome::Killed(killed))
    }

    /// Restart the whole workspace or one subsession.
    ///
    /// `None` or the workspace's own name restarts the top-level session;
    /// running subsessions are kept and re-attached.
    pub fn restart(&self, target: Option<&str>) -> Result<Restarted> {
        match target {
            Some(name) if name != self.config.name => {
                if self.config.subsession(name).is_none() {
                    return Err(MuxwrightError::TargetNotFound(name.to_string()));
                }
                let cascade = self.cascade();
                let lifecycle = self.lifecycle(&cascade);
                let outcome = lifecycle.restart(name)?;
                let discrepancies = self.reattach(&lifecycle, name);
                Ok(Restarted::Subsession { outcome, discrepancies })
            }
            _ => {
                if self.stop()? {
                    self.clock().sleep(self.grace);
                }
                Ok(Restarted::Session(self.start()?))
            }
        }
    }

    /// Re-nest `name` into the panes of the running session that show it.
    fn reattach(&self, lifecycle: &Lifecycle<'_>, name: &str) -> Vec<Discrepancy> {
        let mut report = BuildReport::default();
        let session = &self.config.name;
        if !self.mux.has_session(session) {
            return report.discrepancies;
        }
        let running = match self.mux.list_windows(session) {
            Ok(windows) => windows,
            Err(e) => {
                report.record(format!("session {}", session), e);
                return report.discrepancies;
            }
        };
        for window in &self.config.windows {
            let shows = |p: &Pane| matches!(p, Pane::Subsession { name: n, .. } if n == name);
            if !window.panes.iter().any(shows) {
                continue;
            }
            let Some(info) = running.iter().find(|w| w.name == window.name) else {
                report.record(format!("window {}", window.name), "not found in running session");
                continue;
            };
            let panes = match self.mux.list_panes(&info.id) {
                Ok(panes) => panes,
                Err(e) => {
                    report.record(format!("window {}", window.name), e);
                    continue;
                }
            };
            let positions = layout::plan(window.panes.len()).slot_positions();
            for (index, pane) in window.panes.iter().enumerate() {
                let Pane::Subsession { name: shown, cmd } = pane else {
                    continue;
                };
                if shown != name {
                    continue;
                }
                let scope = format!("window {} pane {}", window.name, index + 1);
                match positions.get(index).and_then(|&p| panes.get(p)) {
                    Some(target) => {
                        let cmd = cmd.as_deref();
                        self.attach_one(lifecycle, target, name, cmd, &scope, &mut report)
                    }
                    None => report.record(&scope, "pane not found"),
                }
            }
        }
        report.discrepancies
    }

    /// Re-apply display options to the running workspace without touching
    /// any process.
    ///
    /// A configured window missing by name takes over the running window at
    /// its position, if that one is not configured under its current name,
    /// and gets its name back.
    pub fn refresh(&self) -> Result<BuildReport> {
        let name = self.config.name.as_str();
        if !self.mux.has_session(name) {
            return Err(MuxError::Missing(format!("session {}", name)).into());
        }
        let mut report = BuildReport::default();
        self.write_clock(&mut report);
        let cascade = self.cascade();
        let lifecycle = self.lifecycle(&cascade);

        let session_plan = cascade::plan(&cascade.session(&self.config), name, None);
        self.apply(session_plan, "session", &mut report);
        let running = self.mux.list_windows(name)?;
        for (position, window) in self.config.windows.iter().enumerate() {
            let scope = format!("window {}", window.name);
            let found = running.iter().find(|w| w.name == window.name).or_else(|| {
                running
                    .get(position)
                    .filter(|w| self.config.window(&w.name).is_none())
            });
            match found {
                Some(info) => {
                    if info.name != window.name {
                        if let Err(e) = self.mux.rename_window(&info.id, &window.name) {
                            report.record(&scope, format!("cannot rename `{}`: {}", info.name, e));
                        }
                    }
                    let commands = cascade::plan(&cascade.window(window), name, Some(&info.id));
                    self.apply(commands, &scope, &mut report);
                }
                None => report.record(&scope, "not found in running session"),
            }
        }
        for sub in &self.config.subsessions {
            if !lifecycle.exists(&sub.name) {
                continue;
            }
            let scope = format!("subsession {}", sub.name);
            match lifecycle.style_commands(&sub.name) {
                Ok(commands) => self.apply(commands, &scope, &mut report),
                Err(e) => report.record(&scope, e),
            }
        }
        self.write_conf(&mut report);
        report.enter(Phase::Ready);
        Ok(report)
    }

    /// Make sure subsession `name` runs and is styled.
    pub fn open_subsession(&self, name: &str) -> Result<Opened> {
        let cascade = self.cascade();
        let lifecycle = self.lifecycle(&cascade);
        let outcome = lifecycle.start(name)?;
        for e in lifecycle.apply_style(name)? {
            log::warn!("subsession {}: {}", name, e);
        }
        Ok(Opened {
            session: self.config.subsession_session(name),
            dispatch: outcome.into_handle(),
        })
    }

    /// Attach the terminal to `session`.
    pub fn attach(&self, session: &str) -> Result<()> {
        self.mux.attach_client(session)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMux;
    use crate::mux::Multiplexer;
    use crate::parser::{ParseMode, Parser};
    use crate::poll::FakeClock;
    use crate::prompt::Answer;

    const WORKSPACE: &str = "\
name: demo
color: red
subsessions:
  api:
    dir: ./api
    command: cargo run
  db:
    dir: ./db
    command: docker compose up
    color: green
windows:
  - name: main
    color: blue
    panes:
      - cmd: vim
      - subsession: api
      - cmd: git status
        execute: false
      - subsession: db
  - name: logs
    panes:
      - cmd: tail -f log
";

    struct Fixture {
        memory: Arc<MemoryMux>,
        clock: Arc<FakeClock>,
        orchestrator: Orchestrator,
        dir: tempfile::TempDir,
    }

    fn fixture(src: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["api", "db"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        let doc = Parser::new(ParseMode::Strict).parse_str(src).unwrap().document;
        let config = Config::from_document(&doc, dir.path()).unwrap();
        let memory = Arc::new(MemoryMux::new());
        let clock = Arc::new(FakeClock::new());
        let orchestrator = Orchestrator::new(config, memory.clone())
            .with_clock(clock.clone())
            .with_runtime(RuntimeFiles::at(dir.path().join("run")));
        Fixture {
            memory,
            clock,
            orchestrator,
            dir,
        }
    }

    #[test]
    fn test_build_phases_and_panes() {
        let f = fixture(WORKSPACE);
        let report = f.orchestrator.start().unwrap();
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        assert_eq!(
            report.phases,
            vec![
                Phase::Absent,
                Phase::Creating,
                Phase::SubsessionsStarted,
                Phase::WindowsBuilt,
                Phase::SubsessionsAttached,
                Phase::Ready,
            ]
        );

        let session = f.memory.session("demo").unwrap();
        assert_eq!(session.windows.len(), 2);
        let main = session.window("main").unwrap();
        assert_eq!(main.panes.len(), 4);
        // tmux list order for the grid is [vim, git status, api, db].
        assert_eq!(main.panes[0].sent[0].text, "vim");
        assert_eq!(main.panes[1].sent[0].text, "git status");
        assert!(!main.panes[1].sent[0].submitted);
        assert_eq!(main.panes[2].nested.as_deref(), Some("demo_api"));
        assert_eq!(main.panes[3].nested.as_deref(), Some("demo_db"));
        assert_eq!(main.options.get("window-status-style").map(String::as_str), Some("fg=blue"));
        let status_style = session.options.get("status-style").map(String::as_str);
        assert_eq!(status_style, Some("bg=red,fg=black"));
        assert_eq!(session.active_window, 0);
        assert_eq!(main.active_pane, 0);

        let api = f.memory.session("demo_api").unwrap();
        assert_eq!(api.options.get("status-style").map(String::as_str), Some("bg=blue,fg=black"));
        let db = f.memory.session("demo_db").unwrap();
        assert_eq!(db.options.get("status-style").map(String::as_str), Some("bg=green,fg=black"));

        let conf = std::fs::read_to_string(f.dir.path().join("run").join("tmux.conf")).unwrap();
        assert!(conf.contains("set-option -t =demo status-style bg=red,fg=black"));
    }

    #[test]
    fn test_second_start_leaves_session_alone() {
        let f = fixture(WORKSPACE);
        f.orchestrator.start().unwrap();
        let before = f.memory.commands().len();
        let report = f.orchestrator.start().unwrap();
        assert!(report.already_running);
        assert_eq!(report.phase(), Some(Phase::Ready));
        assert_eq!(f.memory.commands().len(), before);
    }

    #[test]
    fn test_typed_pane_command_respects_history() {
        let src = WORKSPACE.replace(
            "        execute: false\n",
            "        execute: false\n        history: false\n",
        );
        let f = fixture(&src);
        f.orchestrator.start().unwrap();
        let main = f.memory.session("demo").unwrap().window("main").unwrap().clone();
        assert_eq!(main.panes[1].sent[0].text, " git status");
        assert!(!main.panes[1].sent[0].submitted);
    }

    #[test]
    fn test_partial_failure_continues() {
        let f = fixture(WORKSPACE);
        f.memory.fail_splits_after(2);
        let report = f.orchestrator.start().unwrap();
        assert_eq!(report.phase(), Some(Phase::Ready));
        assert!(report.discrepancies.contains(&Discrepancy {
            scope: "window main".into(),
            message: "requested 4 panes, created 3".into(),
        }));
        // The db pane was never created, so only api is nested.
        let main = f.memory.session("demo").unwrap().window("main").unwrap().clone();
        assert_eq!(main.panes.iter().filter(|p| p.nested.is_some()).count(), 1);
        assert!(f.memory.session("demo").unwrap().window("logs").is_some());
    }

    #[test]
    fn test_failed_window_is_skipped() {
        let f = fixture(WORKSPACE);
        f.memory.fail_on("new-window");
        let report = f.orchestrator.start().unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].scope, "window logs");
        assert_eq!(f.memory.session("demo").unwrap().windows.len(), 1);
    }

    #[test]
    fn test_session_creation_failure_is_fatal() {
        let f = fixture(WORKSPACE);
        f.memory.fail_on("new-session");
        assert!(matches!(f.orchestrator.start(), Err(MuxwrightError::Mux(_))));
    }

    #[test]
    fn test_missing_subsession_dir_recorded() {
        let f = fixture(WORKSPACE);
        std::fs::remove_dir(f.dir.path().join("db")).unwrap();
        let report = f.orchestrator.start().unwrap();
        let scopes: Vec<&str> = report.discrepancies.iter().map(|d| d.scope.as_str()).collect();
        assert_eq!(scopes, vec!["subsession db", "window main pane 4"]);
        // The pane poll for db ran to exhaustion.
        assert_eq!(f.clock.sleeps().len() as u32, PollPolicy::default().attempts - 1);
    }

    #[test]
    fn test_status_stop_and_kill() {
        let f = fixture(WORKSPACE);
        f.orchestrator.start().unwrap();
        let lines: Vec<String> = f.orchestrator.status().iter().map(|s| s.to_string()).collect();
        assert_eq!(lines, vec!["demo  running", "demo_api  running", "demo_db  running"]);

        assert!(f.orchestrator.stop().unwrap());
        assert!(!f.orchestrator.stop().unwrap());
        assert_eq!(f.memory.session_names(), vec!["demo_api", "demo_db"]);
        assert!(!f.dir.path().join("run").exists());

        assert_eq!(f.orchestrator.kill(&Answer(None)).unwrap(), KillOutcome::NotConfirmed);
        assert_eq!(f.orchestrator.kill(&Answer(Some(false))).unwrap(), KillOutcome::Declined);
        assert_eq!(f.memory.session_names().len(), 2);
        assert_eq!(
            f.orchestrator.kill(&Answer(Some(true))).unwrap(),
            KillOutcome::Killed(vec!["demo_api".into(), "demo_db".into()])
        );
        assert!(f.memory.session_names().is_empty());
    }

    #[test]
    fn test_restart_subsession_reattaches() {
        let f = fixture(WORKSPACE);
        f.orchestrator.start().unwrap();
        let restarted = f.orchestrator.restart(Some("api")).unwrap();
        let Restarted::Subsession { outcome, discrepancies } = restarted else {
            panic!("expected a subsession restart");
        };
        assert!(matches!(outcome, StartOutcome::Started { .. }));
        assert!(discrepancies.is_empty(), "{:?}", discrepancies);

        let nests = f
            .memory
            .commands()
            .iter()
            .filter(|c| c.contains("attach-session -t =demo_api"))
            .count();
        assert_eq!(nests, 2);
        assert!(matches!(
            f.orchestrator.restart(Some("nope")),
            Err(MuxwrightError::TargetNotFound(_))
        ));
    }

    #[test]
    fn test_restart_workspace_keeps_subsessions() {
        let f = fixture(WORKSPACE);
        f.orchestrator.start().unwrap();
        let restarted = f.orchestrator.restart(Some("demo")).unwrap();
        let Restarted::Session(report) = restarted else {
            panic!("expected a session restart");
        };
        assert!(!report.already_running);
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        let starts = f
            .memory
            .commands()
            .iter()
            .filter(|c| c.starts_with("new-session -d -s demo_api"))
            .count();
        assert_eq!(starts, 1);
        assert!(f.clock.sleeps().contains(&DEFAULT_RESTART_GRACE));
    }

    #[test]
    fn test_refresh() {
        let f = fixture(WORKSPACE);
        assert!(f.orchestrator.refresh().is_err());
        f.orchestrator.start().unwrap();
        let before = f.memory.commands().len();
        let report = f.orchestrator.refresh().unwrap();
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        let issued = &f.memory.commands()[before..];
        assert!(!issued.is_empty());
        assert!(issued.iter().all(|c| c.starts_with("set-option")));
    }

    #[test]
    fn test_refresh_restores_renamed_window() {
        let f = fixture(WORKSPACE);
        f.orchestrator.start().unwrap();
        let logs = f.memory.list_windows("demo").unwrap()[1].id.clone();
        f.memory.rename_window(&logs, "scratch").unwrap();

        let report = f.orchestrator.refresh().unwrap();
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        let session = f.memory.session("demo").unwrap();
        assert!(session.window("scratch").is_none());
        assert!(session.window("logs").is_some());
        assert!(f.memory.commands().contains(&format!("rename-window -t {} logs", logs)));
    }

    #[test]
    fn test_open_subsession() {
        let f = fixture(WORKSPACE);
        let opened = f.orchestrator.open_subsession("db").unwrap();
        assert_eq!(opened.session, "demo_db");
        assert!(opened.dispatch.is_none());
        assert_eq!(f.memory.session_names(), vec!["demo_db"]);
        f.orchestrator.attach(&opened.session).unwrap();
        assert_eq!(f.memory.attached(), vec!["demo_db"]);
        assert!(f.orchestrator.open_subsession("nope").is_err());
    }

    #[test]
    fn test_clock_segment_from_runtime() {
        let src = WORKSPACE.replace("color: red\n", "color: red\ntimezone: UTC\n");
        let f = fixture(&src);
        f.orchestrator.start().unwrap();
        let right = f.memory.session("demo").unwrap().options["status-right"].clone();
        assert!(right.contains("clock.sh"), "{}", right);
        assert!(f.dir.path().join("run").join("clock.sh").exists());
    }
}
