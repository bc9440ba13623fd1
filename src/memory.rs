//! In-memory [`Multiplexer`] backend.
//!
//! `MemoryMux` models just enough of a tmux server (sessions, windows,
//! panes, options, typed text, nested clients) to run the orchestrator
//! without tmux. It records every mutating call as a tmux-like command line,
//! which `--dry-run` prints, and supports failure injection for tests.

use crate::error::MuxError;
use crate::mux::{
    Multiplexer, OptionTarget, PaneId, Split, TmuxLayout, Version, WindowId, WindowInfo,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Text typed into a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub text: String,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaneSnapshot {
    pub id: PaneId,
    pub dir: PathBuf,
    pub sent: Vec<SentText>,
    /// Session shown in this pane through a nested client.
    pub nested: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub id: WindowId,
    pub index: u32,
    pub name: String,
    pub layout: Option<TmuxLayout>,
    pub options: BTreeMap<String, String>,
    pub panes: Vec<PaneSnapshot>,
    pub active_pane: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub name: String,
    pub dir: PathBuf,
    pub options: BTreeMap<String, String>,
    pub windows: Vec<WindowSnapshot>,
    pub active_window: usize,
}

impl SessionSnapshot {
    pub fn window(&self, name: &str) -> Option<&WindowSnapshot> {
        self.windows.iter().find(|w| w.name == name)
    }
}

#[derive(Debug, Default)]
struct State {
    sessions: Vec<SessionSnapshot>,
    server_options: BTreeMap<String, String>,
    next_window: u32,
    next_pane: u32,
    commands: Vec<String>,
    attached: Vec<String>,
    splits: usize,
    fail_splits_after: Option<usize>,
    failing: Vec<String>,
}

impl State {
    fn session_mut(&mut self, name: &str) -> Result<&mut SessionSnapshot, MuxError> {
        self.sessions
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| MuxError::Missing(format!("session {}", name)))
    }

    /// Resolve `@N` or `=session:` to (session, window) indices.
    fn locate_window(&self, target: &str) -> Result<(usize, usize), MuxError> {
        if let Some(session) = target.strip_prefix('=').and_then(|t| t.strip_suffix(':')) {
            let s = self
                .sessions
                .iter()
                .position(|s| s.name == session)
                .ok_or_else(|| MuxError::Missing(format!("session {}", session)))?;
            let w = self.sessions[s].active_window;
            if w < self.sessions[s].windows.len() {
                return Ok((s, w));
            }
        } else {
            for (s, session) in self.sessions.iter().enumerate() {
                if let Some(w) = session.windows.iter().position(|w| w.id.0 == target) {
                    return Ok((s, w));
                }
            }
        }
        Err(MuxError::Missing(format!("window {}", target)))
    }

    /// Resolve `%N` or `=session:` to (session, window, pane) indices.
    fn locate_pane(&self, target: &str) -> Result<(usize, usize, usize), MuxError> {
        if target.starts_with('=') {
            let (s, w) = self.locate_window(target)?;
            return Ok((s, w, self.sessions[s].windows[w].active_pane));
        }
        for (s, session) in self.sessions.iter().enumerate() {
            for (w, window) in session.windows.iter().enumerate() {
                if let Some(p) = window.panes.iter().position(|p| p.id.0 == target) {
                    return Ok((s, w, p));
                }
            }
        }
        Err(MuxError::Missing(format!("pane {}", target)))
    }

    fn new_window(&mut self, name: &str, dir: &Path, index: u32) -> WindowSnapshot {
        let id = WindowId(format!("@{}", self.next_window));
        self.next_window += 1;
        let pane = self.new_pane(dir);
        WindowSnapshot {
            id,
            index,
            name: name.to_string(),
            layout: None,
            options: BTreeMap::new(),
            panes: vec![pane],
            active_pane: 0,
        }
    }

    fn new_pane(&mut self, dir: &Path) -> PaneSnapshot {
        let id = PaneId(format!("%{}", self.next_pane));
        self.next_pane += 1;
        PaneSnapshot {
            id,
            dir: dir.to_path_buf(),
            sent: Vec::new(),
            nested: None,
        }
    }
}

/// An in-memory multiplexer server.
#[derive(Debug, Default)]
pub struct MemoryMux {
    state: Mutex<State>,
}

impl MemoryMux {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a command line and fail it if a failure was injected for its
    /// verb.
    fn record(&self, state: &mut State, line: String) -> Result<(), MuxError> {
        let verb = line.split_whitespace().next().unwrap_or_default().to_string();
        state.commands.push(line);
        if state.failing.iter().any(|f| *f == verb) {
            return Err(MuxError::Command {
                command: verb,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    /// Make every future command with this verb (e.g. `new-window`) fail.
    pub fn fail_on(&self, verb: &str) {
        self.lock().failing.push(verb.to_string());
    }

    /// Let `n` more splits succeed, then fail every split after that.
    pub fn fail_splits_after(&self, n: usize) {
        let mut state = self.lock();
        state.fail_splits_after = Some(state.splits + n);
    }

    /// Command lines issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn session(&self, name: &str) -> Option<SessionSnapshot> {
        self.lock().sessions.iter().find(|s| s.name == name).cloned()
    }

    pub fn session_names(&self) -> Vec<String> {
        self.lock().sessions.iter().map(|s| s.name.clone()).collect()
    }

    pub fn server_option(&self, name: &str) -> Option<String> {
        self.lock().server_options.get(name).cloned()
    }

    /// Sessions a client attached to, in order.
    pub fn attached(&self) -> Vec<String> {
        self.lock().attached.clone()
    }

    /// Remove a session behind the orchestrator's back, as if the user had
    /// killed it by hand.
    pub fn remove_session(&self, name: &str) {
        self.lock().sessions.retain(|s| s.name != name);
    }
}

impl Multiplexer for MemoryMux {
    fn version(&self) -> Result<Version, MuxError> {
        Ok(Version {
            major: 3,
            minor: 4,
            raw: "3.4 (memory)".into(),
        })
    }

    fn has_session(&self, session: &str) -> bool {
        self.lock().sessions.iter().any(|s| s.name == session)
    }

    fn new_session(
        &self,
        session: &str,
        dir: &Path,
        window_name: Option<&str>,
    ) -> Result<WindowId, MuxError> {
        let mut state = self.lock();
        let mut line = format!("new-session -d -s {} -c {}", session, dir.display());
        if let Some(name) = window_name {
            line.push_str(&format!(" -n {}", name));
        }
        self.record(&mut state, line)?;
        if state.sessions.iter().any(|s| s.name == session) {
            return Err(MuxError::Command {
                command: "new-session".into(),
                message: format!("duplicate session: {}", session),
            });
        }
        let window = state.new_window(window_name.unwrap_or("shell"), dir, 0);
        let id = window.id.clone();
        state.sessions.push(SessionSnapshot {
            name: session.to_string(),
            dir: dir.to_path_buf(),
            options: BTreeMap::new(),
            windows: vec![window],
            active_window: 0,
        });
        Ok(id)
    }

    fn kill_session(&self, session: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("kill-session -t ={}", session))?;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.name != session);
        if state.sessions.len() == before {
            return Err(MuxError::Missing(format!("session {}", session)));
        }
        Ok(())
    }

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, MuxError> {
        let mut state = self.lock();
        Ok(state
            .session_mut(session)?
            .windows
            .iter()
            .map(|w| WindowInfo {
                id: w.id.clone(),
                index: w.index,
                name: w.name.clone(),
            })
            .collect())
    }

    fn new_window(&self, session: &str, name: &str, dir: &Path) -> Result<WindowId, MuxError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            format!("new-window -d -t ={}: -n {} -c {}", session, name, dir.display()),
        )?;
        let index = state
            .session_mut(session)?
            .windows
            .iter()
            .map(|w| w.index + 1)
            .max()
            .unwrap_or(0);
        let window = state.new_window(name, dir, index);
        let id = window.id.clone();
        state.session_mut(session)?.windows.push(window);
        Ok(id)
    }

    fn rename_window(&self, window: &WindowId, name: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("rename-window -t {} {}", window, name))?;
        let (s, w) = state.locate_window(&window.0)?;
        state.sessions[s].windows[w].name = name.to_string();
        Ok(())
    }

    fn window_exists(&self, window: &WindowId) -> bool {
        self.lock().locate_window(&window.0).is_ok()
    }

    fn list_panes(&self, window: &WindowId) -> Result<Vec<PaneId>, MuxError> {
        let state = self.lock();
        let (s, w) = state.locate_window(&window.0)?;
        Ok(state.sessions[s].windows[w]
            .panes
            .iter()
            .map(|p| p.id.clone())
            .collect())
    }

    fn split_pane(&self, pane: &PaneId, split: Split, dir: &Path) -> Result<PaneId, MuxError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            format!("split-window {} -d -t {} -c {}", split.flag(), pane, dir.display()),
        )?;
        if state.fail_splits_after.is_some_and(|limit| state.splits >= limit) {
            return Err(MuxError::Command {
                command: "split-window".into(),
                message: "no space for new pane".into(),
            });
        }
        let (s, w, p) = state.locate_pane(&pane.0)?;
        state.splits += 1;
        let new = state.new_pane(dir);
        let id = new.id.clone();
        state.sessions[s].windows[w].panes.insert(p + 1, new);
        Ok(id)
    }

    fn select_layout(&self, window: &WindowId, layout: TmuxLayout) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("select-layout -t {} {}", window, layout.as_str()))?;
        let (s, w) = state.locate_window(&window.0)?;
        state.sessions[s].windows[w].layout = Some(layout);
        Ok(())
    }

    fn send_text(&self, pane: &PaneId, text: &str, submit: bool) -> Result<(), MuxError> {
        let mut state = self.lock();
        let mut line = format!("send-keys -t {} -l {:?}", pane, text);
        if submit {
            line.push_str(" Enter");
        }
        self.record(&mut state, line)?;
        let (s, w, p) = state.locate_pane(&pane.0)?;
        state.sessions[s].windows[w].panes[p].sent.push(SentText {
            text: text.to_string(),
            submitted: submit,
        });
        Ok(())
    }

    fn set_option(&self, target: &OptionTarget, name: &str, value: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        let line = match target {
            OptionTarget::Server => format!("set-option -s {} {:?}", name, value),
            OptionTarget::Session(session) => {
                format!("set-option -t ={} {} {:?}", session, name, value)
            }
            OptionTarget::Window(window) => {
                format!("set-option -w -t {} {} {:?}", window, name, value)
            }
        };
        self.record(&mut state, line)?;
        match target {
            OptionTarget::Server => {
                state.server_options.insert(name.to_string(), value.to_string());
            }
            OptionTarget::Session(session) => {
                state
                    .session_mut(session)?
                    .options
                    .insert(name.to_string(), value.to_string());
            }
            OptionTarget::Window(window) => {
                let (s, w) = state.locate_window(&window.0)?;
                state.sessions[s].windows[w]
                    .options
                    .insert(name.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn select_window(&self, window: &WindowId) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("select-window -t {}", window))?;
        let (s, w) = state.locate_window(&window.0)?;
        state.sessions[s].active_window = w;
        Ok(())
    }

    fn select_pane(&self, pane: &PaneId) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("select-pane -t {}", pane))?;
        let (s, w, p) = state.locate_pane(&pane.0)?;
        state.sessions[s].windows[w].active_pane = p;
        Ok(())
    }

    fn nest_session(&self, pane: &PaneId, session: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            format!(
                "send-keys -t {} -l \" TMUX= tmux attach-session -t ={}\" Enter",
                pane, session
            ),
        )?;
        if !state.sessions.iter().any(|s| s.name == session) {
            return Err(MuxError::Missing(format!("session {}", session)));
        }
        let (s, w, p) = state.locate_pane(&pane.0)?;
        state.sessions[s].windows[w].panes[p].nested = Some(session.to_string());
        Ok(())
    }

    fn attach_client(&self, session: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        self.record(&mut state, format!("attach-session -t ={}", session))?;
        if !state.sessions.iter().any(|s| s.name == session) {
            return Err(MuxError::Missing(format!("session {}", session)));
        }
        state.attached.push(session.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_window_pane_model() {
        let mux = MemoryMux::new();
        let first = mux.new_session("demo", Path::new("/w"), Some("main")).unwrap();
        assert!(mux.has_session("demo"));
        assert!(mux.window_exists(&first));
        assert!(mux.window_exists(&WindowId::of_session("demo")));

        let panes = mux.list_panes(&first).unwrap();
        let right = mux.split_pane(&panes[0], Split::Right, Path::new("/w")).unwrap();
        assert_eq!(mux.list_panes(&first).unwrap(), vec![panes[0].clone(), right.clone()]);

        mux.send_text(&right, "ls", true).unwrap();
        let session = mux.session("demo").unwrap();
        assert_eq!(session.windows[0].panes[1].sent[0].text, "ls");

        let second = mux.new_window("demo", "logs", Path::new("/w")).unwrap();
        let windows = mux.list_windows("demo").unwrap();
        assert_eq!(windows[1].id, second);
        assert_eq!(windows[1].index, 1);
    }

    #[test]
    fn test_failure_injection() {
        let mux = MemoryMux::new();
        let window = mux.new_session("demo", Path::new("/w"), None).unwrap();
        let pane = mux.list_panes(&window).unwrap()[0].clone();
        mux.fail_splits_after(1);
        assert!(mux.split_pane(&pane, Split::Below, Path::new("/w")).is_ok());
        assert!(mux.split_pane(&pane, Split::Below, Path::new("/w")).is_err());

        mux.fail_on("new-window");
        assert!(mux.new_window("demo", "x", Path::new("/w")).is_err());
        assert!(mux.commands().iter().any(|c| c.starts_with("new-window")));
    }

    #[test]
    fn test_option_targets() {
        let mux = MemoryMux::new();
        let window = mux.new_session("demo", Path::new("/w"), Some("main")).unwrap();
        mux.set_option(&OptionTarget::Server, "escape-time", "0").unwrap();
        mux.set_option(&OptionTarget::Session("demo".into()), "mouse", "on").unwrap();
        mux.set_option(&OptionTarget::Window(window), "synchronize-panes", "off").unwrap();

        assert_eq!(mux.server_option("escape-time").as_deref(), Some("0"));
        let session = mux.session("demo").unwrap();
        assert_eq!(session.options.get("mouse").map(String::as_str), Some("on"));
        let main = session.window("main").unwrap();
        assert_eq!(main.options.get("synchronize-panes").map(String::as_str), Some("off"));
        assert!(mux.session("other").is_none());
        assert_eq!(mux.commands()[1], "set-option -s escape-time \"0\"");
    }

    #[test]
    fn test_duplicate_session_rejected() {
        let mux = MemoryMux::new();
        mux.new_session("demo", Path::new("/w"), None).unwrap();
        assert!(mux.new_session("demo", Path::new("/w"), None).is_err());
        mux.remove_session("demo");
        assert!(!mux.has_session("demo"));
    }
}
