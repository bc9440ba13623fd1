//! tmux backend for the [`Multiplexer`] trait.
//!
//! Each operation runs the tmux binary once and waits for it. Windows and
//! panes are addressed by their server ids (`@3`, `%5`) as returned from
//! `-P -F`, so `base-index` and `pane-base-index` settings never matter.
//! Sessions are addressed with an `=` prefix for exact name matching.

use crate::error::MuxError;
use crate::mux::{
    Multiplexer, OptionTarget, PaneId, Split, TmuxLayout, Version, WindowId, WindowInfo,
};
use crate::shell;
use std::path::Path;
use std::process::{Command, Output};

const DEFAULT_TMUX_COMMAND: &str = "tmux";

/// Runs the tmux binary.
#[derive(Debug, Clone)]
pub struct Tmux {
    binary: String,
}

impl Default for Tmux {
    fn default() -> Self {
        Self::new(DEFAULT_TMUX_COMMAND)
    }
}

/// Check if we're running inside a tmux session.
///
/// Checks for the `TMUX` environment variable, which tmux sets when active.
pub fn in_tmux() -> bool {
    std::env::var("TMUX").is_ok_and(|v| !v.is_empty())
}

fn exact(session: &str) -> String {
    format!("={}", session)
}

impl Tmux {
    pub fn new(binary: &str) -> Self {
        let binary = binary.trim();
        Self {
            binary: if binary.is_empty() {
                DEFAULT_TMUX_COMMAND.to_string()
            } else {
                binary.to_string()
            },
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output, MuxError> {
        log::debug!("{} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| MuxError::Spawn(e.to_string()))
    }

    /// Run a command that must succeed; returns trimmed stdout.
    fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(MuxError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                message: format_output(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run_id(&self, args: &[&str]) -> Result<String, MuxError> {
        let id = self.run(args)?;
        let id = id.lines().next().unwrap_or_default().trim().to_string();
        if id.is_empty() {
            return Err(MuxError::Output {
                command: args.first().copied().unwrap_or_default().to_string(),
                output: id,
            });
        }
        Ok(id)
    }
}

impl Multiplexer for Tmux {
    fn version(&self) -> Result<Version, MuxError> {
        let raw = self.run(&["-V"])?;
        Version::parse(&raw).ok_or(MuxError::Output {
            command: "-V".into(),
            output: raw,
        })
    }

    fn has_session(&self, session: &str) -> bool {
        self.output(&["has-session", "-t", &exact(session)])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn new_session(
        &self,
        session: &str,
        dir: &Path,
        window_name: Option<&str>,
    ) -> Result<WindowId, MuxError> {
        let dir = dir.to_string_lossy();
        let mut args: Vec<&str> = vec!["new-session", "-d", "-s", session, "-c", &dir];
        if let Some(name) = window_name {
            args.push("-n");
            args.push(name);
        }
        args.extend(["-P", "-F", "#{window_id}"]);
        self.run_id(&args).map(WindowId)
    }

    fn kill_session(&self, session: &str) -> Result<(), MuxError> {
        self.run(&["kill-session", "-t", &exact(session)]).map(|_| ())
    }

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, MuxError> {
        let out = self.run(&[
            "list-windows",
            "-t",
            &exact(session),
            "-F",
            "#{window_id}\t#{window_index}\t#{window_name}",
        ])?;
        out.lines()
            .map(|line| {
                let mut parts = line.splitn(3, '\t');
                let id = parts.next().unwrap_or_default();
                let index = parts.next().and_then(|i| i.parse().ok());
                let name = parts.next().unwrap_or_default();
                match index {
                    Some(index) if !id.is_empty() => Ok(WindowInfo {
                        id: WindowId(id.to_string()),
                        index,
                        name: name.to_string(),
                    }),
                    _ => Err(MuxError::Output {
                        command: "list-windows".into(),
                        output: line.to_string(),
                    }),
                }
            })
            .collect()
    }

    fn new_window(&self, session: &str, name: &str, dir: &Path) -> Result<WindowId, MuxError> {
        let target = format!("{}:", exact(session));
        let dir = dir.to_string_lossy();
        self.run_id(&[
            "new-window", "-d", "-t", &target, "-n", name, "-c", &dir, "-P", "-F", "#{window_id}",
        ])
        .map(WindowId)
    }

    fn rename_window(&self, window: &WindowId, name: &str) -> Result<(), MuxError> {
        self.run(&["rename-window", "-t", &window.0, name]).map(|_| ())
    }

    fn window_exists(&self, window: &WindowId) -> bool {
        self.output(&["display-message", "-p", "-t", &window.0, "#{window_id}"])
            .map(|o| o.status.success() && !o.stdout.is_empty())
            .unwrap_or(false)
    }

    fn list_panes(&self, window: &WindowId) -> Result<Vec<PaneId>, MuxError> {
        let out = self.run(&["list-panes", "-t", &window.0, "-F", "#{pane_id}"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| PaneId(l.to_string()))
            .collect())
    }

    fn split_pane(&self, pane: &PaneId, split: Split, dir: &Path) -> Result<PaneId, MuxError> {
        let dir = dir.to_string_lossy();
        self.run_id(&[
            "split-window",
            split.flag(),
            "-d",
            "-t",
            &pane.0,
            "-c",
            &dir,
            "-P",
            "-F",
            "#{pane_id}",
        ])
        .map(PaneId)
    }

    fn select_layout(&self, window: &WindowId, layout: TmuxLayout) -> Result<(), MuxError> {
        self.run(&["select-layout", "-t", &window.0, layout.as_str()])
            .map(|_| ())
    }

    fn send_text(&self, pane: &PaneId, text: &str, submit: bool) -> Result<(), MuxError> {
        if !text.is_empty() {
            self.run(&["send-keys", "-t", &pane.0, "-l", text])?;
        }
        if submit {
            self.run(&["send-keys", "-t", &pane.0, "Enter"])?;
        }
        Ok(())
    }

    fn set_option(&self, target: &OptionTarget, name: &str, value: &str) -> Result<(), MuxError> {
        let result = match target {
            OptionTarget::Server => self.run(&["set-option", "-s", name, value]),
            OptionTarget::Session(session) => {
                self.run(&["set-option", "-t", &exact(session), name, value])
            }
            OptionTarget::Window(window) => {
                self.run(&["set-option", "-w", "-t", &window.0, name, value])
            }
        };
        result.map(|_| ())
    }

    fn select_window(&self, window: &WindowId) -> Result<(), MuxError> {
        self.run(&["select-window", "-t", &window.0]).map(|_| ())
    }

    fn select_pane(&self, pane: &PaneId) -> Result<(), MuxError> {
        self.run(&["select-pane", "-t", &pane.0]).map(|_| ())
    }

    fn nest_session(&self, pane: &PaneId, session: &str) -> Result<(), MuxError> {
        // Unset TMUX so the inner client does not refuse to nest.
        let line = format!(
            "TMUX= {} attach-session -t {}",
            shell::quote(&self.binary),
            shell::quote(&exact(session))
        );
        self.send_text(pane, &shell::with_history(&line, false), true)
    }

    fn attach_client(&self, session: &str) -> Result<(), MuxError> {
        let target = exact(session);
        if in_tmux() {
            return self.run(&["switch-client", "-t", &target]).map(|_| ());
        }
        let status = Command::new(&self.binary)
            .args(["attach-session", "-t", &target])
            .status()
            .map_err(|e| MuxError::Spawn(e.to_string()))?;
        if !status.success() {
            return Err(MuxError::Command {
                command: "attach-session".into(),
                message: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}

fn format_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut parts = Vec::new();
    if !stderr.trim().is_empty() {
        parts.push(stderr.trim().to_string());
    }
    if !stdout.trim().is_empty() {
        parts.push(stdout.trim().to_string());
    }
    if parts.is_empty() {
        format!("exit status {}", output.status)
    } else {
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_binary_falls_back_to_tmux() {
        assert_eq!(Tmux::new("  ").binary, "tmux");
        assert_eq!(Tmux::new("/opt/bin/tmux").binary, "/opt/bin/tmux");
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let tmux = Tmux::new("/nonexistent/muxwright-tmux");
        assert!(matches!(tmux.version(), Err(MuxError::Spawn(_))));
        assert!(!tmux.has_session("demo"));
    }
}
