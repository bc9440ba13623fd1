//! The multiplexer adapter boundary.
//!
//! Everything that touches a tmux server goes through [`Multiplexer`]. The
//! real implementation is [`crate::tmux::Tmux`]; [`crate::memory::MemoryMux`]
//! keeps an in-memory model of a server for dry runs and tests.
//!
//! Calls are synchronous and individually blocking. The server serializes its
//! own command stream, so implementations need no locking beyond what their
//! own state requires.

use crate::error::MuxError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to a multiplexer backend.
pub type SharedMux = Arc<dyn Multiplexer>;

/// A tmux window target: a window id (`@3`) or `=session:` for the current
/// window of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowId(pub String);

impl WindowId {
    /// The current window of `session`.
    pub fn of_session(session: &str) -> Self {
        WindowId(format!("={}:", session))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tmux pane target: a pane id (`%5`) or `=session:` for the active pane of
/// a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaneId(pub String);

impl PaneId {
    /// The active pane of `session`.
    pub fn of_session(session: &str) -> Self {
        PaneId(format!("={}:", session))
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a pane split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// New pane to the right (`split-window -h`).
    Right,
    /// New pane below (`split-window -v`).
    Below,
}

impl Split {
    pub fn flag(self) -> &'static str {
        match self {
            Split::Right => "-h",
            Split::Below => "-v",
        }
    }
}

/// tmux's built-in layouts used by the layout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmuxLayout {
    /// Side-by-side panes.
    EvenHorizontal,
    /// Spread panes evenly in both directions.
    Tiled,
}

impl TmuxLayout {
    /// Name used by `select-layout`.
    pub fn as_str(self) -> &'static str {
        match self {
            TmuxLayout::EvenHorizontal => "even-horizontal",
            TmuxLayout::Tiled => "tiled",
        }
    }
}

/// Where an option is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionTarget {
    Server,
    Session(String),
    Window(WindowId),
}

impl fmt::Display for OptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionTarget::Server => f.write_str("server"),
            OptionTarget::Session(name) => write!(f, "session {}", name),
            OptionTarget::Window(id) => write!(f, "window {}", id),
        }
    }
}

/// A window as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub index: u32,
    pub name: String,
}

/// tmux version as reported by `tmux -V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub raw: String,
}

impl Version {
    /// Parse `tmux -V` output such as `tmux 3.3a` or `tmux next-3.5`.
    ///
    /// Development builds (`tmux master`) count as newer than any release.
    ///
    /// ```
    /// use muxwright::mux::Version;
    ///
    /// let v = Version::parse("tmux 3.3a").unwrap();
    /// assert_eq!((v.major, v.minor), (3, 3));
    /// assert!(Version::parse("tmux master").unwrap().at_least(3, 0));
    /// assert!(Version::parse("screen").is_none());
    /// ```
    pub fn parse(output: &str) -> Option<Version> {
        let raw = output.trim().strip_prefix("tmux ")?.trim().to_string();
        if raw == "master" {
            return Some(Version {
                major: u32::MAX,
                minor: 0,
                raw,
            });
        }
        let numeric = raw.trim_start_matches(|c: char| !c.is_ascii_digit());
        let (major, rest) = numeric.split_once('.')?;
        let minor: String = rest.chars().take_while(char::is_ascii_digit).collect();
        Some(Version {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
            raw,
        })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

/// Operations the orchestrator needs from a terminal multiplexer server.
pub trait Multiplexer: Send + Sync {
    fn version(&self) -> Result<Version, MuxError>;

    /// Whether a session with exactly this name exists.
    fn has_session(&self, session: &str) -> bool;

    /// Create a detached session rooted at `dir`; returns its first window.
    fn new_session(
        &self,
        session: &str,
        dir: &Path,
        window_name: Option<&str>,
    ) -> Result<WindowId, MuxError>;

    fn kill_session(&self, session: &str) -> Result<(), MuxError>;

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, MuxError>;

    fn new_window(&self, session: &str, name: &str, dir: &Path) -> Result<WindowId, MuxError>;

    fn rename_window(&self, window: &WindowId, name: &str) -> Result<(), MuxError>;

    /// Whether the window exists and answers queries.
    fn window_exists(&self, window: &WindowId) -> bool;

    fn list_panes(&self, window: &WindowId) -> Result<Vec<PaneId>, MuxError>;

    /// Split `pane`; returns the new pane.
    fn split_pane(&self, pane: &PaneId, split: Split, dir: &Path) -> Result<PaneId, MuxError>;

    fn select_layout(&self, window: &WindowId, layout: TmuxLayout) -> Result<(), MuxError>;

    /// Type `text` literally into `pane`, pressing Enter afterwards if `submit`.
    fn send_text(&self, pane: &PaneId, text: &str, submit: bool) -> Result<(), MuxError>;

    fn set_option(&self, target: &OptionTarget, name: &str, value: &str) -> Result<(), MuxError>;

    fn select_window(&self, window: &WindowId) -> Result<(), MuxError>;

    fn select_pane(&self, pane: &PaneId) -> Result<(), MuxError>;

    /// Show `session` inside `pane` as a nested client.
    fn nest_session(&self, pane: &PaneId, session: &str) -> Result<(), MuxError>;

    /// Attach the user's terminal to `session`, or switch to it when already
    /// inside tmux. Blocks until the client detaches.
    fn attach_client(&self, session: &str) -> Result<(), MuxError>;
}
