//! Registry of tmux options muxwright knows how to set.
//!
//! Every option name in a workspace file must resolve to an [`OptionDef`]
//! here (or be a user option starting with `@`). The registry decides which
//! tmux scope flag an option is set with, so a window option listed under a
//! session overlay is caught during validation instead of being passed
//! through to tmux and failing at runtime.

/// The tmux scope an option lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    /// `set-option -s`
    Server,
    /// `set-option -t <session>`
    Session,
    /// `set-option -w -t <window>`
    Window,
    /// Pane options, set on the window so every pane inherits them.
    Pane,
}

/// A known option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDef {
    pub name: &'static str,
    pub kind: OptionKind,
}

const fn def(name: &'static str, kind: OptionKind) -> OptionDef {
    OptionDef { name, kind }
}

use self::OptionKind::{Pane, Server, Session, Window};

/// Options accepted in overlays.
pub static REGISTRY: &[OptionDef] = &[
    // server
    def("escape-time", Server),
    def("exit-empty", Server),
    def("focus-events", Server),
    def("history-file", Server),
    def("set-clipboard", Server),
    def("terminal-overrides", Server),
    def("extended-keys", Server),
    // session
    def("base-index", Session),
    def("default-command", Session),
    def("default-shell", Session),
    def("default-terminal", Session),
    def("detach-on-destroy", Session),
    def("display-time", Session),
    def("history-limit", Session),
    def("mouse", Session),
    def("prefix", Session),
    def("renumber-windows", Session),
    def("set-titles", Session),
    def("set-titles-string", Session),
    def("status", Session),
    def("status-interval", Session),
    def("status-justify", Session),
    def("status-keys", Session),
    def("status-left", Session),
    def("status-left-length", Session),
    def("status-left-style", Session),
    def("status-position", Session),
    def("status-right", Session),
    def("status-right-length", Session),
    def("status-right-style", Session),
    def("status-style", Session),
    def("message-style", Session),
    def("visual-activity", Session),
    def("visual-bell", Session),
    // window
    def("aggressive-resize", Window),
    def("automatic-rename", Window),
    def("clock-mode-colour", Window),
    def("main-pane-height", Window),
    def("main-pane-width", Window),
    def("mode-keys", Window),
    def("mode-style", Window),
    def("monitor-activity", Window),
    def("monitor-bell", Window),
    def("pane-base-index", Window),
    def("pane-border-format", Window),
    def("pane-border-status", Window),
    def("pane-border-style", Window),
    def("pane-active-border-style", Window),
    def("synchronize-panes", Window),
    def("window-status-current-format", Window),
    def("window-status-current-style", Window),
    def("window-status-format", Window),
    def("window-status-style", Window),
    def("window-size", Window),
    // pane
    def("allow-rename", Pane),
    def("alternate-screen", Pane),
    def("remain-on-exit", Pane),
    def("window-active-style", Pane),
    def("window-style", Pane),
];

/// How an option name resolved against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Known(OptionDef),
    /// `@name` user option, stored at whatever scope it is set in.
    User,
    Unknown,
}

/// Look up an option name.
///
/// ```
/// use muxwright::options::{lookup, Lookup, OptionKind};
///
/// assert!(matches!(lookup("mouse"), Lookup::Known(d) if d.kind == OptionKind::Session));
/// assert_eq!(lookup("@project"), Lookup::User);
/// assert_eq!(lookup("no-such-option"), Lookup::Unknown);
/// ```
pub fn lookup(name: &str) -> Lookup {
    if name.len() > 1 && name.starts_with('@') {
        return Lookup::User;
    }
    match REGISTRY.iter().find(|d| d.name == name) {
        Some(def) => Lookup::Known(*def),
        None => Lookup::Unknown,
    }
}

/// Whether an option of `kind` may appear in a window overlay.
///
/// Session-like overlays (global, session, subsession) accept every kind and
/// push window and pane options down to the windows of that session.
pub fn allowed_in_window(kind: OptionKind) -> bool {
    matches!(kind, OptionKind::Window | OptionKind::Pane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_has_no_duplicates() {
        let mut seen = HashSet::new();
        for def in REGISTRY {
            assert!(seen.insert(def.name), "duplicate option {}", def.name);
        }
    }

    #[test]
    fn test_registry_names_are_plain() {
        for def in REGISTRY {
            assert!(!def.name.is_empty());
            assert!(!def.name.starts_with('@'), "{} shadows user options", def.name);
            assert!(!def.name.contains(char::is_whitespace));
        }
    }

    #[test]
    fn test_lookup() {
        assert!(matches!(
            lookup("synchronize-panes"),
            Lookup::Known(OptionDef { kind: OptionKind::Window, .. })
        ));
        assert_eq!(lookup("@"), Lookup::Unknown);
        assert_eq!(lookup("statusline"), Lookup::Unknown);
    }

    #[test]
    fn test_color_sugar_options_are_registered() {
        for name in [
            "status-style",
            "status-left",
            "status-right",
            "window-status-style",
            "window-status-current-style",
            "pane-active-border-style",
        ] {
            assert!(matches!(lookup(name), Lookup::Known(_)), "{name} missing");
        }
    }
}
