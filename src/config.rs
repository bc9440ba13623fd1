//! Validated workspace configuration.
//!
//! [`Config::from_document`] turns a parsed [`Document`] into typed data and
//! rejects anything the orchestrator could not build. Nothing in here talks
//! to tmux; a `Config` that exists is safe to hand to
//! [`crate::orchestrator::Orchestrator`].
//!
//! Relative directories are resolved against the directory holding the
//! workspace file, and a leading `~` expands to the home directory.

use crate::document::{Document, Pairs, PaneDoc, SubsessionDoc, WindowDoc};
use crate::error::ConfigError;
use crate::options::{self, Lookup, OptionKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One option in an overlay, already checked against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub name: String,
    pub value: String,
    pub kind: OptionKind,
}

/// Ordered option overrides attached to one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    entries: Vec<OverlayEntry>,
}

impl Overlay {
    /// Check `pairs` against the option registry.
    ///
    /// `window_scope` restricts the overlay to window and pane options.
    /// User options (`@name`) take the natural kind of the scope.
    pub fn from_pairs(scope: &str, pairs: &Pairs, window_scope: bool) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            let kind = match options::lookup(name) {
                Lookup::Known(def) => {
                    if window_scope && !options::allowed_in_window(def.kind) {
                        return Err(ConfigError::MisplacedOption {
                            scope: scope.to_string(),
                            option: name.clone(),
                        });
                    }
                    def.kind
                }
                Lookup::User if window_scope => OptionKind::Window,
                Lookup::User => OptionKind::Session,
                Lookup::Unknown => {
                    return Err(ConfigError::UnknownOption {
                        scope: scope.to_string(),
                        option: name.clone(),
                    });
                }
            };
            entries.push(OverlayEntry {
                name: name.clone(),
                value: value.clone(),
                kind,
            });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&OverlayEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverlayEntry> {
        self.entries.iter()
    }

    /// Add entries from `lower` that this overlay does not set itself.
    pub fn layered_over(&self, lower: &Overlay) -> Overlay {
        let mut entries = self.entries.clone();
        for entry in &lower.entries {
            if self.get(&entry.name).is_none() {
                entries.push(entry.clone());
            }
        }
        Overlay { entries }
    }
}

/// An independently running background session.
#[derive(Debug, Clone, PartialEq)]
pub struct Subsession {
    pub name: String,
    /// Working directory. Required for subsessions referenced by a pane.
    pub dir: Option<PathBuf>,
    /// Shell command; empty means "just a shell".
    pub command: String,
    pub delay: Duration,
    pub env: Vec<(String, String)>,
    /// Submit the command (`true`) or leave it typed at the prompt.
    pub execute: bool,
    /// Keep the command in shell history.
    pub history: bool,
    pub color: Option<String>,
    pub options: Overlay,
}

/// One pane of a window.
#[derive(Debug, Clone, PartialEq)]
pub enum Pane {
    Command {
        cmd: String,
        execute: bool,
        history: bool,
    },
    Subsession {
        name: String,
        /// Sent into the subsession before the pane attaches to it.
        cmd: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub name: String,
    pub dir: PathBuf,
    pub color: Option<String>,
    pub options: Overlay,
    pub panes: Vec<Pane>,
}

/// A validated workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// tmux session name of the workspace.
    pub name: String,
    /// Directory of the workspace file.
    pub base_dir: PathBuf,
    pub timezone: Option<String>,
    pub show_utc: bool,
    /// Legacy session color.
    pub color: Option<String>,
    pub global_options: Overlay,
    pub session_options: Overlay,
    pub subsessions: Vec<Subsession>,
    pub windows: Vec<Window>,
}

impl Config {
    /// Validate a document.
    ///
    /// Checks run in a fixed order: `name`, at least one window, at least one
    /// pane per window, subsession references (existing and with a `dir`),
    /// then names, values and options.
    pub fn from_document(doc: &Document, base_dir: &Path) -> Result<Self, ConfigError> {
        let name = doc
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::MissingName)?
            .to_string();
        check_session_name("workspace", &name)?;

        if doc.windows.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        for (i, window) in doc.windows.iter().enumerate() {
            if window.panes.is_empty() {
                return Err(ConfigError::EmptyWindow {
                    window: window_label(window, i),
                });
            }
        }
        for (i, window) in doc.windows.iter().enumerate() {
            for (p, pane) in window.panes.iter().enumerate() {
                let Some(target) = pane.subsession.as_deref() else {
                    continue;
                };
                let sub = doc.subsessions.iter().find(|s| s.name == target);
                match sub {
                    None => {
                        return Err(ConfigError::UnknownSubsession {
                            window: window_label(window, i),
                            pane: p + 1,
                            subsession: target.to_string(),
                        });
                    }
                    Some(sub) if sub.dir.as_deref().is_none_or(|d| d.trim().is_empty()) => {
                        return Err(ConfigError::SubsessionWithoutDir {
                            window: window_label(window, i),
                            pane: p + 1,
                            subsession: target.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        let show_utc = match doc.show_utc.as_deref() {
            Some(raw) => parse_bool("workspace", "show_utc", raw)?,
            None => false,
        };

        let mut subsessions = Vec::with_capacity(doc.subsessions.len());
        let mut seen = HashSet::new();
        for sub in &doc.subsessions {
            if !seen.insert(sub.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "subsession",
                    name: sub.name.clone(),
                });
            }
            subsessions.push(subsession(sub, base_dir)?);
        }

        let mut windows = Vec::with_capacity(doc.windows.len());
        let mut seen = HashSet::new();
        for (i, window_doc) in doc.windows.iter().enumerate() {
            let window = window(window_doc, i, base_dir)?;
            if !seen.insert(window.name.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "window",
                    name: window.name,
                });
            }
            windows.push(window);
        }

        Ok(Config {
            name,
            base_dir: base_dir.to_path_buf(),
            timezone: non_empty(doc.timezone.as_deref()),
            show_utc,
            color: non_empty(doc.color.as_deref()),
            global_options: Overlay::from_pairs("options.global", &doc.global_options, false)?,
            session_options: Overlay::from_pairs("options.session", &doc.session_options, false)?,
            subsessions,
            windows,
        })
    }

    pub fn subsession(&self, name: &str) -> Option<&Subsession> {
        self.subsessions.iter().find(|s| s.name == name)
    }

    pub fn window(&self, name: &str) -> Option<&Window> {
        self.windows.iter().find(|w| w.name == name)
    }

    /// tmux session name used for a subsession.
    ///
    /// Prefixed with the workspace name so two workspaces may both declare
    /// e.g. an `api` subsession.
    pub fn subsession_session(&self, name: &str) -> String {
        format!("{}_{}", self.name, name)
    }

    /// Directory the top-level session is created in.
    pub fn root_dir(&self) -> &Path {
        self.windows
            .first()
            .map(|w| w.dir.as_path())
            .unwrap_or(self.base_dir.as_path())
    }

    /// Whether a clock segment should be rendered in the status bar.
    pub fn wants_clock(&self) -> bool {
        self.timezone.is_some() || self.show_utc
    }
}

fn subsession(doc: &SubsessionDoc, base_dir: &Path) -> Result<Subsession, ConfigError> {
    let scope = format!("subsession `{}`", doc.name);
    check_session_name(&scope, &doc.name)?;
    let delay = match doc.delay.as_deref() {
        Some(raw) => parse_delay(&scope, raw)?,
        None => Duration::ZERO,
    };
    let execute = match doc.execute.as_deref() {
        Some(raw) => parse_bool(&scope, "execute", raw)?,
        None => true,
    };
    let history = match doc.history.as_deref() {
        Some(raw) => parse_bool(&scope, "history", raw)?,
        None => false,
    };
    let env = doc
        .env
        .iter()
        .map(|entry| parse_env(&scope, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Subsession {
        name: doc.name.clone(),
        dir: non_empty(doc.dir.as_deref()).map(|d| resolve_dir(&d, base_dir)),
        command: doc.command.clone().unwrap_or_default(),
        delay,
        env,
        execute,
        history,
        color: non_empty(doc.color.as_deref()),
        options: Overlay::from_pairs(&scope, &doc.options, false)?,
    })
}

fn window(doc: &WindowDoc, index: usize, base_dir: &Path) -> Result<Window, ConfigError> {
    let label = window_label(doc, index);
    let name = non_empty(doc.name.as_deref()).ok_or_else(|| ConfigError::InvalidValue {
        scope: format!("window {}", label),
        field: "name".to_string(),
        value: String::new(),
        expected: "a non-empty name",
    })?;
    let dir = match non_empty(doc.dir.as_deref()) {
        Some(dir) => resolve_dir(&dir, base_dir),
        None => base_dir.to_path_buf(),
    };
    let panes = doc
        .panes
        .iter()
        .enumerate()
        .map(|(p, pane)| self::pane(pane, &name, p + 1))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Window {
        options: Overlay::from_pairs(&format!("window `{}`", name), &doc.options, true)?,
        name,
        dir,
        color: non_empty(doc.color.as_deref()),
        panes,
    })
}

fn pane(doc: &PaneDoc, window: &str, index: usize) -> Result<Pane, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPane {
        window: window.to_string(),
        pane: index,
        reason: reason.to_string(),
    };
    let scope = format!("window `{}` pane {}", window, index);
    let kind = match (doc.kind.as_deref(), doc.subsession.is_some()) {
        (Some(kind), _) => kind,
        (None, true) => "subsession",
        (None, false) => "command",
    };
    match kind {
        "command" => {
            if doc.subsession.is_some() {
                return Err(invalid("command panes cannot name a subsession"));
            }
            let execute = match doc.execute.as_deref() {
                Some(raw) => parse_bool(&scope, "execute", raw)?,
                None => true,
            };
            let history = match doc.history.as_deref() {
                Some(raw) => parse_bool(&scope, "history", raw)?,
                None => true,
            };
            Ok(Pane::Command {
                cmd: doc.cmd.clone().unwrap_or_default(),
                execute,
                history,
            })
        }
        "subsession" => {
            let name = doc
                .subsession
                .clone()
                .ok_or_else(|| invalid("subsession panes need a `subsession` key"))?;
            if doc.execute.is_some() || doc.history.is_some() {
                return Err(invalid("`execute` and `history` belong on the subsession"));
            }
            Ok(Pane::Subsession {
                name,
                cmd: non_empty(doc.cmd.as_deref()),
            })
        }
        other => Err(invalid(&format!(
            "unknown type `{}` (expected `command` or `subsession`)",
            other
        ))),
    }
}

fn window_label(doc: &WindowDoc, index: usize) -> String {
    match doc.name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => format!("#{}", index + 1),
    }
}

/// tmux rewrites `.` and `:` in session names, after which `=name` targets
/// no longer match.
fn check_session_name(scope: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() || name.contains(['.', ':']) {
        return Err(ConfigError::InvalidValue {
            scope: scope.to_string(),
            field: "name".to_string(),
            value: name.to_string(),
            expected: "a non-empty name without `.` or `:`",
        });
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a YAML-style boolean.
///
/// ```
/// use muxwright::config::parse_bool;
///
/// assert_eq!(parse_bool("pane", "execute", "yes"), Ok(true));
/// assert_eq!(parse_bool("pane", "execute", "Off"), Ok(false));
/// assert!(parse_bool("pane", "execute", "maybe").is_err());
/// ```
pub fn parse_bool(scope: &str, field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            scope: scope.to_string(),
            field: field.to_string(),
            value: raw.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_delay(scope: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| ConfigError::InvalidValue {
            scope: scope.to_string(),
            field: "delay".to_string(),
            value: raw.to_string(),
            expected: "a non-negative number of seconds",
        })
}

fn parse_env(scope: &str, entry: &str) -> Result<(String, String), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        scope: scope.to_string(),
        field: "env".to_string(),
        value: entry.to_string(),
        expected: "KEY=VALUE",
    };
    let (key, value) = entry.split_once('=').ok_or_else(invalid)?;
    let key = key.trim();
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(invalid());
    }
    Ok((key.to_string(), value.to_string()))
}

/// Resolve a configured directory against the workspace file's directory.
pub fn resolve_dir(raw: &str, base_dir: &Path) -> PathBuf {
    if raw == "." {
        return base_dir.to_path_buf();
    }
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseMode, Parser};

    fn load(src: &str) -> Result<Config, ConfigError> {
        let doc = Parser::new(ParseMode::Strict).parse_str(src).unwrap().document;
        Config::from_document(&doc, Path::new("/work/demo"))
    }

    const VALID: &str = "\
name: demo
subsessions:
  api:
    dir: ./api
    command: cargo run
    delay: 0.5
    env:
      - PORT=8080
windows:
  - name: main
    panes:
      - type: command
        cmd: cargo test
      - type: subsession
        subsession: api
";

    #[test]
    fn test_valid_config() {
        let config = load(VALID).unwrap();
        assert_eq!(config.name, "demo");
        let api = config.subsession("api").unwrap();
        assert_eq!(api.dir, Some(PathBuf::from("/work/demo/./api")));
        assert_eq!(api.delay, Duration::from_millis(500));
        assert_eq!(api.env, vec![("PORT".to_string(), "8080".to_string())]);
        assert!(api.execute);
        assert!(!api.history);

        let main = config.window("main").unwrap();
        assert_eq!(main.dir, PathBuf::from("/work/demo"));
        assert_eq!(
            main.panes[0],
            Pane::Command {
                cmd: "cargo test".into(),
                execute: true,
                history: true
            }
        );
        assert_eq!(
            main.panes[1],
            Pane::Subsession {
                name: "api".into(),
                cmd: None
            }
        );
        assert_eq!(config.subsession_session("api"), "demo_api");
        assert_eq!(config.root_dir(), Path::new("/work/demo"));
    }

    #[test]
    fn test_missing_name() {
        let src = "windows:\n  - name: w\n    panes:\n      - cmd: ls\n";
        assert_eq!(load(src), Err(ConfigError::MissingName));
    }

    #[test]
    fn test_rejects_no_windows() {
        assert_eq!(load("name: demo\n"), Err(ConfigError::NoWindows));
    }

    #[test]
    fn test_rejects_empty_pane_list() {
        let err = load("name: demo\nwindows:\n  - name: main\n    panes:\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyWindow {
                window: "main".into()
            }
        );
    }

    #[test]
    fn test_rejects_dangling_subsession() {
        let src = "\
name: demo
windows:
  - name: main
    panes:
      - type: subsession
        subsession: ghost
";
        assert_eq!(
            load(src),
            Err(ConfigError::UnknownSubsession {
                window: "main".into(),
                pane: 1,
                subsession: "ghost".into()
            })
        );
    }

    #[test]
    fn test_rejects_subsession_without_dir() {
        let src = "\
name: demo
subsessions:
  api:
    command: run
windows:
  - name: main
    panes:
      - subsession: api
";
        assert!(matches!(
            load(src),
            Err(ConfigError::SubsessionWithoutDir { pane: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let src = VALID.replace("delay: 0.5", "delay: -1");
        assert!(matches!(load(&src), Err(ConfigError::InvalidValue { .. })));

        let src = VALID.replace("PORT=8080", "8080");
        assert!(matches!(load(&src), Err(ConfigError::InvalidValue { .. })));

        let src = VALID.replace("type: command", "type: shell");
        assert!(matches!(load(&src), Err(ConfigError::InvalidPane { pane: 1, .. })));
    }

    #[test]
    fn test_rejects_duplicate_window() {
        let src = "\
name: demo
windows:
  - name: main
    panes:
      - cmd: ls
  - name: main
    panes:
      - cmd: ls
";
        assert_eq!(
            load(src),
            Err(ConfigError::Duplicate {
                kind: "window",
                name: "main".into()
            })
        );
    }

    #[test]
    fn test_option_validation() {
        let src = format!("{}    options:\n      status-left: x\n", VALID);
        assert!(matches!(load(&src), Err(ConfigError::MisplacedOption { .. })));

        let src = format!("{}    options:\n      bogus-option: x\n", VALID);
        assert!(matches!(load(&src), Err(ConfigError::UnknownOption { .. })));

        let src = format!("{}    options:\n      synchronize-panes: on\n      @tag: x\n", VALID);
        let config = load(&src).unwrap();
        let opts = &config.windows[0].options;
        assert_eq!(opts.get("synchronize-panes").unwrap().kind, OptionKind::Window);
        assert_eq!(opts.get("@tag").unwrap().kind, OptionKind::Window);
    }

    #[test]
    fn test_resolve_dir() {
        let base = Path::new("/work");
        assert_eq!(resolve_dir("/abs", base), PathBuf::from("/abs"));
        assert_eq!(resolve_dir("rel", base), PathBuf::from("/work/rel"));
        assert_eq!(resolve_dir(".", base), PathBuf::from("/work"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_dir("~", base), home);
            assert_eq!(resolve_dir("~/src/api", base), home.join("src/api"));
        }
    }

    #[test]
    fn test_rejects_names_tmux_would_rewrite() {
        match load(&VALID.replace("name: demo", "name: my.app")) {
            Err(ConfigError::InvalidValue { scope, field, .. }) => {
                assert_eq!(scope, "workspace");
                assert_eq!(field, "name");
            }
            other => panic!("unexpected {:?}", other),
        }

        let src = VALID
            .replace("  api:", "  a:pi:")
            .replace("subsession: api", "subsession: a:pi");
        match load(&src) {
            Err(ConfigError::InvalidValue { scope, field, .. }) => {
                assert_eq!(scope, "subsession `a:pi`");
                assert_eq!(field, "name");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
