//! Display option cascade.
//!
//! The options applied to a session, window or subsession come from three
//! layers, highest first:
//!
//! 1. the scope's own `options:` overlay,
//! 2. options derived from the scope's color (and, for session-like scopes,
//!    the clock segment), only where layer 1 is silent,
//! 3. global defaults: `options.global` from the workspace file over the
//!    `[options]` table of `settings.toml`.
//!
//! Windows additionally inherit window and pane options from the session
//! overlay, between layers 2 and 3.

use crate::config::{Config, Overlay, Pane, Subsession, Window};
use crate::mux::{OptionTarget, WindowId};
use crate::options::{self, Lookup, OptionKind};
use crate::shell;

/// Which scope options are resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Session,
    Window(&'a str),
    Subsession(&'a str),
}

/// The layer an option value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Explicit,
    Color,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOption {
    pub name: String,
    pub value: String,
    pub kind: OptionKind,
    pub source: Source,
}

/// Options to apply to one scope, each name at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveOptions {
    options: Vec<ResolvedOption>,
}

impl EffectiveOptions {
    fn push(&mut self, name: &str, value: &str, kind: OptionKind, source: Source) {
        if self.get(name).is_none() {
            self.options.push(ResolvedOption {
                name: name.to_string(),
                value: value.to_string(),
                kind,
                source,
            });
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|o| o.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedOption> {
        self.options.iter()
    }
}

/// Resolves effective options for the scopes of one workspace.
#[derive(Debug, Clone)]
pub struct Cascade {
    global: Overlay,
    window_defaults: Overlay,
    clock: Option<String>,
}

impl Cascade {
    /// Build the default layers for `config`.
    ///
    /// `settings_defaults` is the `[options]` table from `settings.toml`.
    pub fn new(config: &Config, settings_defaults: &Overlay) -> Self {
        let global = config.global_options.layered_over(settings_defaults);
        let window_defaults =
            window_kinds(&config.session_options).layered_over(&window_kinds(&global));
        Self {
            global,
            window_defaults,
            clock: None,
        }
    }

    /// Status-bar clock segment, e.g. `#(/run/user/1000/muxwright/demo/clock.sh)`.
    pub fn with_clock(mut self, segment: impl Into<String>) -> Self {
        self.clock = Some(segment.into());
        self
    }

    /// Resolve options for `scope` from its explicit overlay and inherited
    /// color.
    pub fn resolve(
        &self,
        scope: Scope<'_>,
        explicit: &Overlay,
        color: Option<&str>,
    ) -> EffectiveOptions {
        let mut effective = EffectiveOptions::default();
        for entry in explicit.iter() {
            effective.push(&entry.name, &entry.value, entry.kind, Source::Explicit);
        }
        for (name, value) in sugar(scope, color, self.clock.as_deref()) {
            let kind = match options::lookup(name) {
                Lookup::Known(def) => def.kind,
                _ => OptionKind::Session,
            };
            effective.push(name, &value, kind, Source::Color);
        }
        let defaults = match scope {
            Scope::Window(_) => &self.window_defaults,
            Scope::Session | Scope::Subsession(_) => &self.global,
        };
        for entry in defaults.iter() {
            effective.push(&entry.name, &entry.value, entry.kind, Source::Default);
        }
        effective
    }

    pub fn session(&self, config: &Config) -> EffectiveOptions {
        self.resolve(Scope::Session, &config.session_options, config.color.as_deref())
    }

    pub fn window(&self, window: &Window) -> EffectiveOptions {
        self.resolve(Scope::Window(&window.name), &window.options, window.color.as_deref())
    }

    pub fn subsession(&self, config: &Config, sub: &Subsession) -> EffectiveOptions {
        let color = subsession_color(config, &sub.name);
        self.resolve(Scope::Subsession(&sub.name), &sub.options, color)
    }
}

/// One `set-option` to issue.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionCommand {
    pub target: OptionTarget,
    pub name: String,
    pub value: String,
}

impl OptionCommand {
    /// The equivalent line for a tmux configuration file.
    pub fn render(&self) -> String {
        let value = shell::quote(&self.value);
        match &self.target {
            OptionTarget::Server => format!("set-option -s {} {}", self.name, value),
            OptionTarget::Session(session) => {
                format!("set-option -t ={} {} {}", session, self.name, value)
            }
            OptionTarget::Window(window) => {
                format!("set-option -w -t {} {} {}", window, self.name, value)
            }
        }
    }
}

/// Turn effective options into commands against `session`.
///
/// Window and pane options go to `window`; without one they are dropped,
/// since the top-level session applies them through each window's own
/// resolution.
pub fn plan(
    effective: &EffectiveOptions,
    session: &str,
    window: Option<&WindowId>,
) -> Vec<OptionCommand> {
    effective
        .iter()
        .filter_map(|option| {
            let target = match option.kind {
                OptionKind::Server => OptionTarget::Server,
                OptionKind::Session => OptionTarget::Session(session.to_string()),
                OptionKind::Window | OptionKind::Pane => OptionTarget::Window(window?.clone()),
            };
            Some(OptionCommand {
                target,
                name: option.name.clone(),
                value: option.value.clone(),
            })
        })
        .collect()
}

fn window_kinds(overlay: &Overlay) -> Overlay {
    let pairs: Vec<(String, String)> = overlay
        .iter()
        .filter(|e| options::allowed_in_window(e.kind))
        .map(|e| (e.name.clone(), e.value.clone()))
        .collect();
    // Window kinds always pass window-scope validation.
    Overlay::from_pairs("window defaults", &pairs, true).unwrap_or_default()
}

/// Options implied by a color and, for session-like scopes, the clock.
fn sugar(
    scope: Scope<'_>,
    color: Option<&str>,
    clock: Option<&str>,
) -> Vec<(&'static str, String)> {
    match (scope, color) {
        (Scope::Window(_), Some(color)) => vec![
            ("window-status-style", format!("fg={}", color)),
            ("window-status-current-style", format!("bg={},fg=black,bold", color)),
            ("pane-active-border-style", format!("fg={}", color)),
        ],
        (Scope::Window(_), None) => Vec::new(),
        (_, Some(color)) => vec![
            ("status-style", format!("bg={},fg=black", color)),
            ("status-left", format!("#[bg={},fg=black,bold] #S #[default] ", color)),
            ("status-right", format!("#[fg=black] {} ", clock.unwrap_or("%H:%M"))),
        ],
        (_, None) => match clock {
            Some(clock) => vec![("status-right", format!(" {} ", clock))],
            None => Vec::new(),
        },
    }
}

/// Color a subsession is displayed with.
///
/// Its own `color` wins. Otherwise the first window (declaration order, then
/// pane order) with a pane attached to it lends its color; if that window
/// has none, neither does the subsession.
pub fn subsession_color<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
    if let Some(color) = config.subsession(name).and_then(|s| s.color.as_deref()) {
        return Some(color);
    }
    config
        .windows
        .iter()
        .find(|w| {
            w.panes
                .iter()
                .any(|p| matches!(p, Pane::Subsession { name: n, .. } if n == name))
        })
        .and_then(|w| w.color.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseMode, Parser};
    use std::path::Path;

    fn load(src: &str) -> Config {
        let doc = Parser::new(ParseMode::Strict).parse_str(src).unwrap().document;
        Config::from_document(&doc, Path::new("/w")).unwrap()
    }

    const SRC: &str = "\
name: demo
color: red
options:
  global:
    mouse: on
    status-style: bg=white
    pane-border-style: fg=grey
  session:
    status-left: custom
    synchronize-panes: off
subsessions:
  api:
    dir: ./api
  db:
    dir: ./db
    color: green
  worker:
    dir: ./worker
windows:
  - name: edit
    panes:
      - cmd: vim
      - subsession: worker
  - name: main
    color: blue
    options:
      pane-border-style: fg=white
    panes:
      - cmd: ls
      - subsession: api
      - subsession: db
  - name: more
    color: yellow
    panes:
      - subsession: api
";

    #[test]
    fn test_explicit_beats_color_beats_default() {
        let config = load(SRC);
        let cascade = Cascade::new(&config, &Overlay::default());
        let session = cascade.session(&config);

        let left = session.get("status-left").unwrap();
        assert_eq!((left.value.as_str(), left.source), ("custom", Source::Explicit));

        let style = session.get("status-style").unwrap();
        assert_eq!((style.value.as_str(), style.source), ("bg=red,fg=black", Source::Color));

        let mouse = session.get("mouse").unwrap();
        assert_eq!((mouse.value.as_str(), mouse.source), ("on", Source::Default));
    }

    #[test]
    fn test_window_scope() {
        let config = load(SRC);
        let cascade = Cascade::new(&config, &Overlay::default());
        let main = cascade.window(config.window("main").unwrap());
        assert_eq!(main.value("pane-border-style"), Some("fg=white"));
        assert_eq!(main.value("window-status-style"), Some("fg=blue"));
        assert_eq!(main.value("synchronize-panes"), Some("off"));
        assert_eq!(main.get("mouse"), None);
        assert_eq!(main.get("status-style"), None);

        let edit = cascade.window(config.window("edit").unwrap());
        assert_eq!(edit.value("pane-border-style"), Some("fg=grey"));
        assert_eq!(edit.get("window-status-style"), None);
    }

    #[test]
    fn test_subsession_color_inheritance() {
        let config = load(SRC);
        // First referencing window wins over later ones.
        assert_eq!(subsession_color(&config, "api"), Some("blue"));
        // Explicit color never inherits.
        assert_eq!(subsession_color(&config, "db"), Some("green"));
        // Referencing window has no color.
        assert_eq!(subsession_color(&config, "worker"), None);
        assert_eq!(subsession_color(&config, "ghost"), None);

        let cascade = Cascade::new(&config, &Overlay::default());
        let api = cascade.subsession(&config, config.subsession("api").unwrap());
        assert_eq!(api.value("status-style"), Some("bg=blue,fg=black"));
    }

    #[test]
    fn test_settings_defaults_are_lowest() {
        let config = load(SRC);
        let settings = Overlay::from_pairs(
            "settings",
            &vec![
                ("mouse".into(), "off".into()),
                ("history-limit".into(), "50000".into()),
            ],
            false,
        )
        .unwrap();
        let session = Cascade::new(&config, &settings).session(&config);
        assert_eq!(session.value("mouse"), Some("on"));
        assert_eq!(session.value("history-limit"), Some("50000"));
    }

    #[test]
    fn test_clock_segment() {
        let config = load(SRC);
        let cascade = Cascade::new(&config, &Overlay::default()).with_clock("#(/tmp/clock.sh)");
        let session = cascade.session(&config);
        assert_eq!(session.value("status-right"), Some("#[fg=black] #(/tmp/clock.sh) "));

        let mut plain = config.clone();
        plain.color = None;
        let session = cascade.session(&plain);
        assert_eq!(session.value("status-right"), Some(" #(/tmp/clock.sh) "));
    }

    #[test]
    fn test_plan_targets() {
        let config = load(SRC);
        let cascade = Cascade::new(&config, &Overlay::default());
        let session = cascade.session(&config);

        let commands = plan(&session, "demo", None);
        assert!(commands.iter().all(|c| c.target == OptionTarget::Session("demo".into())));
        assert!(!commands.iter().any(|c| c.name == "synchronize-panes"));

        let api = cascade.subsession(&config, config.subsession("api").unwrap());
        let window = WindowId::of_session("demo_api");
        let commands = plan(&api, "demo_api", Some(&window));
        let border = commands.iter().find(|c| c.name == "pane-border-style").unwrap();
        assert_eq!(border.target, OptionTarget::Window(window.clone()));
        assert_eq!(border.render(), "set-option -w -t =demo_api: pane-border-style fg=grey");
    }
}
