//! The parsed, not yet validated, workspace document.
//!
//! A [`Document`] mirrors the file one-to-one: every value is kept as the
//! string that appeared in the file so that [`Document::render`] can write it
//! back unchanged. Typing and validation happen in [`crate::config`].
//!
//! # Format
//!
//! ```yaml
//! name: demo
//! color: colour39
//! timezone: Europe/Berlin
//! show_utc: true
//!
//! options:
//!   global:
//!     mouse: on
//!   session:
//!     status-position: top
//!
//! subsessions:
//!   api:
//!     dir: ./api
//!     command: cargo run
//!     delay: 2
//!     env:
//!       - RUST_LOG=debug
//!
//! windows:
//!   - name: main
//!     dir: .
//!     panes:
//!       - type: command
//!         cmd: cargo test
//!       - type: subsession
//!         subsession: api
//! ```

use std::fmt::Write as _;

/// An ordered list of `option-name: value` pairs.
pub type Pairs = Vec<(String, String)>;

/// Root of a parsed workspace file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub show_utc: Option<String>,
    /// Legacy single color for the top-level session.
    pub color: Option<String>,
    /// `options.global` overlay.
    pub global_options: Pairs,
    /// `options.session` overlay.
    pub session_options: Pairs,
    pub subsessions: Vec<SubsessionDoc>,
    pub windows: Vec<WindowDoc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsessionDoc {
    pub name: String,
    pub dir: Option<String>,
    pub command: Option<String>,
    pub delay: Option<String>,
    pub execute: Option<String>,
    pub history: Option<String>,
    pub color: Option<String>,
    /// Raw `KEY=VALUE` entries in file order.
    pub env: Vec<String>,
    pub options: Pairs,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDoc {
    pub name: Option<String>,
    pub dir: Option<String>,
    pub color: Option<String>,
    pub options: Pairs,
    pub panes: Vec<PaneDoc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneDoc {
    /// The `type` key: `command` or `subsession`.
    pub kind: Option<String>,
    pub cmd: Option<String>,
    pub execute: Option<String>,
    pub history: Option<String>,
    pub subsession: Option<String>,
}

impl Document {
    /// Serialize back into the workspace file format.
    ///
    /// Parsing the output yields a document equal to `self`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        scalar(&mut out, 0, "name", self.name.as_deref());
        scalar(&mut out, 0, "timezone", self.timezone.as_deref());
        scalar(&mut out, 0, "show_utc", self.show_utc.as_deref());
        scalar(&mut out, 0, "color", self.color.as_deref());

        if !self.global_options.is_empty() || !self.session_options.is_empty() {
            out.push_str("options:\n");
            if !self.global_options.is_empty() {
                out.push_str("  global:\n");
                pairs(&mut out, 4, &self.global_options);
            }
            if !self.session_options.is_empty() {
                out.push_str("  session:\n");
                pairs(&mut out, 4, &self.session_options);
            }
        }

        if !self.subsessions.is_empty() {
            out.push_str("subsessions:\n");
            for sub in &self.subsessions {
                let _ = writeln!(out, "  {}:", sub.name);
                scalar(&mut out, 4, "dir", sub.dir.as_deref());
                scalar(&mut out, 4, "command", sub.command.as_deref());
                scalar(&mut out, 4, "delay", sub.delay.as_deref());
                scalar(&mut out, 4, "execute", sub.execute.as_deref());
                scalar(&mut out, 4, "history", sub.history.as_deref());
                scalar(&mut out, 4, "color", sub.color.as_deref());
                if !sub.env.is_empty() {
                    out.push_str("    env:\n");
                    for entry in &sub.env {
                        let _ = writeln!(out, "      - {}", quote(entry));
                    }
                }
                if !sub.options.is_empty() {
                    out.push_str("    options:\n");
                    pairs(&mut out, 6, &sub.options);
                }
            }
        }

        if !self.windows.is_empty() {
            out.push_str("windows:\n");
            for window in &self.windows {
                let mut fields = Vec::new();
                field(&mut fields, "name", window.name.as_deref());
                field(&mut fields, "dir", window.dir.as_deref());
                field(&mut fields, "color", window.color.as_deref());
                list_entry(&mut out, 2, &fields);
                if !window.options.is_empty() {
                    out.push_str("    options:\n");
                    pairs(&mut out, 6, &window.options);
                }
                if !window.panes.is_empty() {
                    out.push_str("    panes:\n");
                    for pane in &window.panes {
                        let mut fields = Vec::new();
                        field(&mut fields, "type", pane.kind.as_deref());
                        field(&mut fields, "cmd", pane.cmd.as_deref());
                        field(&mut fields, "execute", pane.execute.as_deref());
                        field(&mut fields, "history", pane.history.as_deref());
                        field(&mut fields, "subsession", pane.subsession.as_deref());
                        list_entry(&mut out, 6, &fields);
                    }
                }
            }
        }
        out
    }
}

fn scalar(out: &mut String, indent: usize, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(out, "{:indent$}{}: {}", "", key, quote(value));
    }
}

fn pairs(out: &mut String, indent: usize, pairs: &Pairs) {
    for (key, value) in pairs {
        let _ = writeln!(out, "{:indent$}{}: {}", "", key, quote(value));
    }
}

fn field<'a>(fields: &mut Vec<(&'static str, &'a str)>, key: &'static str, value: Option<&'a str>) {
    if let Some(value) = value {
        fields.push((key, value));
    }
}

fn list_entry(out: &mut String, indent: usize, fields: &[(&str, &str)]) {
    match fields.split_first() {
        Some(((key, value), rest)) => {
            let _ = writeln!(out, "{:indent$}- {}: {}", "", key, quote(value));
            for (key, value) in rest {
                let _ = writeln!(out, "{:width$}{}: {}", "", key, quote(value), width = indent + 2);
            }
        }
        None => {
            let _ = writeln!(out, "{:indent$}-", "");
        }
    }
}

/// Quote a value if reading it back plain would change it.
///
/// ```
/// use muxwright::document::quote;
///
/// assert_eq!(quote("cargo run"), "cargo run");
/// assert_eq!(quote("echo hi # not a comment"), "\"echo hi # not a comment\"");
/// assert_eq!(quote(""), "\"\"");
/// ```
pub fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.starts_with(['"', '\'', '-', '#'])
        || value.contains(" #")
        || value.contains(['\n', '\t', '\\']);
    if !needs_quotes {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
