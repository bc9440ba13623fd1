//! Line-oriented parser for the workspace file format.
//!
//! The format is a small YAML subset with fixed two-space indentation. Each
//! line is classified by its indentation level and the section/block it
//! appears in; there is no general nesting. See [`crate::document`] for an
//! example file.
//!
//! | level | meaning                                                          |
//! |-------|------------------------------------------------------------------|
//! | 0     | top-level scalars, `subsessions:`, `windows:`, `options:`        |
//! | 2     | `<subsession>:`, `- <window key>: ...`, `global:` / `session:`   |
//! | 4     | subsession/window properties, `env:`, `options:`, `panes:`, pairs |
//! | 6     | `- <pane key>: ...`, env entries, option pairs                    |
//! | 8     | pane properties                                                  |
//!
//! A window or pane entry opens with `- key: value` or a bare `-`.
//!
//! In [`ParseMode::Strict`] any line that fits none of these transitions is
//! an error. [`ParseMode::Lenient`] skips such lines and reports them in
//! [`Parsed::skipped`].

use crate::document::{Document, PaneDoc, SubsessionDoc, WindowDoc};
use crate::error::ParseError;
use std::path::Path;

/// How to treat lines that match no transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    Strict,
    Lenient,
}

/// A line ignored in lenient mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

/// Parser output.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub document: Document,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Subsessions,
    Windows,
    Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Subsession,
    SubsessionEnv,
    SubsessionOptions,
    Window,
    WindowOptions,
    Panes,
    Pane,
    GlobalOptions,
    SessionOptions,
}

/// One classified line: `key: value`, `key:` or `- rest`.
#[derive(Debug, PartialEq)]
enum Entry<'a> {
    Pair(&'a str, String),
    Open(&'a str),
    Item(&'a str),
}

/// Single-use parser. Each call to [`Parser::parse_str`] starts from a fresh
/// state.
#[derive(Debug)]
pub struct Parser {
    mode: ParseMode,
    section: Section,
    block: Block,
    document: Document,
    skipped: Vec<Skipped>,
}

impl Parser {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            section: Section::Root,
            block: Block::None,
            document: Document::default(),
            skipped: Vec::new(),
        }
    }

    /// Read and parse a workspace file.
    ///
    /// # Errors
    ///
    /// [`ParseError::Io`] if the file cannot be read, otherwise as
    /// [`Parser::parse_str`].
    pub fn parse_file(self, path: &Path) -> Result<Parsed, ParseError> {
        let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&source)
    }

    /// Parse workspace source text.
    pub fn parse_str(mut self, source: &str) -> Result<Parsed, ParseError> {
        for (index, raw) in source.lines().enumerate() {
            let number = index + 1;
            let stripped = strip_comment(raw);
            if stripped.trim().is_empty() {
                continue;
            }
            let text = stripped.trim();
            let result =
                indentation(stripped, number).and_then(|indent| self.line(number, indent, text));
            if let Err(err) = result {
                match (self.mode, err) {
                    (ParseMode::Lenient, ParseError::Unexpected { line, content, context }) => {
                        log::warn!("skipping line {}: `{}` {}", line, content, context);
                        self.skipped.push(Skipped {
                            line,
                            content,
                            reason: context,
                        });
                    }
                    (ParseMode::Lenient, ParseError::DuplicateKey { line, key }) => {
                        log::warn!("line {}: duplicate key `{}` ignored", line, key);
                        self.skipped.push(Skipped {
                            line,
                            content: text.to_string(),
                            reason: format!("duplicate key `{}`", key),
                        });
                    }
                    (ParseMode::Lenient, ParseError::OddIndent { line, indent }) => {
                        log::warn!("skipping line {}: indentation of {}", line, indent);
                        self.skipped.push(Skipped {
                            line,
                            content: text.to_string(),
                            reason: format!("indentation of {} is not a multiple of 2", indent),
                        });
                    }
                    (ParseMode::Lenient, ParseError::UnterminatedQuote { line }) => {
                        log::warn!("skipping line {}: unterminated quote", line);
                        self.skipped.push(Skipped {
                            line,
                            content: text.to_string(),
                            reason: "unterminated quote".to_string(),
                        });
                    }
                    (_, err) => return Err(err),
                }
            }
        }
        Ok(Parsed {
            document: self.document,
            skipped: self.skipped,
        })
    }

    fn line(&mut self, number: usize, indent: usize, text: &str) -> Result<(), ParseError> {
        let entry = classify(text, number)?;
        let unexpected = |context: &str| ParseError::Unexpected {
            line: number,
            content: text.to_string(),
            context: context.to_string(),
        };

        match indent {
            0 => {
                self.section = Section::Root;
                self.block = Block::None;
                match entry {
                    Entry::Open("subsessions") => self.section = Section::Subsessions,
                    Entry::Open("windows") => self.section = Section::Windows,
                    Entry::Open("options") => self.section = Section::Options,
                    Entry::Pair(key, value) => {
                        let doc = &mut self.document;
                        let slot = match key {
                            "name" => &mut doc.name,
                            "timezone" => &mut doc.timezone,
                            "show_utc" => &mut doc.show_utc,
                            "color" => &mut doc.color,
                            _ => return Err(unexpected("at top level")),
                        };
                        set_once(slot, value, number, key)?;
                    }
                    _ => return Err(unexpected("at top level")),
                }
            }
            2 => match (self.section, entry) {
                (Section::Subsessions, Entry::Open(name)) => {
                    if self.document.subsessions.iter().any(|s| s.name == name) {
                        return Err(ParseError::DuplicateKey {
                            line: number,
                            key: name.to_string(),
                        });
                    }
                    self.document.subsessions.push(SubsessionDoc {
                        name: name.to_string(),
                        ..Default::default()
                    });
                    self.block = Block::Subsession;
                }
                (Section::Windows, Entry::Item(rest)) => {
                    self.document.windows.push(WindowDoc::default());
                    self.block = Block::Window;
                    if !rest.is_empty() {
                        self.window_property(rest, number)
                            .map_err(|_| unexpected("as the first key of a window"))?;
                    }
                }
                (Section::Options, Entry::Open("global")) => self.block = Block::GlobalOptions,
                (Section::Options, Entry::Open("session")) => self.block = Block::SessionOptions,
                _ => return Err(unexpected("at indentation 2")),
            },
            4 => match (self.block, entry) {
                (Block::Subsession | Block::SubsessionEnv | Block::SubsessionOptions, entry) => {
                    self.block = Block::Subsession;
                    match entry {
                        Entry::Open("env") => self.block = Block::SubsessionEnv,
                        Entry::Open("options") => self.block = Block::SubsessionOptions,
                        Entry::Pair(key, value) => {
                            let Some(sub) = self.document.subsessions.last_mut() else {
                                return Err(unexpected("outside a subsession"));
                            };
                            let slot = match key {
                                "dir" => &mut sub.dir,
                                "command" | "cmd" => &mut sub.command,
                                "delay" => &mut sub.delay,
                                "execute" => &mut sub.execute,
                                "history" => &mut sub.history,
                                "color" => &mut sub.color,
                                _ => return Err(unexpected("in a subsession")),
                            };
                            set_once(slot, value, number, key)?;
                        }
                        _ => return Err(unexpected("in a subsession")),
                    }
                }
                (
                    Block::Window | Block::WindowOptions | Block::Panes | Block::Pane,
                    entry,
                ) => {
                    self.block = Block::Window;
                    match entry {
                        Entry::Open("panes") => self.block = Block::Panes,
                        Entry::Open("options") => self.block = Block::WindowOptions,
                        Entry::Pair(..) => self.window_property(text, number)?,
                        _ => return Err(unexpected("in a window")),
                    }
                }
                (Block::GlobalOptions, Entry::Pair(key, value)) => {
                    push_pair(&mut self.document.global_options, key, value, number)?;
                }
                (Block::SessionOptions, Entry::Pair(key, value)) => {
                    push_pair(&mut self.document.session_options, key, value, number)?;
                }
                _ => return Err(unexpected("at indentation 4")),
            },
            6 => match (self.block, entry) {
                (Block::SubsessionEnv, Entry::Item(rest)) => {
                    if let Some(sub) = self.document.subsessions.last_mut() {
                        sub.env.push(unquote(rest, number)?);
                    }
                }
                (Block::SubsessionEnv, Entry::Pair(key, value)) => {
                    if let Some(sub) = self.document.subsessions.last_mut() {
                        sub.env.push(format!("{}={}", key, value));
                    }
                }
                (Block::SubsessionOptions, Entry::Pair(key, value)) => {
                    if let Some(sub) = self.document.subsessions.last_mut() {
                        push_pair(&mut sub.options, key, value, number)?;
                    }
                }
                (Block::WindowOptions, Entry::Pair(key, value)) => {
                    if let Some(window) = self.document.windows.last_mut() {
                        push_pair(&mut window.options, key, value, number)?;
                    }
                }
                (Block::Panes | Block::Pane, Entry::Item(rest)) => {
                    let Some(window) = self.document.windows.last_mut() else {
                        return Err(unexpected("outside a window"));
                    };
                    window.panes.push(PaneDoc::default());
                    self.block = Block::Pane;
                    if !rest.is_empty() {
                        self.pane_property(rest, number)
                            .map_err(|_| unexpected("as the first key of a pane"))?;
                    }
                }
                _ => return Err(unexpected("at indentation 6")),
            },
            8 => match (self.block, entry) {
                (Block::Pane, Entry::Pair(..)) => self.pane_property(text, number)?,
                _ => return Err(unexpected("at indentation 8")),
            },
            _ => return Err(unexpected("at an unsupported indentation")),
        }
        Ok(())
    }

    fn window_property(&mut self, text: &str, number: usize) -> Result<(), ParseError> {
        let unexpected = || ParseError::Unexpected {
            line: number,
            content: text.to_string(),
            context: "in a window".to_string(),
        };
        let Entry::Pair(key, value) = classify(text, number)? else {
            return Err(unexpected());
        };
        let window = self.document.windows.last_mut().ok_or_else(unexpected)?;
        let slot = match key {
            "name" => &mut window.name,
            "dir" => &mut window.dir,
            "color" => &mut window.color,
            _ => return Err(unexpected()),
        };
        set_once(slot, value, number, key)
    }

    fn pane_property(&mut self, text: &str, number: usize) -> Result<(), ParseError> {
        let unexpected = || ParseError::Unexpected {
            line: number,
            content: text.to_string(),
            context: "in a pane".to_string(),
        };
        let Entry::Pair(key, value) = classify(text, number)? else {
            return Err(unexpected());
        };
        let pane = self
            .document
            .windows
            .last_mut()
            .and_then(|w| w.panes.last_mut())
            .ok_or_else(unexpected)?;
        let slot = match key {
            "type" => &mut pane.kind,
            "cmd" | "command" => &mut pane.cmd,
            "execute" => &mut pane.execute,
            "history" => &mut pane.history,
            "subsession" => &mut pane.subsession,
            _ => return Err(unexpected()),
        };
        set_once(slot, value, number, key)
    }
}

fn set_once(
    slot: &mut Option<String>,
    value: String,
    line: usize,
    key: &str,
) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateKey {
            line,
            key: key.to_string(),
        });
    }
    *slot = Some(value);
    Ok(())
}

fn push_pair(
    pairs: &mut Vec<(String, String)>,
    key: &str,
    value: String,
    line: usize,
) -> Result<(), ParseError> {
    if pairs.iter().any(|(k, _)| k == key) {
        return Err(ParseError::DuplicateKey {
            line,
            key: key.to_string(),
        });
    }
    pairs.push((key.to_string(), value));
    Ok(())
}

/// Count leading spaces, rejecting tabs and odd indentation.
fn indentation(line: &str, number: usize) -> Result<usize, ParseError> {
    let mut indent = 0;
    for ch in line.chars() {
        match ch {
            ' ' => indent += 1,
            '\t' => return Err(ParseError::TabIndent { line: number }),
            _ => break,
        }
    }
    if indent % 2 != 0 {
        return Err(ParseError::OddIndent {
            line: number,
            indent,
        });
    }
    Ok(indent)
}

fn classify(text: &str, number: usize) -> Result<Entry<'_>, ParseError> {
    if text == "-" {
        return Ok(Entry::Item(""));
    }
    if let Some(rest) = text.strip_prefix("- ") {
        return Ok(Entry::Item(rest.trim()));
    }
    let Some((key, raw)) = split_key(text) else {
        return Err(ParseError::Unexpected {
            line: number,
            content: text.to_string(),
            context: "(expected `key: value`)".to_string(),
        });
    };
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(Entry::Open(key))
    } else {
        Ok(Entry::Pair(key, unquote(raw, number)?))
    }
}

/// Split at the first `:` that ends the line or is followed by a space.
fn split_key(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') {
            let key = text[..i].trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            return Some((key, &text[i + 1..]));
        }
    }
    None
}

/// Remove a trailing comment.
///
/// A `#` starts a comment at the start of the line or after whitespace,
/// unless it sits inside a quoted token. Quotes only open at the start of a
/// token, so apostrophes inside words (`don't`) are plain characters.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if ch == '\\' => escaped = true,
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => {
                let at_token_start = prev.is_none_or(|p| p.is_whitespace() || p == ':');
                if (ch == '"' || ch == '\'') && at_token_start {
                    quote = Some(ch);
                } else if ch == '#' && prev.is_none_or(char::is_whitespace) {
                    return &line[..i];
                }
            }
        }
        prev = Some(ch);
    }
    line
}

/// Strip surrounding quotes from a value and process escapes.
///
/// Double-quoted values understand `\"`, `\\`, `\n` and `\t`; single-quoted
/// values are literal apart from `''` standing for one quote.
fn unquote(raw: &str, number: usize) -> Result<String, ParseError> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match chars.next() {
        Some('"') => {
            let mut out = String::new();
            let mut escaped = false;
            for (i, ch) in raw.char_indices().skip(1) {
                if escaped {
                    out.push(match ch {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    if raw[i + 1..].trim().is_empty() {
                        return Ok(out);
                    }
                    return Err(ParseError::Unexpected {
                        line: number,
                        content: raw.to_string(),
                        context: "(text after closing quote)".to_string(),
                    });
                } else {
                    out.push(ch);
                }
            }
            Err(ParseError::UnterminatedQuote { line: number })
        }
        Some('\'') => {
            let body = &raw[1..];
            let mut out = String::new();
            let mut iter = body.char_indices().peekable();
            while let Some((i, ch)) = iter.next() {
                if ch == '\'' {
                    if let Some((_, '\'')) = iter.peek() {
                        out.push('\'');
                        iter.next();
                        continue;
                    }
                    if body[i + 1..].trim().is_empty() {
                        return Ok(out);
                    }
                    return Err(ParseError::Unexpected {
                        line: number,
                        content: raw.to_string(),
                        context: "(text after closing quote)".to_string(),
                    });
                }
                out.push(ch);
            }
            Err(ParseError::UnterminatedQuote { line: number })
        }
        _ => Ok(raw.to_string()),
    }
}
