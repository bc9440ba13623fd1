//! Error types for muxwright.
//!
//! Failures fall into four groups:
//!
//! - [`ParseError`] and [`ConfigError`]: the workspace file is unreadable or
//!   invalid. Always fatal, always reported before tmux is touched.
//! - Environment errors ([`MuxwrightError::TmuxNotFound`],
//!   [`MuxwrightError::UnsupportedVersion`]): fatal at startup.
//! - [`MuxError`]: a single tmux command failed. The orchestrator logs these
//!   and keeps building; they only become fatal in the auxiliary commands.
//! - A declined confirmation is not an error at all.

use std::path::PathBuf;
use thiserror::Error;

/// A line of the workspace file could not be parsed.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The workspace file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Indentation used a tab character.
    #[error("line {line}: tabs are not allowed in indentation")]
    TabIndent { line: usize },

    /// Indentation was not a multiple of two spaces.
    #[error("line {line}: indentation of {indent} is not a multiple of 2")]
    OddIndent { line: usize, indent: usize },

    /// A quoted value was never closed.
    #[error("line {line}: unterminated quote")]
    UnterminatedQuote { line: usize },

    /// The line matched no transition for its indentation and section.
    #[error("line {line}: unexpected `{content}` {context}")]
    Unexpected {
        line: usize,
        content: String,
        context: String,
    },

    /// The same key appeared twice in one block.
    #[error("line {line}: duplicate key `{key}`")]
    DuplicateKey { line: usize, key: String },
}

/// The parsed document does not describe a usable workspace.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required field `name`")]
    MissingName,

    #[error("no windows defined")]
    NoWindows,

    #[error("window `{window}` has no panes")]
    EmptyWindow { window: String },

    #[error("window `{window}` pane {pane}: unknown subsession `{subsession}`")]
    UnknownSubsession {
        window: String,
        pane: usize,
        subsession: String,
    },

    #[error("window `{window}` pane {pane}: subsession `{subsession}` has no `dir`")]
    SubsessionWithoutDir {
        window: String,
        pane: usize,
        subsession: String,
    },

    #[error("window `{window}` pane {pane}: {reason}")]
    InvalidPane {
        window: String,
        pane: usize,
        reason: String,
    },

    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    #[error("{scope}: `{field}` has invalid value `{value}` ({expected})")]
    InvalidValue {
        scope: String,
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("{scope}: unknown option `{option}`")]
    UnknownOption { scope: String, option: String },

    #[error("{scope}: option `{option}` cannot be set at this scope")]
    MisplacedOption { scope: String, option: String },
}

/// A tmux command failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MuxError {
    /// The tmux binary could not be spawned.
    #[error("failed to run tmux: {0}")]
    Spawn(String),

    /// tmux ran and reported failure.
    #[error("tmux {command} failed: {message}")]
    Command { command: String, message: String },

    /// tmux output could not be interpreted.
    #[error("unexpected tmux output for {command}: {output}")]
    Output { command: String, output: String },

    /// The target session, window or pane does not exist.
    #[error("{0} does not exist")]
    Missing(String),
}

/// All errors that reach the command line.
#[derive(Error, Debug)]
pub enum MuxwrightError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Tmux error: {0}")]
    Mux(#[from] MuxError),

    /// Workspace name did not resolve to a file.
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// Named subsession or restart target is not in the config.
    #[error("No such subsession or target: {0}")]
    TargetNotFound(String),

    /// Subsession directory does not exist on disk.
    #[error("Directory for subsession `{name}` does not exist: {dir}")]
    MissingDir { name: String, dir: PathBuf },

    /// The tmux binary is not installed or not on PATH.
    #[error("tmux not found ({0}); install tmux or set `tmux` in settings.toml")]
    TmuxNotFound(String),

    /// The installed tmux is older than the minimum supported version.
    #[error("tmux {found} is not supported; version {required} or newer is required")]
    UnsupportedVersion { found: String, required: String },

    /// Could not determine the user's config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Tool settings file is malformed.
    #[error("Failed to parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// Positional arguments that do not form a command.
    #[error("{0}")]
    Usage(String),

    /// A file that muxwright did not write is in the way of a wrapper.
    #[error("Refusing to overwrite {0}: not a muxwright wrapper")]
    WrapperExists(PathBuf),

    /// The workspace name cannot be used as a file name.
    #[error("Cannot register `{0}`: name must not contain `/` or start with `.`")]
    InvalidWrapperName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias for muxwright operations.
pub type Result<T> = std::result::Result<T, MuxwrightError>;
