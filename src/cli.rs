//! Command-line interface for muxwright.
//!
//! Parses arguments using clap and provides the [`Cli`] struct containing
//! all user-specified options, plus [`Action`] for the positional verb.

use crate::error::{MuxwrightError, Result};
use crate::parser::ParseMode;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for muxwright.
///
/// # Examples
///
/// ```bash
/// # Build (or re-attach to) the `demo` workspace
/// muxwright demo
///
/// # Attach to the `api` subsession only
/// muxwright demo api
///
/// # Restart one subsession without touching the rest
/// muxwright demo restart api
///
/// # Install a `demo` command that runs `muxwright /path/to/demo.yml`
/// muxwright --register ./demo.yml
/// ```
#[derive(Parser, Debug)]
#[command(name = "muxwright")]
#[command(version)]
#[command(about = "Tmux workspace builder - sessions, windows and subsessions from a config file")]
#[command(long_about = "Muxwright builds a tmux session from a YAML-style workspace file.\n\n\
    Subsessions run long-lived commands in their own detached sessions and are\n\
    shown inside window panes, so they survive window and session rebuilds.\n\n\
    ACTION is one of: status, stop, kill, restart [TARGET], refresh, or the\n\
    name of a subsession to attach to. Without an action the workspace is\n\
    built if needed and attached.")]
pub struct Cli {
    /// Workspace file, or a name looked up in the workspaces directory.
    #[arg(value_name = "NAME", required_unless_present = "register")]
    pub workspace: Option<String>,

    /// What to do with the workspace.
    #[arg(value_name = "ACTION")]
    pub action: Option<String>,

    /// Subsession or workspace to restart.
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Do not attach a client; wait for delayed commands, then exit.
    #[arg(long)]
    pub headless: bool,

    /// Skip lines the parser does not understand instead of failing.
    #[arg(long)]
    pub lenient: bool,

    /// Print the tmux commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Answer yes to confirmation prompts.
    #[arg(short, long)]
    pub yes: bool,

    /// More logging (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Install an executable named after the workspace in FILE.
    #[arg(long, value_name = "FILE", conflicts_with = "workspace")]
    pub register: Option<PathBuf>,
}

/// The positional verb after the workspace name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Build if needed, then attach.
    Start,
    /// Start one subsession if needed, then attach to it.
    Subsession(String),
    Status,
    Stop,
    Kill,
    Restart(Option<String>),
    Refresh,
}

impl Cli {
    /// Interpret the positional arguments.
    ///
    /// Verbs take precedence over subsession names, so a subsession called
    /// `status` can only be reached through `restart`.
    pub fn action(&self) -> Result<Action> {
        let action = match self.action.as_deref() {
            None => Action::Start,
            Some("status") => Action::Status,
            Some("stop") => Action::Stop,
            Some("kill") => Action::Kill,
            Some("refresh") => Action::Refresh,
            Some("restart") => return Ok(Action::Restart(self.target.clone())),
            Some(name) => Action::Subsession(name.to_string()),
        };
        match &self.target {
            Some(target) => Err(MuxwrightError::Usage(format!(
                "unexpected argument `{}`; only `restart` takes a target",
                target
            ))),
            None => Ok(action),
        }
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.lenient {
            ParseMode::Lenient
        } else {
            ParseMode::Strict
        }
    }

    /// Default log filter for the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
