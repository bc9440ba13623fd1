//! # Muxwright
//!
//! A tmux workspace builder that creates sessions, windows, panes and
//! long-lived subsessions from a YAML-style workspace file.
//!
//! Muxwright rebuilds a development layout with one command. Long-running
//! processes live in *subsessions*, detached tmux sessions of their own that
//! windows display by nesting a client in a pane, so closing a window or
//! rebuilding the workspace never kills them.
//!
//! ## Features
//!
//! - **Windows**: named windows with 1 to N panes laid out by count
//! - **Subsessions**: background sessions with env, delayed start and restart
//! - **Colors**: one color per session, window or subsession, expanded into
//!   status bar and border styles
//! - **Options**: any tmux option at global, session, window or subsession
//!   scope, checked against a registry of known options
//!
//! ## Quick Example
//!
//! ```yaml
//! # ~/.config/muxwright/workspaces/demo.yml
//! name: demo
//! color: blue
//! subsessions:
//!   api:
//!     dir: ./api
//!     command: cargo run
//!     env:
//!       RUST_LOG: debug
//! windows:
//!   - name: main
//!     panes:
//!       - cmd: vim
//!       - subsession: api
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into these modules:
//!
//! - [`parser`] and [`document`]: workspace file syntax to a typed tree
//! - [`config`]: validation into the workspace model
//! - [`options`]: registry of tmux option names and scopes
//! - [`cascade`]: effective options per scope
//! - [`mux`]: the multiplexer trait, with [`tmux`] and [`memory`] backends
//! - [`layout`]: pane split plans by count
//! - [`subsession`]: subsession lifecycle
//! - [`orchestrator`]: the build state machine and workspace commands
//! - [`poll`] and [`dispatch`]: readiness polling and delayed commands
//! - [`cli`], [`loader`], [`settings`], [`register`], [`runtime`],
//!   [`prompt`], [`shell`]: the command-line surface
//! - [`error`]: Error types

pub mod cascade;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod layout;
pub mod loader;
pub mod memory;
pub mod mux;
pub mod options;
pub mod orchestrator;
pub mod parser;
pub mod poll;
pub mod prompt;
pub mod register;
pub mod runtime;
pub mod settings;
pub mod shell;
pub mod subsession;
pub mod tmux;

pub use config::{Config, Pane, Subsession, Window};
pub use error::{ConfigError, MuxError, MuxwrightError, ParseError, Result};
pub use orchestrator::Orchestrator;
