//! Settings discovery and workspace loading.
//!
//! The settings directory is searched in this order:
//!
//! 1. `$XDG_CONFIG_HOME/muxwright/`
//! 2. `~/.config/muxwright/`
//!
//! A workspace argument is either a path to an existing file or a name
//! looked up as `<workspaces dir>/<name>.yml`, then `.yaml`.

use crate::config::Config;
use crate::error::{MuxwrightError, Result};
use crate::parser::{ParseMode, Parser, Skipped};
use crate::settings::Settings;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "muxwright";
const SETTINGS_FILE: &str = "settings.toml";
const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Determine the settings directory.
///
/// Prefers `$XDG_CONFIG_HOME/muxwright` when set and present, otherwise
/// `~/.config/muxwright`, whether or not it exists yet.
///
/// # Errors
///
/// Returns [`MuxwrightError::NoConfigDir`] if the home directory cannot be
/// determined.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg).join(APP_DIR);
        if path.is_dir() {
            return Ok(path);
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_DIR))
        .ok_or(MuxwrightError::NoConfigDir)
}

/// Load `settings.toml` from `dir`; a missing file gives the defaults.
pub fn load_settings(dir: &Path) -> Result<Settings> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        log::debug!("no settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    Settings::from_str(&contents)
}

/// Find the workspace file for a command-line argument.
pub fn resolve_workspace(arg: &str, workspaces_dir: &Path) -> Result<PathBuf> {
    let direct = Path::new(arg);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    EXTENSIONS
        .iter()
        .map(|ext| workspaces_dir.join(format!("{}.{}", arg, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| MuxwrightError::WorkspaceNotFound(arg.to_string()))
}

/// A validated workspace and the lines lenient parsing skipped.
#[derive(Debug)]
pub struct Loaded {
    pub path: PathBuf,
    pub config: Config,
    pub skipped: Vec<Skipped>,
}

/// Parse and validate a workspace file.
///
/// Relative directories in the file resolve against the file's own
/// directory.
pub fn load_workspace(path: &Path, mode: ParseMode) -> Result<Loaded> {
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let parsed = Parser::new(mode).parse_file(&path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let config = Config::from_document(&parsed.document, &base_dir)?;
    Ok(Loaded {
        path,
        config,
        skipped: parsed.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    const DEMO: &str = concat!(
        "name: demo\nwindows:\n",
        "  - name: main\n    dir: src\n    panes:\n      - cmd: ls\n",
    );

    #[test]
    fn test_missing_settings_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "tmux = \"tmux-next\"\n").unwrap();
        assert_eq!(load_settings(dir.path()).unwrap().tmux, "tmux-next");
    }

    #[test]
    fn test_resolve_by_name_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("demo.yaml");
        std::fs::write(&yaml, DEMO).unwrap();
        assert_eq!(resolve_workspace("demo", dir.path()).unwrap(), yaml);

        let yml = dir.path().join("demo.yml");
        std::fs::write(&yml, DEMO).unwrap();
        assert_eq!(resolve_workspace("demo", dir.path()).unwrap(), yml);

        let arg = yaml.to_string_lossy().to_string();
        assert_eq!(resolve_workspace(&arg, Path::new("/nowhere")).unwrap(), yaml);

        assert!(matches!(
            resolve_workspace("other", dir.path()),
            Err(MuxwrightError::WorkspaceNotFound(name)) if name == "other"
        ));
    }

    #[test]
    fn test_load_resolves_dirs_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.yml");
        std::fs::write(&path, DEMO).unwrap();
        let loaded = load_workspace(&path, ParseMode::Strict).unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(loaded.config.base_dir, root);
        assert_eq!(loaded.config.windows[0].dir, root.join("src"));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "name: demo\nbogus line\n").unwrap();
        assert!(matches!(
            load_workspace(&path, ParseMode::Strict),
            Err(MuxwrightError::Parse(ParseError::Unexpected { line: 2, .. }))
        ));
        assert!(matches!(
            load_workspace(&dir.path().join("absent.yml"), ParseMode::Strict),
            Err(MuxwrightError::Parse(ParseError::Io { .. }))
        ));
    }
}
