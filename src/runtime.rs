//! Per-workspace runtime files.
//!
//! Lives in `<runtime dir>/muxwright/<name>/`:
//!
//! - `clock.sh`, run by the status bar to show local (and UTC) time;
//! - `tmux.conf`, the option commands last applied, for inspection or
//!   `tmux source-file`.
//!
//! Both are rewritten on start and refresh and removed on stop and kill.

use crate::cascade::OptionCommand;
use crate::config::Config;
use crate::error::{MuxwrightError, Result};
use crate::shell;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "muxwright";
const CLOCK_SCRIPT: &str = "clock.sh";
const STARTUP_CONF: &str = "tmux.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFiles {
    dir: PathBuf,
}

impl RuntimeFiles {
    /// Runtime files for workspace `name` in the user's runtime directory,
    /// falling back to the cache directory.
    pub fn for_workspace(name: &str) -> Result<Self> {
        let base = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .ok_or(MuxwrightError::NoConfigDir)?;
        Ok(Self::at(base.join(APP_DIR).join(name)))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn clock_path(&self) -> PathBuf {
        self.dir.join(CLOCK_SCRIPT)
    }

    pub fn conf_path(&self) -> PathBuf {
        self.dir.join(STARTUP_CONF)
    }

    /// Status-bar segment that runs the clock script.
    pub fn clock_segment(&self) -> String {
        format!("#({})", shell::quote(&self.clock_path().to_string_lossy()))
    }

    /// Write `clock.sh` if the workspace shows a clock.
    pub fn write_clock(&self, config: &Config) -> io::Result<Option<PathBuf>> {
        if !config.wants_clock() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.clock_path();
        std::fs::write(&path, clock_script(config))?;
        make_executable(&path)?;
        Ok(Some(path))
    }

    /// Write `tmux.conf` from the applied option commands.
    pub fn write_conf(&self, config: &Config, commands: &[OptionCommand]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let mut out = format!("# Options applied by muxwright for workspace {}\n", config.name);
        for command in commands {
            out.push_str(&command.render());
            out.push('\n');
        }
        let path = self.conf_path();
        std::fs::write(&path, out)?;
        Ok(path)
    }

    /// Delete the directory. Missing is fine.
    pub fn remove(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

fn clock_script(config: &Config) -> String {
    let mut script = String::from("#!/bin/sh\n");
    let mut parts = Vec::new();
    match &config.timezone {
        Some(tz) => {
            script.push_str(&format!("local=$(TZ={} date +'%H:%M %Z')\n", shell::quote(tz)));
            parts.push("$local");
        }
        None => {
            script.push_str("local=$(date +'%H:%M')\n");
            parts.push("$local");
        }
    }
    if config.show_utc {
        script.push_str("utc=$(TZ=UTC date +'%H:%M UTC')\n");
        parts.push("$utc");
    }
    script.push_str(&format!("printf '%s' \"{}\"\n", parts.join(" | ")));
    script
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_: &Path) -> io::Result<()> {
    Ok(())
}
