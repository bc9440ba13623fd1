//! Tool settings from `settings.toml`.
//!
//! Every key is optional:
//!
//! ```toml
//! tmux = "/usr/local/bin/tmux"
//! workspaces_dir = "~/work/layouts"
//! bin_dir = "~/.local/bin"
//!
//! [poll]
//! attempts = 20
//! interval_ms = 100
//! restart_grace_ms = 500
//!
//! [options]
//! mouse = true
//! history-limit = 50000
//! ```

use crate::config::{self, Overlay};
use crate::error::{ConfigError, MuxwrightError, Result};
use crate::poll::PollPolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// tmux binary to run.
    pub tmux: String,
    pub workspaces_dir: Option<String>,
    pub bin_dir: Option<String>,
    pub poll: PollSettings,
    /// Global default options, below every workspace's own options.
    pub options: BTreeMap<String, toml::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tmux: "tmux".to_string(),
            workspaces_dir: None,
            bin_dir: None,
            poll: PollSettings::default(),
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    pub attempts: u32,
    pub interval_ms: u64,
    pub restart_grace_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval_ms: 100,
            restart_grace_ms: 500,
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`MuxwrightError::Settings`] if the TOML is invalid or has
    /// values of the wrong type.
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            attempts: self.poll.attempts,
            interval: Duration::from_millis(self.poll.interval_ms),
        }
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.poll.restart_grace_ms)
    }

    /// Directory searched for `<name>.yml`, relative to `config_dir`
    /// unless absolute.
    pub fn workspaces_dir(&self, config_dir: &Path) -> PathBuf {
        match self.workspaces_dir.as_deref() {
            Some(dir) => config::resolve_dir(dir, config_dir),
            None => config_dir.join("workspaces"),
        }
    }

    /// Where `--register` installs wrappers.
    pub fn bin_dir(&self) -> Result<PathBuf> {
        match self.bin_dir.as_deref() {
            Some(dir) => {
                let home = dirs::home_dir().unwrap_or_default();
                Ok(config::resolve_dir(dir, &home))
            }
            None => dirs::home_dir()
                .map(|home| home.join(".local").join("bin"))
                .ok_or(MuxwrightError::NoConfigDir),
        }
    }

    /// The `[options]` table as a validated overlay.
    pub fn default_options(&self) -> std::result::Result<Overlay, ConfigError> {
        let pairs: Vec<(String, String)> = self
            .options
            .iter()
            .map(|(name, value)| (name.clone(), option_value(value)))
            .collect();
        Overlay::from_pairs("settings.toml [options]", &pairs, false)
    }
}

/// tmux spelling of a TOML value.
fn option_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Boolean(true) => "on".to_string(),
        toml::Value::Boolean(false) => "off".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_policy(), PollPolicy::default());
        assert_eq!(settings.restart_grace(), Duration::from_millis(500));
        assert_eq!(
            settings.workspaces_dir(Path::new("/cfg/muxwright")),
            PathBuf::from("/cfg/muxwright/workspaces")
        );
    }

    #[test]
    fn test_full_settings() {
        let toml = r#"
tmux = "/opt/tmux"
workspaces_dir = "/srv/layouts"

[poll]
attempts = 5

[options]
mouse = true
history-limit = 50000
status-position = "top"
"#;
        let settings = Settings::from_str(toml).unwrap();
        assert_eq!(settings.tmux, "/opt/tmux");
        assert_eq!(settings.poll.attempts, 5);
        assert_eq!(settings.poll.interval_ms, 100);
        assert_eq!(settings.workspaces_dir(Path::new("/cfg")), PathBuf::from("/srv/layouts"));

        let overlay = settings.default_options().unwrap();
        assert_eq!(overlay.get("mouse").unwrap().value, "on");
        assert_eq!(overlay.get("history-limit").unwrap().value, "50000");
        assert_eq!(overlay.get("status-position").unwrap().value, "top");
    }

    #[test]
    fn test_unknown_option_rejected() {
        let settings = Settings::from_str("[options]\nnot-an-option = 1\n").unwrap();
        assert!(matches!(
            settings.default_options(),
            Err(ConfigError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_wrong_type() {
        assert!(matches!(
            Settings::from_str("[poll]\nattempts = \"many\"\n"),
            Err(MuxwrightError::Settings(_))
        ));
    }
}
