//! Persisted panel settings.
//!
//! Values come from, in order of precedence: command-line flags, the settings
//! file, built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_LOGS_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MODELS_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Contents of `settings.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub status_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub logs_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub models_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Fully resolved settings used by the controller and client.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSettings {
    pub base_url: String,
    pub status_interval: Duration,
    pub logs_interval: Duration,
    pub models_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            status_interval: DEFAULT_STATUS_INTERVAL,
            logs_interval: DEFAULT_LOGS_INTERVAL,
            models_interval: DEFAULT_MODELS_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PanelSettings {
    /// Layer `overrides` (from flags) over `file` over the defaults.
    pub fn resolve(file: SettingsFile, overrides: SettingsFile) -> Self {
        let d = Self::default();
        Self {
            base_url: overrides.base_url.or(file.base_url).unwrap_or(d.base_url),
            status_interval: non_zero(overrides.status_interval.or(file.status_interval))
                .unwrap_or(d.status_interval),
            logs_interval: non_zero(overrides.logs_interval.or(file.logs_interval))
                .unwrap_or(d.logs_interval),
            models_interval: non_zero(overrides.models_interval.or(file.models_interval))
                .unwrap_or(d.models_interval),
            request_timeout: non_zero(overrides.request_timeout.or(file.request_timeout))
                .unwrap_or(d.request_timeout),
        }
    }
}

// tokio intervals panic on a zero period.
fn non_zero(d: Option<Duration>) -> Option<Duration> {
    d.filter(|d| !d.is_zero())
}

/// Default location: `<config_dir>/rl-run-panel/settings.json`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rl-run-panel").join("settings.json"))
}

/// Load the settings file. A missing file yields empty settings; a file that
/// exists but cannot be parsed is an error.
pub fn load_settings_file(path: &Path) -> Result<SettingsFile> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SettingsFile::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("read settings {}", path.display()));
        }
    };
    serde_json::from_str(&data).with_context(|| format!("parse settings {}", path.display()))
}
