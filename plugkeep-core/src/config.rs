//! YAML configuration for the update engine.
//!
//! # Storage layout
//!
//! ```text
//! <config_dir>/
//!   config.yaml      (created with commented defaults on first load)
//! ```
//!
//! Every operation takes the directory explicitly (`load_at`, `save_at`);
//! `load()` is the convenience form rooted at [`Paths::from_home`].
//!
//! The config is re-read at the start of every reconciliation pass and handed
//! down by value; nothing holds on to it between passes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::layout::Paths;

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 30;
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const DEFAULT_CONFIG_YAML: &str = "\
# plugkeep configuration
check_interval_minutes: 30

# Run once per day at this UTC time instead of every interval (HH:MM:SS).
# daily_update_time_utc: \"04:00:00\"

# Optional webhook that receives update success/failure notices.
# notification_webhook_url: \"https://discord.com/api/webhooks/...\"

# Component name (install folder and binary name) -> repository.
repositories: {}
#  Example1: owner1/repo1
#  Example2: https://github.com/owner2/repo2
";

/// Bound configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoUpdateConfig {
    pub check_interval_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_update_time_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_webhook_url: Option<String>,
    /// Component name → repository reference string.
    pub repositories: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            daily_update_time_utc: None,
            notification_webhook_url: None,
            repositories: BTreeMap::new(),
            api_base_url: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// When the background loop should run a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every `Duration`, starting immediately.
    Interval(Duration),
    /// Once per UTC day, at or after the given time.
    DailyAt(NaiveTime),
}

impl AutoUpdateConfig {
    /// Check interval, never shorter than one minute.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval_minutes.max(1)) * 60)
    }

    /// Parsed `daily_update_time_utc`, if present and well-formed.
    ///
    /// Accepts `HH:MM:SS` and `HH:MM`.
    pub fn daily_time(&self) -> Option<NaiveTime> {
        let raw = self.daily_update_time_utc.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    /// Daily time wins over the interval when it parses; an unparsable daily
    /// time falls back to the interval with a warning.
    pub fn schedule(&self) -> Schedule {
        match (self.daily_update_time_utc.as_deref(), self.daily_time()) {
            (_, Some(time)) => Schedule::DailyAt(time),
            (Some(raw), None) if !raw.trim().is_empty() => {
                tracing::warn!(
                    value = raw,
                    "daily_update_time_utc is not HH:MM:SS; using interval schedule"
                );
                Schedule::Interval(self.check_interval())
            }
            _ => Schedule::Interval(self.check_interval()),
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Webhook URL, ignoring blank values.
    pub fn webhook_url(&self) -> Option<&str> {
        self.notification_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `<config_dir>/config.yaml`. No I/O.
pub fn config_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

/// Write the commented default config if no config file exists yet.
///
/// Returns the config path and whether the file was created.
pub fn ensure_default_at(config_dir: &Path) -> Result<(PathBuf, bool), ConfigError> {
    let path = config_path_at(config_dir);
    if path.exists() {
        return Ok((path, false));
    }
    std::fs::create_dir_all(config_dir).map_err(|e| io_err(config_dir, e))?;
    write_atomic(&path, DEFAULT_CONFIG_YAML)?;
    tracing::info!(path = %path.display(), "created default config");
    Ok((path, true))
}

/// Load the config from `<config_dir>/config.yaml`, creating the default file
/// first when absent.
///
/// Returns `ConfigError::Parse` (with path + line context) for malformed YAML.
pub fn load_at(config_dir: &Path) -> Result<AutoUpdateConfig, ConfigError> {
    let (path, _) = ensure_default_at(config_dir)?;
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(AutoUpdateConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper using the default directories.
pub fn load() -> Result<AutoUpdateConfig, ConfigError> {
    load_at(&Paths::from_home()?.config_dir)
}

/// Save the config atomically (`.tmp` + rename).
pub fn save_at(config_dir: &Path, config: &AutoUpdateConfig) -> Result<(), ConfigError> {
    std::fs::create_dir_all(config_dir).map_err(|e| io_err(config_dir, e))?;
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path_at(config_dir), &yaml)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
