//! Watcher configuration loaded from `status-watch.toml`.
//!
//! The file lives in the CodexMonitor home directory:
//! `$CODEX_MONITOR_HOME` when set, `~/.codexmonitor` otherwise.

use crate::{Error, PollerConfig, Result, WorkspaceId, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_FILENAME: &str = "status-watch.toml";
const HOME_ENV: &str = "CODEX_MONITOR_HOME";

/// Daemon connection and polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// `host:port` of the CodexMonitor daemon
    pub daemon_addr: String,

    /// Token sent with the `auth` handshake
    pub token: Option<String>,

    pub poll_interval_ms: u64,

    /// Per-request timeout for daemon calls
    pub request_timeout_ms: u64,

    /// Workspaces to watch: the first is observed on startup, `:next` cycles
    /// through the rest
    pub workspaces: Vec<WorkspaceId>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            daemon_addr: "127.0.0.1:4732".to_string(),
            token: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            request_timeout_ms: 10_000,
            workspaces: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields defaults, a broken one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon_addr.trim().is_empty() {
            return Err(Error::Config("daemon_addr must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::new().with_poll_interval(self.poll_interval())
    }
}

/// CodexMonitor home directory
pub fn monitor_home() -> Option<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    dirs::home_dir().map(|home| home.join(".codexmonitor"))
}

pub fn default_config_path() -> Option<PathBuf> {
    monitor_home().map(|home| home.join(CONFIG_FILENAME))
}
