//! Codex Status Watch
//!
//! Keeps a de-duplicated, non-flickering view of the git status of the
//! workspace a CodexMonitor client is looking at:
//! - Polls a status source on a fixed interval and on demand
//! - Caches the last snapshot per workspace
//! - Drops responses that arrive for superseded requests or workspaces

pub mod config;
pub mod daemon;
pub mod poller;
pub mod source;
pub mod status;

pub use config::WatchConfig;
pub use daemon::{DaemonClient, DaemonStatusSource};
pub use poller::{StatusView, WorkspaceStatusPoller};
pub use source::{FetchError, StatusSource};
pub use status::{same_status, FileStatus, RawStatus, StatusSnapshot, WorkspaceId};

use std::time::Duration;

/// Default period between two scheduled status fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Configuration for a [`WorkspaceStatusPoller`]
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Period of the status timer
    pub poll_interval: Duration,
}

impl PollerConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Result type for status watch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the poller itself
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
