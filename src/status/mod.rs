//! Git status data model for a monitored workspace
//!
//! `RawStatus` is what a status source hands back; `StatusSnapshot` is what the
//! poller caches and displays.

mod cache;

pub use cache::StatusCache;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch name reported when the source could not determine one
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Stable identifier of a workspace (not its filesystem path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkspaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One changed file in a working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub path: String,
    /// Change kind as reported by the source (`A`, `M`, `D`, `R`, ...)
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl FileStatus {
    pub fn new(path: impl Into<String>, status: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            status: status.into(),
            additions,
            deletions,
        }
    }
}

/// Status payload as returned by a status source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub files: Vec<FileStatus>,
    #[serde(default)]
    pub staged_files: Vec<FileStatus>,
    #[serde(default)]
    pub unstaged_files: Vec<FileStatus>,
    #[serde(default)]
    pub total_additions: u64,
    #[serde(default)]
    pub total_deletions: u64,
}

/// Last known git status of one workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub branch_name: String,
    pub files: Vec<FileStatus>,
    pub staged_files: Vec<FileStatus>,
    pub unstaged_files: Vec<FileStatus>,
    pub total_additions: u64,
    pub total_deletions: u64,
    /// Set when the last fetch attempt failed
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// The all-empty default: blank branch, no files, zero totals, no error.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty default used when a fetch fails and nothing is cached yet.
    pub fn unknown(error: impl Into<String>) -> Self {
        Self {
            branch_name: UNKNOWN_BRANCH.to_string(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Build a successful snapshot from a source payload.
    ///
    /// The branch name goes through [`resolve_branch_name`] against `cached`.
    pub fn from_raw(raw: RawStatus, cached: Option<&StatusSnapshot>) -> Self {
        let branch_name = resolve_branch_name(raw.branch_name.as_deref(), cached);
        Self {
            branch_name,
            files: raw.files,
            staged_files: raw.staged_files,
            unstaged_files: raw.unstaged_files,
            total_additions: raw.total_additions,
            total_deletions: raw.total_deletions,
            error: None,
        }
    }

    /// Copy of this snapshot annotated with a fetch failure; data fields are kept.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn has_known_branch(&self) -> bool {
        is_known_branch(&self.branch_name)
    }
}

impl PartialEq for StatusSnapshot {
    fn eq(&self, other: &Self) -> bool {
        same_status(self, other)
    }
}

impl Eq for StatusSnapshot {}

fn is_known_branch(name: &str) -> bool {
    !name.is_empty() && name != UNKNOWN_BRANCH
}

/// Pick the branch name to display for an incoming result.
///
/// A known incoming name always wins. An empty or `"unknown"` name keeps the
/// cached one when there is a cached entry, and passes through otherwise.
pub fn resolve_branch_name(incoming: Option<&str>, cached: Option<&StatusSnapshot>) -> String {
    let incoming = incoming.unwrap_or_default();
    if is_known_branch(incoming) {
        return incoming.to_string();
    }
    match cached {
        Some(previous) => previous.branch_name.clone(),
        None => incoming.to_string(),
    }
}

/// Whether two snapshots would render identically.
///
/// File lists are compared in order, element by element.
pub fn same_status(a: &StatusSnapshot, b: &StatusSnapshot) -> bool {
    a.branch_name == b.branch_name
        && a.error == b.error
        && a.total_additions == b.total_additions
        && a.total_deletions == b.total_deletions
        && same_files(&a.files, &b.files)
        && same_files(&a.staged_files, &b.staged_files)
        && same_files(&a.unstaged_files, &b.unstaged_files)
}

fn same_files(a: &[FileStatus], b: &[FileStatus]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(left, right)| {
            left.path == right.path
                && left.status == right.status
                && left.additions == right.additions
                && left.deletions == right.deletions
        })
}
