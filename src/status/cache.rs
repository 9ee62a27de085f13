//! Per-workspace snapshot cache

use super::{StatusSnapshot, WorkspaceId};
use std::collections::HashMap;
use std::sync::Arc;

/// Last snapshot seen for every workspace a poller has fetched.
///
/// Owned by a single poller; entries live as long as the poller does.
#[derive(Debug, Default, Clone)]
pub struct StatusCache {
    entries: HashMap<WorkspaceId, Arc<StatusSnapshot>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workspace_id: &WorkspaceId) -> Option<&Arc<StatusSnapshot>> {
        self.entries.get(workspace_id)
    }

    pub fn insert(&mut self, workspace_id: WorkspaceId, snapshot: Arc<StatusSnapshot>) {
        self.entries.insert(workspace_id, snapshot);
    }

    pub fn contains(&self, workspace_id: &WorkspaceId) -> bool {
        self.entries.contains_key(workspace_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
