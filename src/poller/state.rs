//! Synchronous core of the status poller.
//!
//! Every fetch is tagged with a sequence number and the workspace it was issued
//! for. A completion is only applied when both still match the latest request;
//! everything else is dropped without touching the cache or the display.

use crate::source::FetchError;
use crate::status::{same_status, RawStatus, StatusCache, StatusSnapshot, WorkspaceId};
use std::sync::Arc;
use tracing::debug;

/// Identity of one issued fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub workspace_id: WorkspaceId,
}

/// Result of switching the active workspace
#[derive(Debug)]
pub struct Activation {
    /// Fetch to issue right away (`None` when no workspace is active)
    pub fetch: Option<FetchTicket>,
    /// New displayed snapshot, if it differs from what was shown before
    pub display: Option<Arc<StatusSnapshot>>,
}

/// What happened when a fetch completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Superseded request or workspace switched; nothing was touched
    Stale,
    /// Applied to the cache; the displayed value is unchanged
    Unchanged,
    /// Applied; this is the new displayed value
    Updated(Arc<StatusSnapshot>),
}

#[derive(Debug)]
pub struct PollerState {
    active: Option<WorkspaceId>,
    latest_seq: u64,
    cache: StatusCache,
    displayed: Arc<StatusSnapshot>,
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerState {
    pub fn new() -> Self {
        Self {
            active: None,
            latest_seq: 0,
            cache: StatusCache::new(),
            displayed: Arc::new(StatusSnapshot::empty()),
        }
    }

    pub fn active(&self) -> Option<&WorkspaceId> {
        self.active.as_ref()
    }

    pub fn displayed(&self) -> &Arc<StatusSnapshot> {
        &self.displayed
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Bind to a workspace (or to none).
    ///
    /// In-flight requests are invalidated and the display switches to the
    /// cached snapshot for the new workspace, or the empty default.
    pub fn activate(&mut self, workspace_id: Option<WorkspaceId>) -> Activation {
        self.latest_seq += 1;
        self.active = workspace_id;

        let next = self
            .active
            .as_ref()
            .and_then(|id| self.cache.get(id).cloned())
            .unwrap_or_else(|| Arc::new(StatusSnapshot::empty()));
        let display = self.set_displayed(next);

        let fetch = self.active.clone().map(|workspace_id| FetchTicket {
            seq: self.latest_seq,
            workspace_id,
        });

        Activation { fetch, display }
    }

    /// Allocate a new request for the active workspace.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let workspace_id = self.active.clone()?;
        self.latest_seq += 1;
        Some(FetchTicket {
            seq: self.latest_seq,
            workspace_id,
        })
    }

    /// Invalidate every in-flight request without changing the binding.
    pub fn invalidate(&mut self) {
        self.latest_seq += 1;
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.seq == self.latest_seq && self.active.as_ref() == Some(&ticket.workspace_id)
    }

    /// Apply the result of a fetch.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<RawStatus, FetchError>,
    ) -> FetchOutcome {
        if !self.is_current(ticket) {
            debug!(
                "Dropping stale status for {} (seq {}, latest {})",
                ticket.workspace_id, ticket.seq, self.latest_seq
            );
            return FetchOutcome::Stale;
        }

        let cached = self.cache.get(&ticket.workspace_id).map(Arc::as_ref);
        let next = match result {
            Ok(raw) => StatusSnapshot::from_raw(raw, cached),
            Err(err) => match cached {
                Some(previous) => previous.with_error(err.message),
                None => StatusSnapshot::unknown(err.message),
            },
        };

        let next = Arc::new(next);
        self.cache.insert(ticket.workspace_id.clone(), next.clone());
        match self.set_displayed(next) {
            Some(snapshot) => FetchOutcome::Updated(snapshot),
            None => FetchOutcome::Unchanged,
        }
    }

    fn set_displayed(&mut self, next: Arc<StatusSnapshot>) -> Option<Arc<StatusSnapshot>> {
        if same_status(&self.displayed, &next) {
            return None;
        }
        self.displayed = next;
        Some(self.displayed.clone())
    }
}
