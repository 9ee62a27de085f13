//! Workspace git status poller
//!
//! Polls a [`StatusSource`] for whichever workspace is currently observed,
//! caches the last snapshot per workspace and publishes the displayed
//! snapshot through a watch channel. Publishing only happens when the value
//! actually changed.

mod state;

pub use state::{Activation, FetchOutcome, FetchTicket, PollerState};

use crate::source::StatusSource;
use crate::status::{StatusSnapshot, WorkspaceId};
use crate::PollerConfig;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

struct Inner {
    source: Arc<dyn StatusSource>,
    poll_interval: Duration,
    state: Mutex<PollerState>,
    display: watch::Sender<Arc<StatusSnapshot>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace_timer(&self, next: Option<JoinHandle<()>>) {
        let mut timer = self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = std::mem::replace(&mut *timer, next) {
            previous.abort();
        }
    }

    /// Publish while `state` is still held so the channel never lags the
    /// state's displayed value.
    fn publish(&self, _state: &MutexGuard<'_, PollerState>, snapshot: Arc<StatusSnapshot>) {
        self.display.send_replace(snapshot);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}

/// Handle to a running poller. Clones share the same state.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct WorkspaceStatusPoller {
    inner: Arc<Inner>,
}

impl WorkspaceStatusPoller {
    pub fn new<S: StatusSource>(source: S, config: PollerConfig) -> Self {
        Self::from_shared(Arc::new(source), config)
    }

    pub fn from_shared(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        let (display, _) = watch::channel(Arc::new(StatusSnapshot::empty()));
        Self {
            inner: Arc::new(Inner {
                source,
                poll_interval: config.poll_interval,
                state: Mutex::new(PollerState::new()),
                display,
                timer: Mutex::new(None),
            }),
        }
    }

    /// Bind the poller to `workspace_id` and return a live view of its status.
    ///
    /// The view immediately shows the cached snapshot for the workspace (or the
    /// empty default), a fetch is issued right away and the poll timer is
    /// restarted. `None` stops polling and resets the display.
    ///
    /// Views returned by earlier calls follow the new binding as well.
    pub fn observe(&self, workspace_id: Option<WorkspaceId>) -> StatusView {
        let activation = {
            let mut state = self.inner.state();
            if state.active() != workspace_id.as_ref() {
                info!(
                    "Observing workspace {}",
                    workspace_id.as_ref().map(|id| id.as_str()).unwrap_or("<none>")
                );
            }
            let activation = state.activate(workspace_id);
            if let Some(snapshot) = activation.display.clone() {
                self.inner.publish(&state, snapshot);
            }
            activation
        };

        match activation.fetch {
            Some(ticket) => {
                spawn_fetch(&self.inner, ticket);
                self.inner.replace_timer(Some(spawn_timer(&self.inner)));
            }
            None => self.inner.replace_timer(None),
        }

        StatusView {
            status: self.inner.display.subscribe(),
            poller: Arc::downgrade(&self.inner),
        }
    }

    /// Fetch the active workspace's status now, outside the timer.
    pub fn refresh(&self) {
        refresh(&self.inner);
    }

    /// Currently displayed snapshot.
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.inner.display.borrow().clone()
    }

    pub fn active_workspace(&self) -> Option<WorkspaceId> {
        self.inner.state().active().cloned()
    }

    /// Number of workspaces with a cached snapshot.
    pub fn cached_workspaces(&self) -> usize {
        self.inner.state().cache().len()
    }

    /// Stop polling and discard any in-flight results.
    ///
    /// The binding and the displayed snapshot are left as they are.
    pub fn shutdown(&self) {
        self.inner.state().invalidate();
        self.inner.replace_timer(None);
        debug!("Status poller shut down");
    }
}

fn refresh(inner: &Arc<Inner>) {
    let ticket = inner.state().begin_fetch();
    if let Some(ticket) = ticket {
        spawn_fetch(inner, ticket);
    }
}

fn spawn_fetch(inner: &Arc<Inner>, ticket: FetchTicket) {
    debug!("Fetching status for {} (seq {})", ticket.workspace_id, ticket.seq);
    let source = inner.source.clone();
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        let result = source.git_status(ticket.workspace_id.clone()).await;
        if let Err(err) = &result {
            warn!("Git status fetch for {} failed: {}", ticket.workspace_id, err);
        }

        // Poller dropped while the request was in flight
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut state = inner.state();
        if let FetchOutcome::Updated(snapshot) = state.complete(&ticket, result) {
            inner.publish(&state, snapshot);
        }
    });
}

fn spawn_timer(inner: &Arc<Inner>) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let period = inner.poll_interval;
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            refresh(&inner);
        }
    })
}

/// Live view of the poller's displayed status.
///
/// A view does not keep the poller alive: once every poller handle is dropped,
/// polling stops and [`StatusView::changed`] returns `None`.
pub struct StatusView {
    status: watch::Receiver<Arc<StatusSnapshot>>,
    poller: Weak<Inner>,
}

impl StatusView {
    /// Workspace the poller is currently bound to.
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        let inner = self.poller.upgrade()?;
        let active = inner.state().active().cloned();
        active
    }

    /// Latest displayed snapshot.
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.status.borrow().clone()
    }

    /// Wait until the displayed snapshot changes and return it.
    ///
    /// Returns `None` once the poller has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<StatusSnapshot>> {
        self.status.changed().await.ok()?;
        Some(self.status.borrow_and_update().clone())
    }

    pub fn refresh(&self) {
        if let Some(inner) = self.poller.upgrade() {
            refresh(&inner);
        }
    }

    pub fn into_stream(self) -> WatchStream<Arc<StatusSnapshot>> {
        WatchStream::new(self.status)
    }
}
