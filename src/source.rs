//! External git status source consumed by the poller

use crate::status::{RawStatus, WorkspaceId};
use futures::future::BoxFuture;
use std::sync::Arc;

/// A failed status fetch.
///
/// Network, backend and decoding failures all collapse into this one kind;
/// only the message is kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<crate::Error> for FetchError {
    fn from(err: crate::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Anything that can report the git status of a workspace.
pub trait StatusSource: Send + Sync + 'static {
    fn git_status(&self, workspace_id: WorkspaceId) -> BoxFuture<'_, Result<RawStatus, FetchError>>;
}

impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    fn git_status(&self, workspace_id: WorkspaceId) -> BoxFuture<'_, Result<RawStatus, FetchError>> {
        (**self).git_status(workspace_id)
    }
}
