//! Client for the CodexMonitor TCP daemon
//!
//! Keeps one connection open and reuses it across calls. Any transport or
//! protocol failure drops the connection; the next call reconnects and
//! re-authenticates.

pub mod protocol;

use crate::source::{FetchError, StatusSource};
use crate::status::{RawStatus, WorkspaceId};
use crate::{Error, Result, WatchConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use protocol::{methods, DaemonMessage, RpcRequest};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Connection {
    async fn request(&mut self, id: u64, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            id,
            method: method.to_string(),
            params,
        };
        let line = serde_json::to_string(&request)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Err(Error::Protocol("Daemon closed the connection".to_string()));
            };
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(&line) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Ignoring unparsable daemon line: {}", e);
                    continue;
                }
            };

            match DaemonMessage::from_json(&value) {
                Some(DaemonMessage::Response(response)) if response.id == Some(id) => {
                    return response.into_result().map_err(Error::Daemon);
                }
                Some(DaemonMessage::Notification { method, .. }) => {
                    trace!("Skipping daemon event {}", method);
                }
                _ => {
                    let preview: String = line.chars().take(100).collect();
                    debug!("Skipping unrelated daemon line: {}", preview);
                }
            }
        }
    }
}

/// JSON-line RPC client for a CodexMonitor daemon
pub struct DaemonClient {
    addr: String,
    token: Option<String>,
    timeout: Duration,
    next_id: AtomicU64,
    connection: Mutex<Option<Connection>>,
}

impl DaemonClient {
    pub fn new(addr: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            token,
            timeout,
            next_id: AtomicU64::new(1),
            connection: Mutex::new(None),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(
            config.daemon_addr.clone(),
            config.token.clone(),
            config.request_timeout(),
        )
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn connect(&self) -> Result<Connection> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut connection = Connection {
            lines: BufReader::new(read_half).lines(),
            writer: BufWriter::new(write_half),
        };

        if let Some(token) = &self.token {
            connection
                .request(self.next_id(), methods::AUTH, json!({ "token": token }))
                .await?;
        }

        info!("Connected to daemon at {}", self.addr);
        Ok(connection)
    }

    async fn call_locked(
        &self,
        slot: &mut Option<Connection>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let Some(connection) = slot.as_mut() else {
            return Err(Error::Protocol("No daemon connection".to_string()));
        };
        connection.request(self.next_id(), method, params).await
    }

    /// Issue one RPC call, connecting first if needed.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut slot = self.connection.lock().await;
        let result = tokio::time::timeout(self.timeout, self.call_locked(&mut slot, method, params)).await;

        match result {
            Ok(Ok(value)) => Ok(value),
            // The daemon answered; the connection is still in sync.
            Ok(Err(Error::Daemon(message))) => Err(Error::Daemon(message)),
            Ok(Err(err)) => {
                debug!("Dropping daemon connection after error: {}", err);
                *slot = None;
                Err(err)
            }
            Err(_) => {
                *slot = None;
                Err(Error::Timeout(self.timeout))
            }
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.call(methods::PING, json!({})).await?;
        Ok(())
    }

    pub async fn get_git_status(&self, workspace_id: &WorkspaceId) -> Result<RawStatus> {
        let value = self
            .call(methods::GET_GIT_STATUS, json!({ "workspaceId": workspace_id }))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// [`StatusSource`] backed by a daemon's `get_git_status` call
#[derive(Clone)]
pub struct DaemonStatusSource {
    client: Arc<DaemonClient>,
}

impl DaemonStatusSource {
    pub fn new(client: Arc<DaemonClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<DaemonClient> {
        &self.client
    }
}

impl StatusSource for DaemonStatusSource {
    fn git_status(&self, workspace_id: WorkspaceId) -> BoxFuture<'_, std::result::Result<RawStatus, FetchError>> {
        async move {
            self.client
                .get_git_status(&workspace_id)
                .await
                .map_err(FetchError::from)
        }
        .boxed()
    }
}
