//! Integration tests: daemon client and poller against an in-process fake daemon

use codex_status_watch::{
    DaemonClient, DaemonStatusSource, Error, PollerConfig, StatusSnapshot, WorkspaceId,
    WorkspaceStatusPoller,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Workspace id the fake daemon never answers for
const HANGING_WORKSPACE: &str = "hang";

#[derive(Default)]
struct FakeDaemon {
    token: Option<String>,
    statuses: Mutex<HashMap<String, Value>>,
    connections: AtomicUsize,
}

impl FakeDaemon {
    fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..Self::default()
        }
    }

    fn set_status(&self, workspace_id: &str, status: Value) {
        self.statuses
            .lock()
            .unwrap()
            .insert(workspace_id.to_string(), status);
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn handle(&self, method: &str, params: &Value) -> Option<Result<Value, String>> {
        match method {
            "ping" => Some(Ok(json!({ "ok": true }))),
            "get_git_status" => {
                let id = params["workspaceId"].as_str().unwrap_or_default();
                if id == HANGING_WORKSPACE {
                    return None;
                }
                Some(
                    self.statuses
                        .lock()
                        .unwrap()
                        .get(id)
                        .cloned()
                        .ok_or_else(|| "workspace not found".to_string()),
                )
            }
            other => Some(Err(format!("unknown method: {}", other))),
        }
    }
}

async fn spawn_daemon(daemon: Arc<FakeDaemon>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            daemon.connections.fetch_add(1, Ordering::SeqCst);
            let daemon = daemon.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                let mut authenticated = daemon.token.is_none();

                while let Ok(Some(line)) = lines.next_line().await {
                    let message: Value = serde_json::from_str(&line).unwrap();
                    let id = message["id"].clone();
                    let method = message["method"].as_str().unwrap_or_default();

                    let reply = if !authenticated {
                        if method != "auth" {
                            Some(Err("unauthorized".to_string()))
                        } else if message["params"]["token"].as_str() == daemon.token.as_deref() {
                            authenticated = true;
                            Some(Ok(json!({ "ok": true })))
                        } else {
                            Some(Err("invalid token".to_string()))
                        }
                    } else {
                        daemon.handle(method, &message["params"])
                    };

                    let Some(reply) = reply else {
                        continue;
                    };

                    // Daemons interleave event notifications with responses
                    let event = json!({ "method": "app-server-event", "params": { "n": 1 } });
                    let response = match reply {
                        Ok(result) => json!({ "id": id, "result": result }),
                        Err(message) => json!({ "id": id, "error": { "message": message } }),
                    };
                    let payload = format!("{}\n\n{}\n", event, response);
                    if write_half.write_all(payload.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

fn status_json(branch: &str, files: &[(&str, &str, u64, u64)]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|(path, status, additions, deletions)| {
            json!({ "path": path, "status": status, "additions": additions, "deletions": deletions })
        })
        .collect();
    let additions: u64 = files.iter().map(|f| f["additions"].as_u64().unwrap()).sum();
    let deletions: u64 = files.iter().map(|f| f["deletions"].as_u64().unwrap()).sum();
    json!({
        "branchName": branch,
        "files": files,
        "stagedFiles": [],
        "unstagedFiles": files,
        "totalAdditions": additions,
        "totalDeletions": deletions,
    })
}

fn client(addr: SocketAddr, token: Option<&str>) -> Arc<DaemonClient> {
    Arc::new(DaemonClient::new(
        addr.to_string(),
        token.map(str::to_string),
        Duration::from_millis(500),
    ))
}

/// Test ping and status calls over one authenticated connection
#[tokio::test]
async fn test_client_authenticates_and_reuses_connection() {
    let daemon = Arc::new(FakeDaemon::with_token("secret"));
    daemon.set_status("ws-1", status_json("main", &[("src/lib.rs", "M", 2, 1)]));
    let addr = spawn_daemon(daemon.clone()).await;

    let client = client(addr, Some("secret"));
    client.ping().await.unwrap();
    let status = client.get_git_status(&WorkspaceId::new("ws-1")).await.unwrap();

    assert_eq!(status.branch_name.as_deref(), Some("main"));
    assert_eq!(status.files.len(), 1);
    assert_eq!(status.total_additions, 2);
    assert_eq!(daemon.connections(), 1);
}

/// Test that a wrong token surfaces the daemon's message
#[tokio::test]
async fn test_client_rejects_bad_token() {
    let daemon = Arc::new(FakeDaemon::with_token("secret"));
    let addr = spawn_daemon(daemon).await;

    let client = client(addr, Some("wrong"));
    match client.ping().await {
        Err(Error::Daemon(message)) => assert_eq!(message, "invalid token"),
        other => panic!("Expected daemon error, got {:?}", other.map(|_| ())),
    }
}

/// Test that a timed out request drops the connection and the next call reconnects
#[tokio::test]
async fn test_client_reconnects_after_timeout() {
    let daemon = Arc::new(FakeDaemon::default());
    daemon.set_status("ws-1", status_json("main", &[]));
    let addr = spawn_daemon(daemon.clone()).await;

    let client = client(addr, None);
    let result = client.get_git_status(&WorkspaceId::new(HANGING_WORKSPACE)).await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    let status = client.get_git_status(&WorkspaceId::new("ws-1")).await.unwrap();
    assert_eq!(status.branch_name.as_deref(), Some("main"));
    assert_eq!(daemon.connections(), 2);
}

/// Test that an unreachable daemon is reported as an error, not a panic
#[tokio::test]
async fn test_client_unreachable_daemon() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(addr, None);
    assert!(client.ping().await.is_err());
}

/// Test the poller end to end: fetch, repoll with a change, error on a missing workspace
#[tokio::test]
async fn test_poller_over_daemon() {
    let daemon = Arc::new(FakeDaemon::default());
    daemon.set_status("ws-1", status_json("main", &[("a.ts", "M", 3, 1)]));
    let addr = spawn_daemon(daemon.clone()).await;

    let source = DaemonStatusSource::new(client(addr, None));
    let config = PollerConfig::default().with_poll_interval(Duration::from_millis(50));
    let poller = WorkspaceStatusPoller::new(source, config);

    let mut view = poller.observe(Some(WorkspaceId::new("ws-1")));
    let shown = tokio::time::timeout(Duration::from_secs(5), view.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shown.branch_name, "main");
    assert_eq!(shown.total_additions, 3);

    // Next poll reports an unknown branch and one more file; branch stays sticky
    daemon.set_status(
        "ws-1",
        status_json("", &[("a.ts", "M", 3, 1), ("b.ts", "A", 5, 0)]),
    );
    let shown = tokio::time::timeout(Duration::from_secs(5), view.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shown.branch_name, "main");
    assert_eq!(shown.files.len(), 2);
    assert_eq!(shown.total_additions, 8);

    let mut view = poller.observe(Some(WorkspaceId::new("ws-missing")));
    assert_eq!(*view.status(), StatusSnapshot::empty());
    let shown = tokio::time::timeout(Duration::from_secs(5), view.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        *shown,
        StatusSnapshot::unknown("Daemon error: workspace not found")
    );

    poller.shutdown();
}
