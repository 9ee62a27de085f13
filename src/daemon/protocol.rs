//! Wire format of the CodexMonitor daemon
//!
//! Newline-delimited JSON. Requests carry an `id`; responses echo it with
//! either `result` or `error`. Lines with a `method` and no matching request
//! are event notifications pushed by the daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request line sent to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Response line from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub message: String,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) => Err(error.message),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A line received from the daemon
#[derive(Debug, Clone)]
pub enum DaemonMessage {
    Notification { method: String, params: Value },
    Response(RpcResponse),
}

impl DaemonMessage {
    pub fn from_json(json: &Value) -> Option<Self> {
        if let Some(method) = json.get("method").and_then(|m| m.as_str()) {
            Some(DaemonMessage::Notification {
                method: method.to_string(),
                params: json.get("params").cloned().unwrap_or(Value::Null),
            })
        } else if json.get("id").is_some() {
            serde_json::from_value(json.clone())
                .ok()
                .map(DaemonMessage::Response)
        } else {
            None
        }
    }
}

/// Daemon RPC methods
pub mod methods {
    pub const AUTH: &str = "auth";
    pub const PING: &str = "ping";
    pub const GET_GIT_STATUS: &str = "get_git_status";
}
