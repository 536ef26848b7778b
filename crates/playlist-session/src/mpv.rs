//! Client side of mpv's JSON IPC socket.
//!
//! The launcher never owns the player process (tmux does), so there is no
//! long-lived connection here: each query opens the socket, writes one
//! request line, and reads lines until the matching reply shows up.
//!
//! ```text
//!   ControlChannel::command(["get_property", "media-title"])
//!         │
//!         ├── connect  <socket_path>
//!         ├── write    {"command": [...], "request_id": N}\n
//!         └── read     skip {"event": ...} lines
//!                      reply with request_id N → data / error
//! ```
//!
//! Everything that can go wrong is an `IpcError`; callers treat all of them
//! as transient.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("control socket i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("control socket json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("player closed the connection before replying")]
    Closed,
    #[error("no reply from player within {0:?}")]
    Timeout(Duration),
    #[error("player error: {0}")]
    Command(String),
}

/// Handle on the player's control socket.  Cheap to clone; holds no
/// connection.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ControlChannel {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The socket appears once the player has started and disappears when
    /// it exits.
    pub fn is_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send one command and return the reply's `data` field.
    pub async fn command(&self, command: Value) -> Result<Value, IpcError> {
        tokio::time::timeout(self.timeout, self.round_trip(command))
            .await
            .map_err(|_| IpcError::Timeout(self.timeout))?
    }

    pub async fn get_property(&self, name: &str) -> Result<Value, IpcError> {
        self.command(json!(["get_property", name])).await
    }

    /// Title of the current entry, `None` when the player reports no string.
    pub async fn media_title(&self) -> Result<Option<String>, IpcError> {
        let data = self.get_property("media-title").await?;
        Ok(data.as_str().map(str::to_owned))
    }

    async fn round_trip(&self, command: Value) -> Result<Value, IpcError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();
        debug!("mpv: send req={} payload={}", req_id, raw.trim());
        write_half.write_all(raw.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(IpcError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let val: Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    debug!("mpv: invalid json '{}': {}", trimmed, e);
                    continue;
                }
            };
            if is_reply_to(&val, req_id) {
                return parse_reply(val);
            }
            debug!("mpv: skipping unsolicited line {}", trimmed);
        }
    }
}

/// Events carry an `event` key.  Replies echo `request_id`; players that do
/// not echo it still send the reply as the first non-event line.
fn is_reply_to(val: &Value, req_id: u64) -> bool {
    if val.get("event").is_some() {
        return false;
    }
    match val.get("request_id").and_then(Value::as_u64) {
        Some(id) => id == req_id,
        None => val.get("error").is_some(),
    }
}

fn parse_reply(val: Value) -> Result<Value, IpcError> {
    if val["error"].as_str() == Some("success") {
        Ok(val.get("data").cloned().unwrap_or(Value::Null))
    } else {
        let err = val["error"].as_str().unwrap_or("unknown error").to_string();
        Err(IpcError::Command(err))
    }
}
