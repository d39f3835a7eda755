//! JSON-RPC transports.
//!
//! The `McpTransport` trait is the seam between the connection logic and the
//! wire. Two implementations exist:
//! - `StdioTransport`: line-delimited JSON-RPC over a child process's stdio
//! - `SseTransport` (see `sse_transport`): HTTP POST out, SSE stream back
//!
//! Both route responses by request id through `PendingRequests`, so several
//! tool calls can be in flight on one connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Transport Trait ─────────────────────────────────────────────────────────

/// A bi-directional JSON-RPC channel to one MCP endpoint.
pub trait McpTransport: Send + Sync {
    /// Human-readable endpoint label (URL or command).
    fn endpoint(&self) -> &str;

    /// Send a request and wait for the response with the matching id.
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, McpError>>;

    /// Send a notification (no response expected).
    fn notify<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<(), McpError>>;

    /// Tear the channel down. In-flight requests fail with `McpError::Closed`.
    fn close(&self) -> BoxFuture<'_, ()>;
}

// ─── Pending Request Table ───────────────────────────────────────────────────

#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

/// Response router shared between request senders and the reader task.
pub struct PendingRequests {
    endpoint: String,
    state: std::sync::Mutex<PendingState>,
}

impl PendingRequests {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            state: std::sync::Mutex::new(PendingState::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve a slot for `id`. Fails once the channel has been closed.
    pub fn register(self: &Arc<Self>, id: u64) -> Result<PendingResponse, McpError> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if state.closed {
            return Err(McpError::Closed {
                endpoint: self.endpoint.clone(),
            });
        }
        state.waiters.insert(id, tx);
        Ok(PendingResponse {
            id,
            rx,
            owner: Arc::clone(self),
        })
    }

    /// Route one raw incoming message. Returns `true` if it matched a waiter.
    ///
    /// Server-initiated requests and notifications (anything with a `method`)
    /// and unparsable lines are ignored.
    pub fn dispatch(&self, raw: &str) -> bool {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if value.get("method").is_some() {
            return false;
        }
        let response: JsonRpcResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(_) => return false,
        };
        let waiter = self.lock().waiters.remove(&response.id);
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    id = response.id,
                    "dropping response with no waiter"
                );
                false
            }
        }
    }

    /// Mark the channel closed and fail every waiter.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.waiters.clear();
    }

    pub fn in_flight(&self) -> usize {
        self.lock().waiters.len()
    }

    fn forget(&self, id: u64) {
        self.lock().waiters.remove(&id);
    }
}

/// A registered request awaiting its response. Dropping it frees the slot.
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<JsonRpcResponse>,
    owner: Arc<PendingRequests>,
}

impl PendingResponse {
    pub async fn wait(mut self) -> Result<JsonRpcResponse, McpError> {
        let rx = &mut self.rx;
        rx.await.map_err(|_| McpError::Closed {
            endpoint: self.owner.endpoint.clone(),
        })
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.owner.forget(self.id);
    }
}

// ─── Stdio Transport ─────────────────────────────────────────────────────────

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    command: String,
    writer: Mutex<ChildStdin>,
    child: Mutex<Option<Child>>,
    pending: Arc<PendingRequests>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl StdioTransport {
    /// Spawn `command` and wire its stdio for JSON-RPC.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (key, value) in env {
            cmd.env(key, value);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::ConnectFailed {
            endpoint: command.to_string(),
            reason: format!("{e}"),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::ConnectFailed {
            endpoint: command.to_string(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or(McpError::ConnectFailed {
            endpoint: command.to_string(),
            reason: "failed to capture stdout".into(),
        })?;

        tracing::info!(command, pid = ?child.id(), "spawned stdio MCP endpoint");
        Ok(Self::from_pipes(command, stdin, stdout, Some(child)))
    }

    fn from_pipes(
        command: &str,
        stdin: ChildStdin,
        stdout: ChildStdout,
        child: Option<Child>,
    ) -> Self {
        let pending = PendingRequests::new(command);
        let reader = tokio::spawn(read_stdout(command.to_string(), stdout, Arc::clone(&pending)));
        Self {
            command: command.to_string(),
            writer: Mutex::new(stdin),
            child: Mutex::new(child),
            pending,
            reader: std::sync::Mutex::new(Some(reader)),
        }
    }

    async fn write_line(&self, mut json: String) -> Result<(), McpError> {
        json.push('\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| McpError::TransportError {
                endpoint: self.command.clone(),
                reason: format!("failed to write to stdin: {e}"),
            })?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::TransportError {
                endpoint: self.command.clone(),
                reason: format!("failed to flush stdin: {e}"),
            })
    }
}

/// Reader task: route every stdout line to its waiter until EOF.
async fn read_stdout(command: String, stdout: ChildStdout, pending: Arc<PendingRequests>) {
    let mut reader = BufReader::new(stdout);
    let mut line_buf = String::new();
    loop {
        line_buf.clear();
        match reader.read_line(&mut line_buf).await {
            Ok(0) => {
                tracing::info!(command = %command, "stdio endpoint closed stdout");
                break;
            }
            Ok(_) => {
                let trimmed = line_buf.trim();
                if !trimmed.is_empty() {
                    // Non JSON-RPC lines are server log output.
                    pending.dispatch(trimmed);
                }
            }
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "stdio read failed");
                break;
            }
        }
    }
    pending.close();
}

impl McpTransport for StdioTransport {
    fn endpoint(&self) -> &str {
        &self.command
    }

    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, McpError>> {
        Box::pin(async move {
            let id = next_request_id();
            let req = JsonRpcRequest::new(id, method, params);
            let json = serde_json::to_string(&req).map_err(|e| McpError::TransportError {
                endpoint: self.command.clone(),
                reason: format!("failed to serialize request: {e}"),
            })?;

            let waiter = self.pending.register(id)?;
            self.write_line(json).await?;
            waiter.wait().await
        })
    }

    fn notify<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(async move {
            let note = JsonRpcNotification::new(method, params);
            let json = serde_json::to_string(&note).map_err(|e| McpError::TransportError {
                endpoint: self.command.clone(),
                reason: format!("failed to serialize notification: {e}"),
            })?;
            self.write_line(json).await
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pending.close();
            if let Some(handle) = self
                .reader
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
            {
                handle.abort();
            }
            if let Some(mut child) = self.child.lock().await.take() {
                let _ = child.kill().await;
            }
        })
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: -32603,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
