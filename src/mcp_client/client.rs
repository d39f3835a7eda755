//! MCP Client: high-level interface for tool execution.
//!
//! Owns a single cached connection to the tool server. The cache is an
//! explicit handle with an open/close lifecycle; callers share the client
//! through an `Arc` instead of a process-wide global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::connection::{Connector, EndpointConnector, McpConnection};
use super::errors::McpError;
use super::types::{CallToolResult, McpEndpoint};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for tool call execution.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before a one-shot connection is closed after its call returns.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

// ─── McpClient ───────────────────────────────────────────────────────────────

/// MCP client with a reusable, lazily opened connection.
pub struct McpClient {
    connector: Arc<dyn Connector>,
    /// Held across connection setup so concurrent callers wait for, and then
    /// share, the connection being opened.
    cache: Mutex<Option<Arc<McpConnection>>>,
    disconnect_grace: Duration,
}

impl McpClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            cache: Mutex::new(None),
            disconnect_grace: DISCONNECT_GRACE,
        }
    }

    /// Client for a configured endpoint (SSE URL or stdio command).
    pub fn for_endpoint(endpoint: McpEndpoint) -> Self {
        Self::new(Arc::new(EndpointConnector::new(endpoint)))
    }

    /// Override the close delay used by [`McpClient::call_tool_once`].
    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Return the cached connection, opening it if needed.
    ///
    /// A failed setup leaves the cache empty; the next call retries.
    pub async fn connection(&self) -> Result<Arc<McpConnection>, McpError> {
        let mut slot = self.cache.lock().await;
        if let Some(conn) = slot.as_ref() {
            tracing::debug!(endpoint = %conn.endpoint(), "reusing MCP connection");
            return Ok(Arc::clone(conn));
        }

        tracing::info!(endpoint = %self.connector.endpoint(), "opening MCP connection");
        let conn = Arc::new(self.open().await?);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Open a fresh connection that bypasses the cache.
    async fn open(&self) -> Result<McpConnection, McpError> {
        let transport = self.connector.connect().await?;
        match McpConnection::establish(Arc::clone(&transport)).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    /// Close and forget the cached connection. Never fails.
    pub async fn close(&self) {
        let conn = self.cache.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await;
            tracing::info!(endpoint = %conn.endpoint(), "MCP connection closed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.cache.lock().await.is_some()
    }

    /// Tool names of the cached connection (empty when not connected).
    pub async fn cached_tool_names(&self) -> Vec<String> {
        self.cache
            .lock()
            .await
            .as_ref()
            .map(|c| c.tool_names())
            .unwrap_or_default()
    }

    // ─── Tool Execution ──────────────────────────────────────────────────

    /// Invoke a tool over the cached connection and decode its JSON envelope.
    ///
    /// The timeout covers obtaining the connection as well as the call.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, McpError> {
        let start = Instant::now();
        tracing::debug!(tool = tool_name, params = %params, "calling MCP tool");

        let call = async {
            let conn = self.connection().await?;
            conn.call_tool(tool_name, params).await
        };

        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = tool_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "MCP tool call timed out"
                );
                return Err(McpError::Timeout {
                    tool: tool_name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                if e.is_connection_error() {
                    tracing::warn!(tool = tool_name, error = %e, "dropping broken MCP connection");
                    self.close().await;
                } else {
                    tracing::error!(tool = tool_name, error = %e, "MCP tool call failed");
                }
                return Err(e);
            }
        };

        let value = decode_envelope(tool_name, result)?;
        tracing::debug!(
            tool = tool_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "MCP tool call completed"
        );
        Ok(value)
    }

    /// Invoke a tool over a private connection that is closed afterwards.
    ///
    /// The close happens on a detached task after a short grace delay so the
    /// server can finish flushing the response.
    pub async fn call_tool_once(
        &self,
        tool_name: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, McpError> {
        let grace = self.disconnect_grace;
        let call = async {
            let conn = Arc::new(self.open().await?);
            let result = conn.call_tool(tool_name, params).await;

            let closing = Arc::clone(&conn);
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                closing.close().await;
            });

            result
        };

        let result = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| McpError::Timeout {
                tool: tool_name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        decode_envelope(tool_name, result)
    }
}

/// Parse the JSON document carried in the first text chunk of a tool result.
pub fn decode_envelope(
    tool_name: &str,
    result: CallToolResult,
) -> Result<serde_json::Value, McpError> {
    let text = result
        .content
        .first()
        .and_then(|chunk| chunk.text.as_deref())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| McpError::InvalidResponse {
            tool: tool_name.to_string(),
            reason: "tool returned no valid response".into(),
        })?;

    if result.is_error {
        return Err(McpError::ToolFailed {
            tool: tool_name.to_string(),
            message: text.to_string(),
        });
    }

    serde_json::from_str(text).map_err(|e| McpError::InvalidResponse {
        tool: tool_name.to_string(),
        reason: format!("failed to parse response: {e}"),
    })
}

// ─── ClientSlot ──────────────────────────────────────────────────────────────

/// The app's current client. Swapped when the endpoint changes.
pub struct ClientSlot {
    current: Mutex<Arc<McpClient>>,
}

impl ClientSlot {
    pub fn new(client: McpClient) -> Self {
        Self {
            current: Mutex::new(Arc::new(client)),
        }
    }

    pub async fn current(&self) -> Arc<McpClient> {
        Arc::clone(&*self.current.lock().await)
    }

    /// Install a new client and close the previous one's connection.
    pub async fn replace(&self, client: McpClient) -> Arc<McpClient> {
        let client = Arc::new(client);
        let old = std::mem::replace(&mut *self.current.lock().await, Arc::clone(&client));
        old.close().await;
        tracing::info!(
            from = %old.endpoint(),
            to = %client.endpoint(),
            "MCP client replaced"
        );
        client
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
