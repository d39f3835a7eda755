//! An initialized MCP session: transport + handshake + tool catalog.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::errors::McpError;
use super::sse_transport::SseTransport;
use super::transport::{extract_result, McpTransport, StdioTransport};
use super::types::{
    CallToolResult, InitializeResult, ListToolsResult, McpEndpoint, McpToolDefinition,
    ServerInfo, PROTOCOL_VERSION,
};

// ─── Connector ───────────────────────────────────────────────────────────────

/// Opens raw transports. `McpClient` owns one and calls it when its cache
/// is empty.
pub trait Connector: Send + Sync {
    /// Label of the endpoint this connector reaches.
    fn endpoint(&self) -> String;

    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn McpTransport>, McpError>>;
}

/// Connector for a configured `McpEndpoint`.
pub struct EndpointConnector {
    endpoint: McpEndpoint,
}

impl EndpointConnector {
    pub fn new(endpoint: McpEndpoint) -> Self {
        Self { endpoint }
    }
}

impl Connector for EndpointConnector {
    fn endpoint(&self) -> String {
        self.endpoint.label()
    }

    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn McpTransport>, McpError>> {
        Box::pin(async move {
            let transport: Arc<dyn McpTransport> = match &self.endpoint {
                McpEndpoint::Sse { url } => Arc::new(SseTransport::connect(url).await?),
                McpEndpoint::Stdio {
                    command,
                    args,
                    env,
                    cwd,
                } => Arc::new(StdioTransport::spawn(command, args, env, cwd.as_deref())?),
            };
            Ok(transport)
        })
    }
}

// ─── McpConnection ───────────────────────────────────────────────────────────

/// A live, initialized connection with the server's tool list.
pub struct McpConnection {
    transport: Arc<dyn McpTransport>,
    tools: HashMap<String, McpToolDefinition>,
    server_info: Option<ServerInfo>,
}

impl McpConnection {
    /// Run the MCP handshake over `transport` and fetch the tool list.
    ///
    /// `initialize` → `notifications/initialized` → `tools/list`.
    pub async fn establish(transport: Arc<dyn McpTransport>) -> Result<Self, McpError> {
        let endpoint = transport.endpoint().to_string();

        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let response = transport.request("initialize", Some(params)).await?;
        let init: InitializeResult =
            serde_json::from_value(extract_result(response)?).map_err(|e| {
                McpError::InitFailed {
                    endpoint: endpoint.clone(),
                    reason: format!("failed to parse initialize response: {e}"),
                }
            })?;

        transport
            .notify("notifications/initialized", None)
            .await?;

        let response = transport.request("tools/list", None).await?;
        let listed: ListToolsResult =
            serde_json::from_value(extract_result(response)?).map_err(|e| {
                McpError::InitFailed {
                    endpoint: endpoint.clone(),
                    reason: format!("failed to parse tools/list response: {e}"),
                }
            })?;

        let tools: HashMap<String, McpToolDefinition> = listed
            .tools
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        tracing::info!(
            endpoint = %endpoint,
            protocol = ?init.protocol_version,
            server = ?init.server_info.as_ref().and_then(|s| s.name.clone()),
            tool_count = tools.len(),
            "MCP connection initialized"
        );

        Ok(Self {
            transport,
            tools,
            server_info: init.server_info,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names advertised by the server.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Invoke a tool by name.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        if !self.has_tool(name) {
            return Err(McpError::UnknownTool {
                name: name.to_string(),
            });
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let response = self.transport.request("tools/call", Some(params)).await?;
        let result = extract_result(response)?;

        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
            tool: name.to_string(),
            reason: format!("malformed tools/call result: {e}"),
        })
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
