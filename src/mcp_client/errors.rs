//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The endpoint could not be reached (HTTP connect, process spawn).
    #[error("failed to connect to '{endpoint}': {reason}")]
    ConnectFailed {
        endpoint: String,
        reason: String,
    },

    /// The initialization handshake failed.
    #[error("initialization with '{endpoint}' failed: {reason}")]
    InitFailed {
        endpoint: String,
        reason: String,
    },

    /// JSON-RPC communication error (malformed message, I/O error).
    #[error("transport error for '{endpoint}': {reason}")]
    TransportError {
        endpoint: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Tool not advertised by the connected server.
    #[error("unknown tool: '{name}'")]
    UnknownTool {
        name: String,
    },

    /// A tool call timed out.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout {
        tool: String,
        timeout_ms: u64,
    },

    /// The tool answered, but not with a decodable JSON envelope.
    #[error("invalid response from '{tool}': {reason}")]
    InvalidResponse {
        tool: String,
        reason: String,
    },

    /// The tool reported a failure (`isError: true`).
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed {
        tool: String,
        message: String,
    },

    /// The connection was closed while a request was in flight.
    #[error("connection to '{endpoint}' closed")]
    Closed {
        endpoint: String,
    },

    /// Configuration error (bad endpoint URL, missing command).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl McpError {
    /// Whether the error means the cached connection should be discarded.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            McpError::ConnectFailed { .. }
                | McpError::TransportError { .. }
                | McpError::Closed { .. }
        )
    }
}
