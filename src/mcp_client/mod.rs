//! MCP Client: JSON-RPC 2.0 access to the UserBank tool server.
//!
//! This module handles:
//! - The HTTP + SSE transport and the stdio child-process transport
//! - The `initialize` / `tools/list` handshake
//! - A cached, explicitly owned connection with open/close lifecycle
//! - Tool calls raced against a timeout, with JSON envelope decoding

pub mod client;
pub mod connection;
pub mod errors;
pub mod sse;
pub mod sse_transport;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod testing;

// Re-exports for convenience
pub use client::{decode_envelope, ClientSlot, McpClient, DEFAULT_CALL_TIMEOUT};
pub use connection::{Connector, EndpointConnector, McpConnection};
pub use errors::McpError;
pub use transport::McpTransport;
pub use types::{CallToolResult, McpEndpoint, McpToolDefinition, ToolContent};
