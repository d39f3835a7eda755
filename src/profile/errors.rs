//! Profile error types.

use thiserror::Error;

use crate::mcp_client::McpError;

/// Errors that can occur while reading or writing profile tables.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Table name is not one of the eight profile tables.
    #[error("unsupported table: '{name}'")]
    UnknownTable { name: String },

    /// A record was submitted without content.
    #[error("record content must not be empty")]
    EmptyContent,

    /// The server answered but the payload did not have the expected shape.
    #[error("unexpected response from '{tool}': {reason}")]
    MalformedResponse { tool: String, reason: String },

    /// The server reported the operation as unsuccessful.
    #[error("operation rejected by '{tool}': {message}")]
    Rejected { tool: String, message: String },

    /// Tool call failed (wraps McpError).
    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl ProfileError {
    pub fn malformed(tool: &str, e: impl std::fmt::Display) -> Self {
        ProfileError::MalformedResponse {
            tool: tool.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_error_converts() {
        let err: ProfileError = McpError::UnknownTool {
            name: "manage_goals".into(),
        }
        .into();
        assert!(matches!(err, ProfileError::Mcp(McpError::UnknownTool { .. })));
        assert!(err.to_string().contains("manage_goals"));
    }

    #[test]
    fn test_unknown_table_message() {
        let err = ProfileError::UnknownTable {
            name: "relations".into(),
        };
        assert_eq!(err.to_string(), "unsupported table: 'relations'");
    }
}
