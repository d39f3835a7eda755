//! Configuration: the bundled `config.json` and persisted client settings.

pub mod app;
pub mod client_settings;
pub mod errors;

pub use app::{
    build_mcp_servers_config, load_app_config, load_resource_config, mcp_url, AppConfig,
    McpServersConfig, ResourceConfig,
};
pub use client_settings::ClientSettings;
pub use errors::ConfigError;

use crate::mcp_client::McpEndpoint;

/// Endpoint to connect to: the settings override, else the configured port.
pub fn resolve_endpoint(settings: &ClientSettings, config: Option<&AppConfig>) -> McpEndpoint {
    match settings.mcp_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => McpEndpoint::sse(url),
        _ => McpEndpoint::sse(mcp_url(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoint_prefers_override() {
        let settings = ClientSettings {
            mcp_url: Some("http://localhost:9999/sse".into()),
            ..ClientSettings::default()
        };
        assert_eq!(
            resolve_endpoint(&settings, None),
            McpEndpoint::sse("http://localhost:9999/sse")
        );
    }

    #[test]
    fn test_resolve_endpoint_ignores_blank_override() {
        let settings = ClientSettings {
            mcp_url: Some("  ".into()),
            ..ClientSettings::default()
        };
        assert_eq!(
            resolve_endpoint(&settings, None),
            McpEndpoint::sse("http://127.0.0.1:8088/sse")
        );
    }
}
