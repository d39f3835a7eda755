//! The bundled `config.json` and values derived from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Port the local tool server listens on when none is configured.
pub const DEFAULT_SERVER_PORT: u16 = 8088;

/// Name of the config file inside the resource directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Base name of the bundled stdio server executable.
const STDIO_EXECUTABLE: &str = "UserBank_Stdio_Core";

// ─── AppConfig ──────────────────────────────────────────────────────────────

/// Backend configuration shipped next to the app (`config.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 0 means "use the default port".
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Hours east of UTC.
    #[serde(default)]
    pub timezone_offset: i32,
    #[serde(default)]
    pub privacy_level: String,
}

/// Read and parse a `config.json`.
pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// SSE endpoint of the local tool server.
///
/// The server always binds loopback, so only the port is taken from config.
pub fn mcp_url(config: Option<&AppConfig>) -> String {
    let port = config
        .map(|c| c.server.port)
        .filter(|&p| p != 0)
        .unwrap_or(DEFAULT_SERVER_PORT);
    format!("http://127.0.0.1:{port}/sse")
}

// ─── Resource Directory ─────────────────────────────────────────────────────

/// Outcome of reading `config.json` from the resource directory.
///
/// Failures are reported in `error` rather than raised so the settings
/// panel can show them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub resource_dir: PathBuf,
    pub config: Option<AppConfig>,
    /// Empty when the config loaded.
    pub error: String,
}

pub fn load_resource_config(resource_dir: &Path) -> ResourceConfig {
    let path = resource_dir.join(CONFIG_FILE_NAME);
    match load_app_config(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), port = config.server.port, "loaded app config");
            ResourceConfig {
                resource_dir: resource_dir.to_path_buf(),
                config: Some(config),
                error: String::new(),
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "app config unavailable");
            ResourceConfig {
                resource_dir: resource_dir.to_path_buf(),
                config: None,
                error: e.to_string(),
            }
        }
    }
}

// ─── Editor Integration Block ───────────────────────────────────────────────

/// The `mcpServers` block users paste into editor configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServersConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: McpServerEntries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerEntries {
    #[serde(rename = "userbank-sse")]
    pub sse: SseServerEntry,
    #[serde(rename = "userbank-stdio")]
    pub stdio: StdioServerEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseServerEntry {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioServerEntry {
    pub command: String,
}

/// Platform file name of the stdio server executable.
pub fn stdio_executable_name() -> String {
    if cfg!(windows) {
        format!("{STDIO_EXECUTABLE}.exe")
    } else {
        STDIO_EXECUTABLE.to_string()
    }
}

pub fn build_mcp_servers_config(config: Option<&AppConfig>, resource_dir: &Path) -> McpServersConfig {
    let command = resource_dir.join(stdio_executable_name());
    McpServersConfig {
        mcp_servers: McpServerEntries {
            sse: SseServerEntry {
                url: mcp_url(config),
            },
            stdio: StdioServerEntry {
                command: command.to_string_lossy().into_owned(),
            },
        },
    }
}
