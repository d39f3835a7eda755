//! Tauri IPC commands for the Settings panel.
//!
//! Exposes the bundled `config.json`, the `mcpServers` block for editor
//! integration, and the persisted client settings.

use tauri::State;

use crate::config::{
    build_mcp_servers_config, resolve_endpoint, ClientSettings, McpServersConfig, ResourceConfig,
};
use crate::mcp_client::{ClientSlot, McpClient};
use crate::TokioMutex;

/// Resource directory and the parsed `config.json` (or why it failed).
#[tauri::command]
pub fn get_resource_config(resource: State<'_, ResourceConfig>) -> ResourceConfig {
    resource.inner().clone()
}

/// The block users paste into their editor's MCP configuration.
#[tauri::command]
pub fn get_mcp_servers_config(resource: State<'_, ResourceConfig>) -> McpServersConfig {
    build_mcp_servers_config(resource.config.as_ref(), &resource.resource_dir)
}

#[tauri::command]
pub async fn get_client_settings(
    state: State<'_, TokioMutex<ClientSettings>>,
) -> Result<ClientSettings, String> {
    let cfg = state.lock().await;
    Ok(cfg.clone())
}

/// Update the client settings, persist them, and switch endpoints if the
/// URL changed.
#[tauri::command]
pub async fn update_client_settings(
    settings: ClientSettings,
    state: State<'_, TokioMutex<ClientSettings>>,
    slot: State<'_, ClientSlot>,
    resource: State<'_, ResourceConfig>,
) -> Result<ClientSettings, String> {
    let mut cfg = state.lock().await;
    let previous = std::mem::replace(&mut *cfg, settings.normalized());
    cfg.save();
    tracing::info!(
        mcp_url = ?cfg.mcp_url,
        call_timeout_ms = cfg.call_timeout_ms,
        query_timeout_ms = cfg.query_timeout_ms,
        batch_size = cfg.batch_size,
        "client settings updated"
    );
    switch_endpoint_if_changed(&previous, &cfg, &slot, &resource).await;
    Ok(cfg.clone())
}

/// Reset the client settings to defaults and persist.
#[tauri::command]
pub async fn reset_client_settings(
    state: State<'_, TokioMutex<ClientSettings>>,
    slot: State<'_, ClientSlot>,
    resource: State<'_, ResourceConfig>,
) -> Result<ClientSettings, String> {
    let mut cfg = state.lock().await;
    let previous = std::mem::take(&mut *cfg);
    cfg.save();
    tracing::info!("client settings reset to defaults");
    switch_endpoint_if_changed(&previous, &cfg, &slot, &resource).await;
    Ok(cfg.clone())
}

async fn switch_endpoint_if_changed(
    previous: &ClientSettings,
    current: &ClientSettings,
    slot: &ClientSlot,
    resource: &ResourceConfig,
) {
    let before = resolve_endpoint(previous, resource.config.as_ref());
    let after = resolve_endpoint(current, resource.config.as_ref());
    if before != after {
        slot.replace(McpClient::for_endpoint(after)).await;
    }
}
