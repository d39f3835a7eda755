//! Tauri IPC commands for the profile data view.

use serde::Serialize;
use tauri::State;

use crate::config::{resolve_endpoint, ClientSettings, ResourceConfig};
use crate::mcp_client::{ClientSlot, McpClient};
use crate::profile::view::{TabCount, ViewRecord, ViewState};
use crate::profile::{
    FetchReport, Persona, ProfileRecord, ProfileService, ProfileTable, QueryPage, QueryParams,
    TableStats,
};
use crate::TokioMutex;

/// Connection status shown in the header bar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpStatusInfo {
    pub endpoint: String,
    pub connected: bool,
    pub tools: Vec<String>,
    pub error: Option<String>,
    pub checked_at: String,
}

/// Service over the current client with a snapshot of the settings.
async fn service(
    slot: &ClientSlot,
    settings: &TokioMutex<ClientSettings>,
) -> ProfileService {
    let client = slot.current().await;
    let settings = settings.lock().await.clone();
    ProfileService::new(client, settings)
}

fn parse_table(name: &str) -> Result<ProfileTable, String> {
    ProfileTable::parse(name).map_err(|e| e.to_string())
}

/// Fetch the persona and all tables, and remember the result for the view.
#[tauri::command]
pub async fn get_all_table_contents(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
    view: State<'_, TokioMutex<ViewState>>,
) -> Result<FetchReport, String> {
    let svc = service(&slot, &settings).await;
    let report = svc.fetch_all_tables(&svc.fetch_plan()).await;
    view.lock().await.replace(report.data.clone());
    Ok(report)
}

#[tauri::command]
pub async fn get_table_stats(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Vec<TableStats>, String> {
    Ok(service(&slot, &settings).await.get_table_stats().await)
}

#[tauri::command]
pub async fn query_records(
    table: String,
    params: Option<QueryParams>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<QueryPage, String> {
    let table = parse_table(&table)?;
    service(&slot, &settings)
        .await
        .query_records(table, &params.unwrap_or_default())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search_records(
    table: String,
    keyword: Option<String>,
    topic: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Vec<ProfileRecord>, String> {
    let table = parse_table(&table)?;
    service(&slot, &settings)
        .await
        .search_records(
            table,
            keyword.as_deref(),
            topic.as_deref(),
            limit.unwrap_or(crate::profile::params::DEFAULT_LIMIT),
            offset.unwrap_or(0),
        )
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn add_record(
    table: String,
    content: String,
    keywords: Option<Vec<String>>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<bool, String> {
    let table = parse_table(&table)?;
    service(&slot, &settings)
        .await
        .add_record(table, &content, keywords)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_record(
    table: String,
    id: i64,
    content: Option<String>,
    keywords: Option<Vec<String>>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<bool, String> {
    let table = parse_table(&table)?;
    service(&slot, &settings)
        .await
        .update_record(table, id, content.as_deref(), keywords)
        .await
        .map_err(|e| e.to_string())
}

/// Delete a record and hide it from the view on success.
#[tauri::command]
pub async fn delete_record(
    table: String,
    id: i64,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
    view: State<'_, TokioMutex<ViewState>>,
) -> Result<bool, String> {
    let table = parse_table(&table)?;
    let deleted = service(&slot, &settings)
        .await
        .delete_record(table, id)
        .await
        .map_err(|e| e.to_string())?;
    if deleted {
        view.lock().await.deleted.mark(table, id);
    }
    Ok(deleted)
}

#[tauri::command]
pub async fn get_persona(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Option<Persona>, String> {
    service(&slot, &settings)
        .await
        .get_persona()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn save_persona(
    persona: Persona,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<bool, String> {
    service(&slot, &settings)
        .await
        .save_persona(&persona)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_table_schema(
    table: Option<String>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<serde_json::Value, String> {
    let table = table.as_deref().map(parse_table).transpose()?;
    service(&slot, &settings)
        .await
        .get_table_schema(table)
        .await
        .map_err(|e| e.to_string())
}

/// Drop the current connection, rebuild the client from settings, and
/// connect again.
#[tauri::command]
pub async fn reconnect_mcp(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
    resource: State<'_, ResourceConfig>,
) -> Result<McpStatusInfo, String> {
    let endpoint = {
        let settings = settings.lock().await;
        resolve_endpoint(&settings, resource.config.as_ref())
    };
    let client = slot.replace(McpClient::for_endpoint(endpoint)).await;

    let status = match client.connection().await {
        Ok(conn) => McpStatusInfo {
            endpoint: client.endpoint(),
            connected: true,
            tools: conn.tool_names(),
            error: None,
            checked_at: chrono::Utc::now().to_rfc3339(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "MCP reconnect failed");
            McpStatusInfo {
                endpoint: client.endpoint(),
                connected: false,
                tools: Vec::new(),
                error: Some(e.to_string()),
                checked_at: chrono::Utc::now().to_rfc3339(),
            }
        }
    };
    Ok(status)
}

/// Status of the cached connection, without connecting.
#[tauri::command]
pub async fn mcp_status(slot: State<'_, ClientSlot>) -> Result<McpStatusInfo, String> {
    let client = slot.current().await;
    Ok(McpStatusInfo {
        endpoint: client.endpoint(),
        connected: client.is_connected().await,
        tools: client.cached_tool_names().await,
        error: None,
        checked_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Check that the server answers, over a connection of its own.
#[tauri::command]
pub async fn check_mcp_server(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<serde_json::Value, String> {
    service(&slot, &settings)
        .await
        .check_server()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "MCP server check failed");
            e.to_string()
        })
}

// ─── View ────────────────────────────────────────────────────────────────────

/// Rows of a tab (`all` or a table) after search, tag, and delete mask.
#[tauri::command]
pub async fn get_view_records(
    tab: String,
    search: Option<String>,
    tag: Option<String>,
    view: State<'_, TokioMutex<ViewState>>,
) -> Result<Vec<ViewRecord>, String> {
    view.lock()
        .await
        .visible(
            &tab,
            search.as_deref().unwrap_or_default(),
            tag.as_deref().unwrap_or_default(),
        )
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_all_tags(view: State<'_, TokioMutex<ViewState>>) -> Result<Vec<String>, String> {
    Ok(view.lock().await.tags())
}

#[tauri::command]
pub async fn get_tab_counts(
    view: State<'_, TokioMutex<ViewState>>,
) -> Result<Vec<TabCount>, String> {
    Ok(view.lock().await.counts())
}
