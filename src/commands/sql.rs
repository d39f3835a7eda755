//! Tauri IPC commands for the SQL query panel.

use tauri::State;

use crate::config::ClientSettings;
use crate::mcp_client::ClientSlot;
use crate::profile::{ProfileService, ProfileTable, SqlResult};
use crate::TokioMutex;

async fn service(slot: &ClientSlot, settings: &TokioMutex<ClientSettings>) -> ProfileService {
    ProfileService::new(slot.current().await, settings.lock().await.clone())
}

/// Run the statement typed into the panel. The result is returned as-is.
#[tauri::command]
pub async fn execute_custom_sql(
    sql: String,
    params: Option<Vec<String>>,
    fetch_results: Option<bool>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<SqlResult, String> {
    if sql.trim().is_empty() {
        return Err("SQL statement is empty".into());
    }
    service(&slot, &settings)
        .await
        .execute_custom_sql(&sql, &params.unwrap_or_default(), fetch_results.unwrap_or(true))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_recent_records(
    days: Option<u32>,
    limit: Option<u32>,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Vec<serde_json::Value>, String> {
    service(&slot, &settings)
        .await
        .recent_records(days.unwrap_or(7), limit.unwrap_or(10))
        .await
        .map_err(|e| e.to_string())
}

/// Row count of every table, from one UNION ALL query.
#[tauri::command]
pub async fn get_table_counts(
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Vec<serde_json::Value>, String> {
    service(&slot, &settings)
        .await
        .table_counts()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_record(
    table: String,
    id: i64,
    slot: State<'_, ClientSlot>,
    settings: State<'_, TokioMutex<ClientSettings>>,
) -> Result<Option<serde_json::Value>, String> {
    let table = ProfileTable::parse(&table).map_err(|e| e.to_string())?;
    service(&slot, &settings)
        .await
        .get_record(table, id)
        .await
        .map_err(|e| e.to_string())
}
