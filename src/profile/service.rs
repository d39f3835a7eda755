//! Record and persona operations over the `manage_*` tools.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::errors::ProfileError;
use super::params::{build_query_params, build_save_params, search_filter};
use super::tables::ProfileTable;
use super::types::{Persona, ProfileRecord, QueryPage, QueryParams, TableStats};
use crate::config::ClientSettings;
use crate::mcp_client::McpClient;

/// Profile operations bound to a client handle and a settings snapshot.
///
/// Cheap to build; IPC commands create one per call.
#[derive(Clone)]
pub struct ProfileService {
    pub(crate) client: Arc<McpClient>,
    pub(crate) settings: ClientSettings,
}

impl ProfileService {
    pub fn new(client: Arc<McpClient>, settings: ClientSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    // ─── Persona ─────────────────────────────────────────────────────────

    /// The stored persona, or `None` when the server has none.
    pub async fn get_persona(&self) -> Result<Option<Persona>, ProfileError> {
        let tool = "get_persona";
        let response = self
            .client
            .call_tool(tool, json!({}), self.settings.save_timeout())
            .await?;

        match response.get("raw_data") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| ProfileError::malformed(tool, e)),
        }
    }

    /// Returns true when the server created or updated the persona.
    pub async fn save_persona(&self, persona: &Persona) -> Result<bool, ProfileError> {
        let tool = "save_persona";
        let params = serde_json::to_value(persona).map_err(|e| ProfileError::malformed(tool, e))?;
        let response = self
            .client
            .call_tool(tool, params, self.settings.save_timeout())
            .await?;
        Ok(is_saved(&response))
    }

    // ─── Records ─────────────────────────────────────────────────────────

    pub async fn query_records(
        &self,
        table: ProfileTable,
        params: &QueryParams,
    ) -> Result<QueryPage, ProfileError> {
        let tool = table.tool_name();
        let response = self
            .client
            .call_tool(tool, build_query_params(params), self.settings.query_timeout())
            .await?;
        let page = decode_page(tool, &response)?;
        tracing::debug!(
            table = %table,
            records = page.records.len(),
            total = page.total_count,
            "queried records"
        );
        Ok(page)
    }

    /// Returns true when the server created or updated the record.
    pub async fn save_record(
        &self,
        table: ProfileTable,
        record: &Map<String, Value>,
    ) -> Result<bool, ProfileError> {
        let response = self
            .client
            .call_tool(
                table.tool_name(),
                build_save_params(record),
                self.settings.save_timeout(),
            )
            .await?;
        let saved = is_saved(&response);
        if !saved {
            tracing::warn!(table = %table, response = %response, "record not saved");
        }
        Ok(saved)
    }

    pub async fn search_records(
        &self,
        table: ProfileTable,
        keyword: Option<&str>,
        topic: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ProfileRecord>, ProfileError> {
        let params = QueryParams {
            filter: Some(search_filter(keyword, topic)),
            limit: Some(limit),
            offset: Some(offset),
            ..QueryParams::default()
        };
        Ok(self.query_records(table, &params).await?.records)
    }

    /// Save a new record. Blank content is rejected before any call.
    pub async fn add_record(
        &self,
        table: ProfileTable,
        content: &str,
        keywords: Option<Vec<String>>,
    ) -> Result<bool, ProfileError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ProfileError::EmptyContent);
        }

        let mut record = Map::new();
        record.insert("content".into(), Value::String(content.to_string()));
        if let Some(keywords) = keywords {
            record.insert("keywords".into(), json!(keywords));
        }
        self.save_record(table, &record).await
    }

    /// Update only the fields that were provided.
    pub async fn update_record(
        &self,
        table: ProfileTable,
        id: i64,
        content: Option<&str>,
        keywords: Option<Vec<String>>,
    ) -> Result<bool, ProfileError> {
        let mut record = Map::new();
        record.insert("id".into(), json!(id));
        if let Some(content) = content.filter(|c| !c.is_empty()) {
            record.insert("content".into(), Value::String(content.to_string()));
        }
        if let Some(keywords) = keywords {
            record.insert("keywords".into(), json!(keywords));
        }
        self.save_record(table, &record).await
    }

    /// Delete by id through the SQL tool; the `manage_*` tools cannot delete.
    pub async fn delete_record(&self, table: ProfileTable, id: i64) -> Result<bool, ProfileError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table.as_str());
        let result = self
            .execute_custom_sql(&sql, &[id.to_string()], false)
            .await?;
        if result.success {
            tracing::info!(table = %table, id, "record deleted");
        } else {
            tracing::warn!(table = %table, id, message = ?result.message, "delete rejected");
        }
        Ok(result.success)
    }

    // ─── Schema & Stats ──────────────────────────────────────────────────

    /// Column information for one table, or for all tables when `None`.
    pub async fn get_table_schema(
        &self,
        table: Option<ProfileTable>,
    ) -> Result<Value, ProfileError> {
        let params = match table {
            Some(t) => json!({ "table_name": t.as_str() }),
            None => json!({}),
        };
        Ok(self
            .client
            .call_tool("get_table_schema", params, self.settings.call_timeout())
            .await?)
    }

    /// Ask the server for its schema over a throwaway connection.
    ///
    /// Leaves the cached connection alone, so it can check a server while
    /// the data view stays connected (or disconnected).
    pub async fn check_server(&self) -> Result<Value, ProfileError> {
        Ok(self
            .client
            .call_tool_once("get_table_schema", json!({}), self.settings.call_timeout())
            .await?)
    }

    /// Per-table totals, computed from a full fetch.
    pub async fn get_table_stats(&self) -> Vec<TableStats> {
        let report = self.fetch_all_tables(&self.fetch_plan()).await;
        report
            .data
            .tables
            .iter()
            .map(|(table, data)| TableStats {
                table_name: *table,
                description: table.as_str().to_string(),
                total_records: data.stats.total_records,
            })
            .collect()
    }
}

/// `operation` of a save response is `created` or `updated`.
pub fn is_saved(response: &Value) -> bool {
    matches!(
        response.get("operation").and_then(Value::as_str),
        Some("created" | "updated")
    )
}

/// Decode a `manage_*` query response.
///
/// A missing `raw_data` means no rows. Rows that cannot be decoded are
/// skipped. A zero or missing `total_count` falls back to the number of
/// rows returned.
pub fn decode_page(tool: &str, response: &Value) -> Result<QueryPage, ProfileError> {
    let rows = match response.get("raw_data") {
        None | Some(Value::Null) => return Ok(QueryPage::default()),
        Some(Value::Array(rows)) => rows,
        Some(other) => {
            return Err(ProfileError::malformed(
                tool,
                format!("raw_data is not a list: {other}"),
            ))
        }
    };

    let records: Vec<ProfileRecord> = rows
        .iter()
        .cloned()
        .filter_map(|row| match ProfileRecord::from_raw(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(tool, error = %e, "skipping undecodable row");
                None
            }
        })
        .collect();

    let total_count = response
        .get("total_count")
        .and_then(Value::as_u64)
        .filter(|&n| n > 0)
        .unwrap_or(records.len() as u64);

    Ok(QueryPage {
        records,
        total_count,
    })
}
