//! Raw SQL passthrough to the `execute_custom_sql` tool.

use serde_json::{json, Map, Value};

use super::errors::ProfileError;
use super::service::ProfileService;
use super::tables::ProfileTable;
use super::types::SqlResult;

const SQL_TOOL: &str = "execute_custom_sql";

/// Arguments for `execute_custom_sql`; `params` is omitted when empty.
pub fn build_sql_params(sql: &str, params: &[String], fetch_results: bool) -> Value {
    let mut args = Map::new();
    args.insert("sql".into(), Value::String(sql.to_string()));
    args.insert("fetch_results".into(), Value::Bool(fetch_results));
    if !params.is_empty() {
        args.insert("params".into(), json!(params));
    }
    Value::Object(args)
}

/// Rows created in the last `days` days across all tables, newest first.
pub fn recent_records_sql(days: u32, limit: u32) -> String {
    let selects: Vec<String> = ProfileTable::ALL
        .iter()
        .map(|t| {
            format!(
                "SELECT '{name}' AS table_name, id, content, created_time FROM {name} \
                 WHERE created_time >= datetime('now', '-{days} days')",
                name = t.as_str()
            )
        })
        .collect();
    format!(
        "{} ORDER BY created_time DESC LIMIT {limit}",
        selects.join(" UNION ALL ")
    )
}

/// Row count of every table.
pub fn table_counts_sql() -> String {
    ProfileTable::ALL
        .iter()
        .map(|t| {
            format!(
                "SELECT '{name}' AS table_name, '{desc}' AS description, \
                 COUNT(*) AS total_records FROM {name}",
                name = t.as_str(),
                desc = t.description()
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

impl ProfileService {
    /// Run a statement and return the server's result unchanged.
    pub async fn execute_custom_sql(
        &self,
        sql: &str,
        params: &[String],
        fetch_results: bool,
    ) -> Result<SqlResult, ProfileError> {
        tracing::info!(sql, params = params.len(), fetch_results, "executing custom SQL");
        let response = self
            .client
            .call_tool(
                SQL_TOOL,
                build_sql_params(sql, params, fetch_results),
                self.settings.call_timeout(),
            )
            .await?;
        serde_json::from_value(response).map_err(|e| ProfileError::malformed(SQL_TOOL, e))
    }

    /// Rows from a successful query, else `Rejected` with the server message.
    async fn query_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Value>, ProfileError> {
        let result = self.execute_custom_sql(sql, params, true).await?;
        if !result.success {
            return Err(ProfileError::Rejected {
                tool: SQL_TOOL.to_string(),
                message: result
                    .message
                    .unwrap_or_else(|| "query failed".to_string()),
            });
        }
        Ok(result.rows().to_vec())
    }

    pub async fn recent_records(&self, days: u32, limit: u32) -> Result<Vec<Value>, ProfileError> {
        self.query_rows(&recent_records_sql(days, limit), &[]).await
    }

    pub async fn table_counts(&self) -> Result<Vec<Value>, ProfileError> {
        self.query_rows(&table_counts_sql(), &[]).await
    }

    /// One row by id, or `None` when it does not exist.
    pub async fn get_record(
        &self,
        table: ProfileTable,
        id: i64,
    ) -> Result<Option<Value>, ProfileError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", table.as_str());
        let rows = self.query_rows(&sql, &[id.to_string()]).await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientSettings;
    use crate::mcp_client::testing::FakeServer;
    use crate::mcp_client::McpClient;

    fn service(server: &FakeServer) -> ProfileService {
        ProfileService::new(
            Arc::new(McpClient::new(server.connector())),
            ClientSettings::default(),
        )
    }

    #[test]
    fn test_params_omitted_when_empty() {
        assert_eq!(
            build_sql_params("SELECT 1", &[], true),
            json!({"sql": "SELECT 1", "fetch_results": true})
        );
        assert_eq!(
            build_sql_params("SELECT ?", &["a".into()], false)["params"],
            json!(["a"])
        );
    }

    #[test]
    fn test_recent_records_sql_covers_all_tables() {
        let sql = recent_records_sql(7, 10);
        for table in ProfileTable::ALL {
            assert!(sql.contains(&format!("FROM {} WHERE", table.as_str())));
        }
        assert_eq!(sql.matches("UNION ALL").count(), 7);
        assert!(sql.contains("'-7 days'"));
        assert!(sql.ends_with("ORDER BY created_time DESC LIMIT 10"));
    }

    #[test]
    fn test_table_counts_sql() {
        let sql = table_counts_sql();
        assert_eq!(sql.matches("COUNT(*)").count(), 8);
        assert!(sql.starts_with("SELECT 'memory' AS table_name"));
    }

    #[tokio::test]
    async fn test_result_passed_through() {
        let server = FakeServer::new().with_tool(SQL_TOOL, |_| {
            Ok(r#"{"success": true, "data": [{"id": 1}], "rowcount": 1, "columns": ["id"]}"#.into())
        });
        let result = service(&server)
            .execute_custom_sql("SELECT id FROM goal", &[], true)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.rows(), &[json!({"id": 1})]);
        assert_eq!(result.extra["columns"], json!(["id"]));
    }

    #[tokio::test]
    async fn test_tool_error_surfaces() {
        let server = FakeServer::new().with_tool(SQL_TOOL, |_| Err("syntax error".into()));
        let err = service(&server)
            .execute_custom_sql("SELEC", &[], true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[tokio::test]
    async fn test_get_record() {
        let server = FakeServer::new().with_tool(SQL_TOOL, |args| {
            let found = args["params"][0] == "3";
            let rows = if found { json!([{"id": 3}]) } else { json!([]) };
            Ok(json!({"success": true, "results": rows}).to_string())
        });
        let svc = service(&server);

        let row = svc.get_record(ProfileTable::Goal, 3).await.unwrap();
        assert_eq!(row, Some(json!({"id": 3})));
        assert!(svc.get_record(ProfileTable::Goal, 4).await.unwrap().is_none());
        assert_eq!(
            server.calls_to(SQL_TOOL)[0]["sql"],
            "SELECT * FROM goal WHERE id = ?"
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_query_is_rejected() {
        let server = FakeServer::new().with_tool(SQL_TOOL, |_| {
            Ok(r#"{"success": false, "message": "no such table"}"#.into())
        });
        let err = service(&server).table_counts().await.unwrap_err();
        match err {
            ProfileError::Rejected { message, .. } => assert_eq!(message, "no such table"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
