//! Record, persona, and result types exchanged with the tool server.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::tables::ProfileTable;

// ─── Records ────────────────────────────────────────────────────────────────

/// A row from one of the profile tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Row ID. Absent only on records that have not been saved yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    /// `public` or `private`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<String>,
    /// Table-specific columns (priority, status, deadline, reference_urls, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileRecord {
    /// Decode a raw row, normalizing JSON-encoded list columns first.
    pub fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        let raw = match raw {
            Value::Object(mut map) => {
                normalize_fields(&mut map);
                Value::Object(map)
            }
            other => other,
        };
        serde_json::from_value(raw)
    }

    /// A string-valued table-specific column.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Columns the server may return as JSON text instead of arrays.
const LIST_FIELDS: [&str; 2] = ["keywords", "reference_urls"];

/// Decode list columns stored as JSON strings; undecodable strings become
/// empty lists. Null content and keywords are replaced with empty values.
fn normalize_fields(map: &mut Map<String, Value>) {
    for field in LIST_FIELDS {
        if let Some(Value::String(text)) = map.get(field) {
            let decoded = match serde_json::from_str::<Value>(text) {
                Ok(list @ Value::Array(_)) => list,
                _ => Value::Array(Vec::new()),
            };
            map.insert(field.to_string(), decoded);
        }
    }
    let keywords = match map.remove("keywords") {
        None => None,
        Some(Value::Array(items)) => Some(Value::Array(
            items.into_iter().filter_map(keyword_text).collect(),
        )),
        Some(_) => Some(Value::Array(Vec::new())),
    };
    if let Some(keywords) = keywords {
        map.insert("keywords".into(), keywords);
    }
    if map.get("content").is_some_and(Value::is_null) {
        map.insert("content".into(), Value::String(String::new()));
    }
}

/// Keyword items that are not strings (numbers, booleans) keep their JSON
/// text; nulls are dropped.
fn keyword_text(item: Value) -> Option<Value> {
    match item {
        Value::Null => None,
        Value::String(_) => Some(item),
        other => Some(Value::String(other.to_string())),
    }
}

/// A record is usable when it has an id and non-blank content.
pub fn validate_record(record: &ProfileRecord) -> bool {
    record.id.is_some() && !record.content.trim().is_empty()
}

// ─── Persona ────────────────────────────────────────────────────────────────

/// The single user-profile row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ─── Aggregated Data ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub total_records: u64,
}

/// Records of one table plus its total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub description: String,
    pub records: Vec<ProfileRecord>,
    pub stats: RecordCount,
}

impl TableData {
    pub fn empty(table: ProfileTable) -> Self {
        Self {
            description: table.description().to_string(),
            records: Vec::new(),
            stats: RecordCount::default(),
        }
    }
}

/// Everything the data view renders: the persona and all eight tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
    /// Always holds an entry for every table.
    #[serde(flatten)]
    pub tables: BTreeMap<ProfileTable, TableData>,
}

impl ProfileData {
    /// No persona and an empty entry for every table.
    pub fn empty() -> Self {
        Self {
            persona: None,
            tables: ProfileTable::ALL
                .into_iter()
                .map(|t| (t, TableData::empty(t)))
                .collect(),
        }
    }

    pub fn table(&self, table: ProfileTable) -> Option<&TableData> {
        self.tables.get(&table)
    }

    /// Replace a table's records and total.
    pub fn set_table(&mut self, table: ProfileTable, page: QueryPage) {
        let entry = self
            .tables
            .entry(table)
            .or_insert_with(|| TableData::empty(table));
        entry.records = page.records;
        entry.stats.total_records = page.total_count;
    }
}

impl Default for ProfileData {
    fn default() -> Self {
        Self::empty()
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub records: Vec<ProfileRecord>,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub table_name: ProfileTable,
    pub description: String,
    pub total_records: u64,
}

// ─── SQL ────────────────────────────────────────────────────────────────────

/// Result of `execute_custom_sql`, passed through as the server sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rows, older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    /// Rows, newer servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowcount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrowid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SqlResult {
    /// Returned rows: `results` when present, else `data`.
    pub fn rows(&self) -> &[Value] {
        self.results
            .as_deref()
            .or(self.data.as_deref())
            .unwrap_or_default()
    }
}

// ─── Query Parameters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter understood by the `manage_*` tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_contain_any: Option<Vec<String>>,
    /// Any other server-side filter keys, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Caller-facing query options; unset fields take the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub filter: Option<RecordFilter>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl QueryParams {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}
