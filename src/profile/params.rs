//! Argument builders for the `manage_*` tools.

use serde_json::{json, Map, Value};

use super::types::{QueryParams, RecordFilter, SortOrder};

pub const DEFAULT_SORT_BY: &str = "created_time";
pub const DEFAULT_LIMIT: u32 = 20;

/// `{action: "query", filter, sort_by, sort_order, limit, offset}` with
/// defaults for everything the caller left unset.
pub fn build_query_params(params: &QueryParams) -> Value {
    json!({
        "action": "query",
        "filter": params.filter.clone().unwrap_or_default(),
        "sort_by": params.sort_by.as_deref().unwrap_or(DEFAULT_SORT_BY),
        "sort_order": params.sort_order.unwrap_or_default(),
        "limit": params.limit.unwrap_or(DEFAULT_LIMIT),
        "offset": params.offset.unwrap_or(0),
    })
}

/// `{action: "save", ...record}`. The action is always `save`.
pub fn build_save_params(record: &Map<String, Value>) -> Value {
    let mut params = record.clone();
    params.insert("action".into(), Value::String("save".into()));
    Value::Object(params)
}

/// Filter for the search box: substring on content, any-of on keywords.
pub fn search_filter(keyword: Option<&str>, topic: Option<&str>) -> RecordFilter {
    RecordFilter {
        content_contains: keyword.filter(|k| !k.is_empty()).map(str::to_string),
        keywords_contain_any: topic.filter(|t| !t.is_empty()).map(|t| vec![t.to_string()]),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let params = build_query_params(&QueryParams::default());
        assert_eq!(
            params,
            json!({
                "action": "query",
                "filter": {},
                "sort_by": "created_time",
                "sort_order": "desc",
                "limit": 20,
                "offset": 0,
            })
        );
    }

    #[test]
    fn test_query_overrides() {
        let params = build_query_params(&QueryParams {
            filter: Some(search_filter(Some("rust"), None)),
            sort_by: Some("updated_time".into()),
            sort_order: Some(SortOrder::Asc),
            limit: Some(100),
            offset: Some(40),
        });
        assert_eq!(params["filter"], json!({"content_contains": "rust"}));
        assert_eq!(params["sort_by"], "updated_time");
        assert_eq!(params["sort_order"], "asc");
        assert_eq!(params["limit"], 100);
        assert_eq!(params["offset"], 40);
    }

    #[test]
    fn test_save_params() {
        let mut record = Map::new();
        record.insert("id".into(), json!(7));
        record.insert("content".into(), json!("updated"));
        record.insert("action".into(), json!("delete"));

        let params = build_save_params(&record);
        assert_eq!(
            params,
            json!({"action": "save", "id": 7, "content": "updated"})
        );
    }

    #[test]
    fn test_search_filter() {
        let filter = search_filter(Some("tea"), Some("health"));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"content_contains": "tea", "keywords_contain_any": ["health"]})
        );
        assert_eq!(
            serde_json::to_value(search_filter(None, Some(""))).unwrap(),
            json!({})
        );
    }
}
