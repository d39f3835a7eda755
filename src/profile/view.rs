//! Client-side view state: merged rows, filtering, tags, and the delete mask.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use super::errors::ProfileError;
use super::tables::ProfileTable;
use super::types::{ProfileData, ProfileRecord};

/// Key of the synthetic "all tables" tab.
pub const ALL_TABLES_KEY: &str = "all";

/// `<table>-<id>`, unique across tables.
pub fn unique_key(table: ProfileTable, id: Option<i64>) -> String {
    match id {
        Some(id) => format!("{table}-{id}"),
        None => format!("{table}-new"),
    }
}

// ─── DeletedSet ─────────────────────────────────────────────────────────────

/// Rows hidden after a successful remote delete.
///
/// Never reconciled against later fetches; cleared only explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletedSet {
    keys: HashSet<String>,
}

impl DeletedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, table: ProfileTable, id: i64) {
        self.keys.insert(unique_key(table, Some(id)));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

// ─── Rows ───────────────────────────────────────────────────────────────────

/// A record tagged with the table it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    pub unique_key: String,
    pub source_table: ProfileTable,
    #[serde(flatten)]
    pub record: ProfileRecord,
}

impl ViewRecord {
    pub fn new(table: ProfileTable, record: ProfileRecord) -> Self {
        Self {
            unique_key: unique_key(table, record.id),
            source_table: table,
            record,
        }
    }
}

/// Rows of a single table.
pub fn table_records(data: &ProfileData, table: ProfileTable) -> Vec<ViewRecord> {
    data.table(table)
        .map(|t| {
            t.records
                .iter()
                .cloned()
                .map(|r| ViewRecord::new(table, r))
                .collect()
        })
        .unwrap_or_default()
}

/// Rows of every table, in canonical table order.
pub fn merged_records(data: &ProfileData) -> Vec<ViewRecord> {
    data.tables
        .iter()
        .flat_map(|(&table, t)| t.records.iter().cloned().map(move |r| ViewRecord::new(table, r)))
        .collect()
}

/// Rows visible under the current search box, tag selection, and mask.
///
/// `search` matches content or any keyword, case-insensitively. `tag`
/// must equal one of the keywords exactly. Empty strings match everything.
pub fn filter_records<'a>(
    records: &'a [ViewRecord],
    search: &str,
    tag: &str,
    deleted: &DeletedSet,
) -> Vec<&'a ViewRecord> {
    let needle = search.to_lowercase();
    records
        .iter()
        .filter(|r| !deleted.contains(&r.unique_key))
        .filter(|r| {
            needle.is_empty()
                || r.record.content.to_lowercase().contains(&needle)
                || r.record
                    .keywords
                    .iter()
                    .any(|k| k.to_lowercase().contains(&needle))
        })
        .filter(|r| tag.is_empty() || r.record.keywords.iter().any(|k| k == tag))
        .collect()
}

/// Every keyword in use, sorted and de-duplicated.
pub fn all_tags(data: &ProfileData) -> Vec<String> {
    data.tables
        .values()
        .flat_map(|t| t.records.iter())
        .flat_map(|r| r.keywords.iter().cloned())
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabCount {
    pub key: String,
    pub count: u64,
}

/// Per-table totals, preceded by the `all` tab with their sum.
pub fn table_counts(data: &ProfileData) -> Vec<TabCount> {
    let per_table: Vec<TabCount> = data
        .tables
        .iter()
        .map(|(table, t)| TabCount {
            key: table.as_str().to_string(),
            count: t.stats.total_records,
        })
        .collect();
    let total = per_table.iter().map(|c| c.count).sum();

    std::iter::once(TabCount {
        key: ALL_TABLES_KEY.to_string(),
        count: total,
    })
    .chain(per_table)
    .collect()
}

// ─── ViewState ──────────────────────────────────────────────────────────────

/// What the data view currently shows: the last fetch and the delete mask.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub data: Option<ProfileData>,
    pub deleted: DeletedSet,
}

impl ViewState {
    /// Replace the data. The delete mask is kept.
    pub fn replace(&mut self, data: ProfileData) {
        self.data = Some(data);
    }

    /// Visible rows of a tab: a table name or `all`.
    pub fn visible(
        &self,
        tab: &str,
        search: &str,
        tag: &str,
    ) -> Result<Vec<ViewRecord>, ProfileError> {
        let Some(data) = self.data.as_ref() else {
            return Ok(Vec::new());
        };
        let rows = if tab == ALL_TABLES_KEY {
            merged_records(data)
        } else {
            table_records(data, ProfileTable::parse(tab)?)
        };
        Ok(filter_records(&rows, search, tag, &self.deleted)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn tags(&self) -> Vec<String> {
        self.data.as_ref().map(all_tags).unwrap_or_default()
    }

    pub fn counts(&self) -> Vec<TabCount> {
        table_counts(self.data.as_ref().unwrap_or(&ProfileData::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::types::QueryPage;

    fn record(id: i64, content: &str, keywords: &[&str]) -> ProfileRecord {
        ProfileRecord {
            id: Some(id),
            content: content.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..ProfileRecord::default()
        }
    }

    fn sample() -> ProfileData {
        let mut data = ProfileData::empty();
        data.set_table(
            ProfileTable::Goal,
            QueryPage {
                records: vec![
                    record(1, "Run a marathon", &["health", "sport"]),
                    record(2, "Learn Rust", &["code"]),
                ],
                total_count: 12,
            },
        );
        data.set_table(
            ProfileTable::Memory,
            QueryPage {
                records: vec![record(1, "First marathon in Berlin", &["Sport"])],
                total_count: 1,
            },
        );
        data
    }

    #[test]
    fn test_merged_records_keys_are_unique() {
        let merged = merged_records(&sample());
        let keys: Vec<_> = merged.iter().map(|r| r.unique_key.as_str()).collect();
        // Memory precedes Goal in canonical order.
        assert_eq!(keys, vec!["memory-1", "goal-1", "goal-2"]);
        assert_eq!(merged[0].source_table, ProfileTable::Memory);
    }

    #[test]
    fn test_filter_by_search_is_case_insensitive() {
        let merged = merged_records(&sample());
        let deleted = DeletedSet::new();

        let hits = filter_records(&merged, "MARATHON", "", &deleted);
        assert_eq!(hits.len(), 2);

        // Keyword substring also matches.
        let hits = filter_records(&merged, "cod", "", &deleted);
        assert_eq!(hits[0].unique_key, "goal-2");
    }

    #[test]
    fn test_filter_by_tag_is_exact() {
        let merged = merged_records(&sample());
        let hits = filter_records(&merged, "", "sport", &DeletedSet::new());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unique_key, "goal-1");
    }

    #[test]
    fn test_deleted_rows_are_masked_per_table() {
        let merged = merged_records(&sample());
        let mut deleted = DeletedSet::new();
        deleted.mark(ProfileTable::Goal, 1);

        let hits = filter_records(&merged, "", "", &deleted);
        let keys: Vec<_> = hits.iter().map(|r| r.unique_key.as_str()).collect();
        assert_eq!(keys, vec!["memory-1", "goal-2"]);
    }

    #[test]
    fn test_all_tags_sorted_unique() {
        assert_eq!(all_tags(&sample()), vec!["Sport", "code", "health", "sport"]);
    }

    #[test]
    fn test_table_counts_include_all() {
        let counts = table_counts(&sample());
        assert_eq!(counts.len(), 9);
        assert_eq!(counts[0], TabCount { key: "all".into(), count: 13 });
        let goal = counts.iter().find(|c| c.key == "goal").unwrap();
        assert_eq!(goal.count, 12);
    }

    #[test]
    fn test_view_state_keeps_mask_across_refresh() {
        let mut state = ViewState::default();
        assert!(state.visible("all", "", "").unwrap().is_empty());

        state.replace(sample());
        state.deleted.mark(ProfileTable::Goal, 2);
        state.replace(sample());

        let goals = state.visible("goal", "", "").unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].unique_key, "goal-1");
        assert!(state.visible("goals", "", "").is_err());
        assert_eq!(state.counts()[0].count, 13);
    }

    #[test]
    fn test_view_record_serializes_flat() {
        let view = ViewRecord::new(ProfileTable::Goal, record(5, "x", &[]));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["uniqueKey"], "goal-5");
        assert_eq!(json["sourceTable"], "goal");
        assert_eq!(json["content"], "x");
    }
}
