//! Full fetch of every profile table in small concurrent batches.
//!
//! The tool server handles a handful of concurrent queries well but starts
//! timing out when all tables are requested at once, so tables are fetched
//! `batch_size` at a time with a pause between batches.

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;

use super::service::ProfileService;
use super::tables::ProfileTable;
use super::types::{ProfileData, QueryParams};

// ─── Plan ───────────────────────────────────────────────────────────────────

/// Which tables to fetch and how.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    tables: Vec<ProfileTable>,
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Rows requested per table.
    pub limit: u32,
}

impl FetchPlan {
    /// Plan over `tables`, keeping the first occurrence of each.
    pub fn new(
        tables: impl IntoIterator<Item = ProfileTable>,
        batch_size: usize,
        batch_delay: Duration,
        limit: u32,
    ) -> Self {
        let mut unique = Vec::new();
        for table in tables {
            if !unique.contains(&table) {
                unique.push(table);
            }
        }
        Self {
            tables: unique,
            batch_size: batch_size.max(1),
            batch_delay,
            limit,
        }
    }

    pub fn tables(&self) -> &[ProfileTable] {
        &self.tables
    }

    /// Tables grouped into batches, in plan order.
    pub fn batches(&self) -> impl Iterator<Item = &[ProfileTable]> {
        self.tables.chunks(self.batch_size)
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOutcome {
    pub table: ProfileTable,
    /// 1-based batch the table was fetched in.
    pub batch: usize,
    pub records: usize,
    pub total_records: u64,
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full fetch: the data plus one outcome per planned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub data: ProfileData,
    pub outcomes: Vec<TableOutcome>,
    pub persona_error: Option<String>,
    pub elapsed_ms: u64,
}

impl FetchReport {
    pub fn failed_tables(&self) -> Vec<ProfileTable> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.table)
            .collect()
    }
}

// ─── Fetch ──────────────────────────────────────────────────────────────────

impl ProfileService {
    /// Plan covering all tables with the configured batching.
    pub fn fetch_plan(&self) -> FetchPlan {
        FetchPlan::new(
            ProfileTable::ALL,
            self.settings.effective_batch_size(),
            self.settings.batch_delay(),
            self.settings.effective_fetch_limit(),
        )
    }

    /// Fetch the persona and then every planned table.
    ///
    /// A failing table is reported and left empty; it never aborts the rest
    /// of its batch or later batches. The cached connection is closed
    /// afterwards.
    pub async fn fetch_all_tables(&self, plan: &FetchPlan) -> FetchReport {
        let start = Instant::now();
        let mut data = ProfileData::empty();
        let mut outcomes = Vec::with_capacity(plan.tables().len());

        let persona_error = match self.get_persona().await {
            Ok(persona) => {
                tracing::info!(found = persona.is_some(), "persona fetched");
                data.persona = persona;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch persona");
                Some(e.to_string())
            }
        };

        let batches: Vec<&[ProfileTable]> = plan.batches().collect();
        tracing::info!(
            tables = plan.tables().len(),
            batches = batches.len(),
            batch_size = plan.batch_size,
            "fetching profile tables"
        );

        let params = QueryParams::with_limit(plan.limit);
        let params = &params;
        for (index, batch) in batches.iter().enumerate() {
            let batch_no = index + 1;
            tracing::debug!(batch = batch_no, tables = ?batch, "starting batch");

            let results = join_all(
                batch
                    .iter()
                    .map(|&table| async move { (table, self.query_records(table, params).await) }),
            )
            .await;

            for (table, result) in results {
                let outcome = match result {
                    Ok(page) => {
                        tracing::info!(
                            table = %table,
                            total = page.total_count,
                            "table fetched"
                        );
                        let outcome = TableOutcome {
                            table,
                            batch: batch_no,
                            records: page.records.len(),
                            total_records: page.total_count,
                            error: None,
                        };
                        data.set_table(table, page);
                        outcome
                    }
                    Err(e) => {
                        tracing::error!(table = %table, error = %e, "table fetch failed");
                        TableOutcome {
                            table,
                            batch: batch_no,
                            records: 0,
                            total_records: 0,
                            error: Some(e.to_string()),
                        }
                    }
                };
                outcomes.push(outcome);
            }

            if batch_no < batches.len() && !plan.batch_delay.is_zero() {
                tokio::time::sleep(plan.batch_delay).await;
            }
        }

        self.client.close().await;

        let report = FetchReport {
            data,
            outcomes,
            persona_error,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            failed = report.failed_tables().len(),
            elapsed_ms = report.elapsed_ms,
            "profile fetch complete"
        );
        report
    }
}
