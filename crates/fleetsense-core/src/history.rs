//! Append-only per-vehicle analysis history.
//!
//! Shared between the orchestrator and the scheduler behind an `Arc`; all
//! writers append, nothing is mutated in place. Growth is unbounded within
//! the process lifetime; external persistence is the intended long-term
//! answer, not in-process eviction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::analyzer::AnalysisDomain;
use crate::orchestrator::ComprehensiveReport;

/// Default number of entries returned by [`HistoryLog::query`].
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// What was analyzed: a routed single query or a comprehensive run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisRecord {
    Query {
        query: String,
        agent: AnalysisDomain,
        response: String,
    },
    ComprehensiveAnalysis {
        result: ComprehensiveReport,
    },
}

/// One immutable history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisLogEntry {
    pub timestamp: DateTime<Utc>,
    pub vehicle_id: String,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

/// Append-only analysis log.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Mutex<Vec<AnalysisLogEntry>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. O(1); safe under concurrent appends.
    pub async fn append(&self, vehicle_id: &str, record: AnalysisRecord) {
        let entry = AnalysisLogEntry {
            timestamp: Utc::now(),
            vehicle_id: vehicle_id.to_string(),
            record,
        };
        self.entries.lock().await.push(entry);
    }

    /// Entries for one vehicle, most recent first, at most `limit`
    /// (default [`DEFAULT_HISTORY_LIMIT`]). An id with no history yields an
    /// empty vec, not an error.
    pub async fn query(&self, vehicle_id: &str, limit: Option<usize>) -> Vec<AnalysisLogEntry> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let entries = self.entries.lock().await;
        entries
            .iter()
            .rev()
            .filter(|e| e.vehicle_id == vehicle_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total entries across all vehicles.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_record(n: usize) -> AnalysisRecord {
        AnalysisRecord::Query {
            query: format!("query {n}"),
            agent: AnalysisDomain::Diagnostic,
            response: format!("response {n}"),
        }
    }

    #[tokio::test]
    async fn test_query_returns_most_recent_first() {
        let log = HistoryLog::new();
        for n in 0..5 {
            log.append("VH001", query_record(n)).await;
        }

        let entries = log.query("VH001", None).await;
        assert_eq!(entries.len(), 5);
        match &entries[0].record {
            AnalysisRecord::Query { query, .. } => assert_eq!(query, "query 4"),
            other => panic!("expected query record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_respects_limit() {
        let log = HistoryLog::new();
        for n in 0..20 {
            log.append("VH001", query_record(n)).await;
        }

        assert_eq!(log.query("VH001", Some(3)).await.len(), 3);
        // Default limit caps at 10.
        assert_eq!(log.query("VH001", None).await.len(), DEFAULT_HISTORY_LIMIT);
        // But the log itself never evicts.
        assert_eq!(log.len().await, 20);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_yields_empty_not_error() {
        let log = HistoryLog::new();
        log.append("VH001", query_record(0)).await;
        assert!(log.query("VH999", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_entries_filtered_per_vehicle() {
        let log = HistoryLog::new();
        log.append("VH001", query_record(1)).await;
        log.append("VH002", query_record(2)).await;
        log.append("VH001", query_record(3)).await;

        let entries = log.query("VH001", None).await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.vehicle_id == "VH001"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let log = std::sync::Arc::new(HistoryLog::new());
        let mut tasks = Vec::new();
        for n in 0..16 {
            let log = std::sync::Arc::clone(&log);
            tasks.push(tokio::spawn(async move {
                log.append("VH001", query_record(n)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(log.len().await, 16);
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing() {
        let log = HistoryLog::new();
        for n in 0..4 {
            log.append("VH001", query_record(n)).await;
        }
        let entries = log.query("VH001", None).await;
        // Most recent first, so timestamps descend (weakly).
        for pair in entries.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }
}
