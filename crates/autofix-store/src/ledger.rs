//! History ledger: append-only execution attempts, partitioned by project

use crate::error::StoreError;
use crate::record::{Record, RecordQuery, RecordStore, SortKeyCondition};
use autofix_artifact::{
    format_ledger_timestamp, ledger_precision, ExecutionAttempt, Filename, ProjectName,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Record could not be appended
    #[error("failed to append history for project '{project}': {source}")]
    AppendFailed {
        project: String,
        #[source]
        source: StoreError,
    },

    /// Backend failed while querying
    #[error("failed to query history for project '{project}': {source}")]
    QueryFailed {
        project: String,
        #[source]
        source: StoreError,
    },
}

/// Filters for [`HistoryLedger::search`]; all present filters must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySearch {
    /// Case-insensitive substring of the instruction
    pub keyword: Option<String>,
    /// Inclusive lower bound, only applied together with `end`
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound, only applied together with `start`
    pub end: Option<DateTime<Utc>>,
}

impl HistorySearch {
    /// No filters
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With keyword filter
    #[inline]
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// With time range
    #[inline]
    #[must_use]
    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// Time-ordered [`ExecutionAttempt`] log over a [`RecordStore`]
pub struct HistoryLedger {
    records: Arc<dyn RecordStore>,
    last_stamp: Mutex<HashMap<ProjectName, DateTime<Utc>>>,
}

impl std::fmt::Debug for HistoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLedger").finish_non_exhaustive()
    }
}

impl HistoryLedger {
    /// Create ledger over `records`
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            last_stamp: Mutex::new(HashMap::new()),
        }
    }

    /// Append `attempt`, assigning its final timestamp
    ///
    /// Timestamps are strictly increasing within a project. The stored
    /// record is returned.
    ///
    /// # Errors
    /// Returns [`LedgerError::AppendFailed`] if the backend did not store it.
    pub async fn append(
        &self,
        mut attempt: ExecutionAttempt,
    ) -> Result<ExecutionAttempt, LedgerError> {
        let project = attempt.project.clone();
        let append_failed = |source: StoreError| LedgerError::AppendFailed {
            project: project.to_string(),
            source,
        };

        let mut last = self.last_stamp.lock().await;
        let floor = match last.get(&project) {
            Some(ts) => Some(*ts),
            None => self
                .newest(&project)
                .await
                .map_err(append_failed)?
                .map(|record| record.timestamp),
        };

        let now = ledger_precision(Utc::now());
        attempt.timestamp = match floor {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };

        let body = serde_json::to_value(&attempt)
            .map_err(|e| append_failed(StoreError::Serialization(e)))?;
        self.records
            .put(Record::new(project.as_str(), attempt.sort_key(), body))
            .await
            .map_err(|source| {
                tracing::error!(project = %project, error = %source, "History append failed");
                append_failed(source)
            })?;

        last.insert(project.clone(), attempt.timestamp);
        tracing::debug!(
            project = %project,
            timestamp = %attempt.sort_key(),
            attempt = attempt.attempt,
            "History recorded"
        );
        Ok(attempt)
    }

    /// Most recent attempt in `project`
    ///
    /// # Errors
    /// Returns [`LedgerError::QueryFailed`] on backend failure.
    pub async fn latest(
        &self,
        project: &ProjectName,
    ) -> Result<Option<ExecutionAttempt>, LedgerError> {
        self.newest(project)
            .await
            .map_err(|source| query_failed(project, source))
    }

    /// Most recent attempt in `project` for `filename`
    ///
    /// # Errors
    /// Returns [`LedgerError::QueryFailed`] on backend failure.
    pub async fn latest_for_file(
        &self,
        project: &ProjectName,
        filename: &Filename,
    ) -> Result<Option<ExecutionAttempt>, LedgerError> {
        let rows = self
            .records
            .query(&RecordQuery::partition(project.as_str()).descending())
            .await
            .map_err(|source| query_failed(project, source))?;

        Ok(decode_all(rows).find(|attempt| &attempt.filename == filename))
    }

    /// Attempts with `start <= timestamp <= end`, oldest first
    ///
    /// # Errors
    /// Returns [`LedgerError::QueryFailed`] on backend failure.
    pub async fn range(
        &self,
        project: &ProjectName,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExecutionAttempt>, LedgerError> {
        if start > end {
            return Ok(Vec::new());
        }
        self.query(project, between(start, end)).await
    }

    /// Attempts matching every filter in `search`, oldest first
    ///
    /// A range with only one bound is ignored. Nothing matching is an empty
    /// result, not an error.
    ///
    /// # Errors
    /// Returns [`LedgerError::QueryFailed`] on backend failure.
    pub async fn search(
        &self,
        project: &ProjectName,
        search: &HistorySearch,
    ) -> Result<Vec<ExecutionAttempt>, LedgerError> {
        let condition = match (search.start, search.end) {
            (Some(start), Some(end)) if start > end => return Ok(Vec::new()),
            (Some(start), Some(end)) => between(start, end),
            _ => SortKeyCondition::All,
        };

        let mut found = self.query(project, condition).await?;
        if let Some(keyword) = &search.keyword {
            let needle = keyword.to_lowercase();
            found.retain(|attempt| attempt.instruction.to_lowercase().contains(&needle));
        }
        Ok(found)
    }

    async fn query(
        &self,
        project: &ProjectName,
        condition: SortKeyCondition,
    ) -> Result<Vec<ExecutionAttempt>, LedgerError> {
        let rows = self
            .records
            .query(&RecordQuery::partition(project.as_str()).with_condition(condition))
            .await
            .map_err(|source| query_failed(project, source))?;
        Ok(decode_all(rows).collect())
    }

    async fn newest(&self, project: &ProjectName) -> Result<Option<ExecutionAttempt>, StoreError> {
        let rows = self
            .records
            .query(&RecordQuery::partition(project.as_str()).descending())
            .await?;
        Ok(decode_all(rows).next())
    }
}

fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> SortKeyCondition {
    SortKeyCondition::Between {
        low: format_ledger_timestamp(&ledger_precision(start)),
        high: format_ledger_timestamp(&ledger_precision(end)),
    }
}

fn query_failed(project: &ProjectName, source: StoreError) -> LedgerError {
    LedgerError::QueryFailed {
        project: project.to_string(),
        source,
    }
}

fn decode_all(rows: Vec<Record>) -> impl Iterator<Item = ExecutionAttempt> {
    rows.into_iter().filter_map(|row| {
        match serde_json::from_value::<ExecutionAttempt>(row.body) {
            Ok(attempt) => Some(attempt),
            Err(e) => {
                tracing::warn!(
                    partition = %row.partition,
                    sort_key = %row.sort_key,
                    error = %e,
                    "Skipping undecodable history record"
                );
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryRecordStore;
    use pretty_assertions::assert_eq;

    fn project() -> ProjectName {
        ProjectName::new("demo").unwrap()
    }

    fn attempt(filename: &str, instruction: &str) -> ExecutionAttempt {
        ExecutionAttempt::new(
            project(),
            Filename::new(filename).unwrap(),
            instruction,
            "print(1)",
        )
    }

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(MemoryRecordStore::new()))
    }

    #[tokio::test]
    async fn timestamps_are_unique_and_increasing() {
        let ledger = ledger();
        let mut stamps = Vec::new();
        for i in 0..20 {
            let stored = ledger
                .append(attempt("main.py", &format!("step {i}")))
                .await
                .unwrap();
            stamps.push(stored.timestamp);
        }
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));

        let all = ledger.search(&project(), &HistorySearch::new()).await.unwrap();
        assert_eq!(all.len(), 20);
    }

    #[tokio::test]
    async fn latest_and_latest_for_file() {
        let ledger = ledger();
        assert_eq!(ledger.latest(&project()).await.unwrap(), None);

        ledger.append(attempt("main.py", "first")).await.unwrap();
        ledger.append(attempt("util.py", "second")).await.unwrap();

        let latest = ledger.latest(&project()).await.unwrap().unwrap();
        assert_eq!(latest.instruction, "second");

        let for_main = ledger
            .latest_for_file(&project(), &Filename::new("main.py").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(for_main.instruction, "first");
    }

    #[tokio::test]
    async fn keyword_is_case_insensitive() {
        let ledger = ledger();
        ledger.append(attempt("main.py", "Build a Flask server")).await.unwrap();
        ledger.append(attempt("main.py", "sort a list")).await.unwrap();

        let found = ledger
            .search(&project(), &HistorySearch::new().with_keyword("flask"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].instruction, "Build a Flask server");

        let none = ledger
            .search(&project(), &HistorySearch::new().with_keyword("django"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ordered() {
        let ledger = ledger();
        let a = ledger.append(attempt("main.py", "a")).await.unwrap();
        let b = ledger.append(attempt("main.py", "b")).await.unwrap();
        let c = ledger.append(attempt("main.py", "c")).await.unwrap();

        let mid = ledger.range(&project(), a.timestamp, b.timestamp).await.unwrap();
        assert_eq!(mid, vec![a.clone(), b.clone()]);

        let reversed = ledger.range(&project(), c.timestamp, a.timestamp).await.unwrap();
        assert!(reversed.is_empty());
    }

    #[tokio::test]
    async fn one_sided_bound_is_ignored() {
        let ledger = ledger();
        let a = ledger.append(attempt("main.py", "a")).await.unwrap();
        ledger.append(attempt("main.py", "b")).await.unwrap();

        let search = HistorySearch {
            start: Some(a.timestamp + Duration::days(1)),
            ..HistorySearch::default()
        };
        assert_eq!(ledger.search(&project(), &search).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn projects_are_isolated() {
        let ledger = ledger();
        ledger.append(attempt("main.py", "mine")).await.unwrap();

        let other = ProjectName::new("other").unwrap();
        assert!(ledger.latest(&other).await.unwrap().is_none());
        assert!(ledger
            .search(&other, &HistorySearch::new())
            .await
            .unwrap()
            .is_empty());
    }
}
