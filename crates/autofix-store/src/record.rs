//! Structured record capability and in-memory backend
//!
//! Records live in partitions and are ordered by a string sort key within a
//! partition, the way a wide-column store exposes them. Queries never cross
//! partitions.

use crate::error::StoreError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub partition: String,
    pub sort_key: String,
    pub body: Value,
}

impl Record {
    /// Create record
    #[inline]
    #[must_use]
    pub fn new(partition: impl Into<String>, sort_key: impl Into<String>, body: Value) -> Self {
        Self {
            partition: partition.into(),
            sort_key: sort_key.into(),
            body,
        }
    }
}

/// Predicate on the sort key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKeyCondition {
    /// Every record in the partition
    #[default]
    All,
    /// Sort key starts with the given prefix
    BeginsWith(String),
    /// Sort key within `[low, high]`, both inclusive
    Between { low: String, high: String },
}

impl SortKeyCondition {
    /// Whether `sort_key` satisfies the condition
    #[must_use]
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            Self::All => true,
            Self::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            Self::Between { low, high } => low.as_str() <= sort_key && sort_key <= high.as_str(),
        }
    }
}

/// Partition query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub partition: String,
    pub condition: SortKeyCondition,
    /// Newest (largest sort key) first
    pub descending: bool,
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Query every record of `partition`, ascending
    #[inline]
    #[must_use]
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            condition: SortKeyCondition::All,
            descending: false,
            limit: None,
        }
    }

    /// With sort-key condition
    #[inline]
    #[must_use]
    pub fn with_condition(mut self, condition: SortKeyCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Largest sort key first
    #[inline]
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// At most `limit` records
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter, order and cap an already sorted partition
    pub(crate) fn apply<'a, I>(&self, sorted: I) -> Vec<Record>
    where
        I: DoubleEndedIterator<Item = (&'a String, &'a Value)>,
    {
        let limit = self.limit.unwrap_or(usize::MAX);
        let to_record = |(sort_key, body): (&String, &Value)| {
            Record::new(self.partition.clone(), sort_key.clone(), body.clone())
        };
        let matching = |(sort_key, _): &(&String, &Value)| self.condition.matches(sort_key);

        if self.descending {
            sorted.rev().filter(matching).take(limit).map(to_record).collect()
        } else {
            sorted.filter(matching).take(limit).map(to_record).collect()
        }
    }
}

/// Partitioned, sort-key ordered record storage
///
/// `put` with an existing `(partition, sort_key)` replaces that record.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Write a record
    ///
    /// # Errors
    /// Returns [`StoreError`] if the partition is invalid or the backend fails.
    async fn put(&self, record: Record) -> Result<(), StoreError>;

    /// Read records matching `query`
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError>;
}

/// Reject partitions that cannot double as file names
///
/// # Errors
/// Returns [`StoreError::InvalidKey`].
pub fn validate_partition(partition: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidKey {
        key: partition.to_string(),
        reason,
    };
    if partition.is_empty() {
        return Err(invalid("empty partition"));
    }
    if partition.starts_with('.') {
        return Err(invalid("hidden partition"));
    }
    if partition.contains(['/', '\\', '\0']) {
        return Err(invalid("forbidden character"));
    }
    Ok(())
}

/// Process-local [`RecordStore`]
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    partitions: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryRecordStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: Record) -> Result<(), StoreError> {
        validate_partition(&record.partition)?;
        self.partitions
            .write()
            .entry(record.partition)
            .or_default()
            .insert(record.sort_key, record.body);
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        let partitions = self.partitions.read();
        Ok(partitions
            .get(&query.partition)
            .map(|rows| query.apply(rows.iter()))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        for (pk, sk) in [
            ("p", "2024-01-01"),
            ("p", "2024-01-03"),
            ("p", "2024-02-01"),
            ("q", "2024-01-02"),
        ] {
            store
                .put(Record::new(pk, sk, json!({ "sk": sk })))
                .await
                .unwrap();
        }
        store
    }

    fn sort_keys(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.sort_key.as_str()).collect()
    }

    #[tokio::test]
    async fn queries_stay_in_partition() {
        let store = seeded().await;
        let all = store.query(&RecordQuery::partition("p")).await.unwrap();
        assert_eq!(sort_keys(&all), vec!["2024-01-01", "2024-01-03", "2024-02-01"]);
        assert!(store.query(&RecordQuery::partition("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begins_with_and_between() {
        let store = seeded().await;

        let jan = store
            .query(
                &RecordQuery::partition("p")
                    .with_condition(SortKeyCondition::BeginsWith("2024-01".into())),
            )
            .await
            .unwrap();
        assert_eq!(sort_keys(&jan), vec!["2024-01-01", "2024-01-03"]);

        let range = store
            .query(&RecordQuery::partition("p").with_condition(SortKeyCondition::Between {
                low: "2024-01-03".into(),
                high: "2024-02-01".into(),
            }))
            .await
            .unwrap();
        assert_eq!(sort_keys(&range), vec!["2024-01-03", "2024-02-01"]);
    }

    #[tokio::test]
    async fn descending_with_limit() {
        let store = seeded().await;
        let newest = store
            .query(&RecordQuery::partition("p").descending().with_limit(1))
            .await
            .unwrap();
        assert_eq!(sort_keys(&newest), vec!["2024-02-01"]);
    }

    #[tokio::test]
    async fn put_replaces_same_sort_key() {
        let store = MemoryRecordStore::new();
        store.put(Record::new("p", "k", json!(1))).await.unwrap();
        store.put(Record::new("p", "k", json!(2))).await.unwrap();
        let rows = store.query(&RecordQuery::partition("p")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, json!(2));
    }

    #[test]
    fn partition_validation() {
        assert!(validate_partition("demo_project").is_ok());
        assert!(validate_partition("").is_err());
        assert!(validate_partition("../x").is_err());
        assert!(validate_partition("a/b").is_err());
    }
}
