//! Persistence seam for the aggregate store.
//!
//! The store is a flat key/value namespace keyed by [`SiteKey`]. Every
//! operation is asynchronous and returns an explicit result so callers can
//! decide how to contain failures.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::record::{SiteRecord, StoredValue};
use crate::site::SiteKey;

/// A point-in-time copy of the whole store.
pub type Snapshot = BTreeMap<SiteKey, StoredValue>;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backing store reported a failure.
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Asynchronous get/set/merge/clear service holding one value per site.
///
/// Implementations must read and write each value atomically as a whole unit.
pub trait SiteStore: Send + Sync {
    /// Reads the value stored for `key`, if any.
    fn get(
        &self,
        key: &SiteKey,
    ) -> impl Future<Output = Result<Option<StoredValue>, StoreError>> + Send;

    /// Replaces the value stored for `key`.
    fn set(
        &self,
        key: &SiteKey,
        value: StoredValue,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds one tick's time to the record for `key` and returns the result.
    ///
    /// The read, the legacy migration and the write happen as one atomic
    /// step, so a concurrent [`clear`](Self::clear) lands strictly before or
    /// after it.
    fn merge(
        &self,
        key: &SiteKey,
        delta_ms: u64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<SiteRecord, StoreError>> + Send;

    /// Removes every key in one step.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns a consistent copy of every stored value.
    fn snapshot(&self) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;
}

/// In-process store, used by tests and short-lived trackers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `values`.
    pub fn with_values(values: Snapshot) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }
}

impl SiteStore for MemoryStore {
    async fn get(&self, key: &SiteKey) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.values.read().await.get(key).copied())
    }

    async fn set(&self, key: &SiteKey, value: StoredValue) -> Result<(), StoreError> {
        self.values.write().await.insert(key.clone(), value);
        Ok(())
    }

    async fn merge(
        &self,
        key: &SiteKey,
        delta_ms: u64,
        at: DateTime<Utc>,
    ) -> Result<SiteRecord, StoreError> {
        let mut values = self.values.write().await;
        let merged = values
            .get(key)
            .copied()
            .map(StoredValue::normalize)
            .unwrap_or_default()
            .merge(delta_ms, at);
        values.insert(key.clone(), merged.into());
        Ok(merged)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.values.write().await.clear();
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.values.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(host: &str) -> SiteKey {
        SiteKey::new(host).unwrap()
    }

    #[tokio::test]
    async fn memory_store_roundtrips_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get(&key("a.com")).await.unwrap(), None);

        let record = SiteRecord {
            time: 10,
            sessions: 1,
            last_visited: Some(5),
        };
        store.set(&key("a.com"), record.into()).await.unwrap();
        store.set(&key("b.com"), StoredValue::Legacy(7)).await.unwrap();

        assert_eq!(
            store.get(&key("a.com")).await.unwrap(),
            Some(StoredValue::Record(record))
        );
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&key("b.com")], StoredValue::Legacy(7));
    }

    #[tokio::test]
    async fn memory_store_merge_migrates_legacy_values() {
        let mut values = Snapshot::new();
        values.insert(key("a.com"), StoredValue::Legacy(400));
        let store = MemoryStore::with_values(values);
        let now = DateTime::from_timestamp_millis(9_000).unwrap();

        let merged = store.merge(&key("a.com"), 100, now).await.unwrap();
        let fresh = store.merge(&key("b.com"), 50, now).await.unwrap();

        assert_eq!(
            merged,
            SiteRecord {
                time: 500,
                sessions: 2,
                last_visited: Some(9_000),
            }
        );
        assert_eq!((fresh.time, fresh.sessions), (50, 1));
        assert_eq!(
            store.get(&key("a.com")).await.unwrap(),
            Some(StoredValue::Record(merged))
        );
    }

    #[tokio::test]
    async fn memory_store_clear_removes_everything() {
        let mut values = Snapshot::new();
        values.insert(key("a.com"), StoredValue::Legacy(1));
        values.insert(key("b.com"), StoredValue::Legacy(2));
        let store = MemoryStore::with_values(values);

        store.clear().await.unwrap();

        assert!(store.snapshot().await.unwrap().is_empty());
    }
}
