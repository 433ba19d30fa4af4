//! Persisted per-site statistics and legacy schema migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated statistics for one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Total attributed time in milliseconds.
    pub time: u64,

    /// Number of ticks that attributed time to this site.
    pub sessions: u64,

    /// Epoch milliseconds of the most recent attribution.
    #[serde(rename = "lastVisited", default)]
    pub last_visited: Option<i64>,
}

impl SiteRecord {
    /// Merges one tick's worth of time into the record.
    ///
    /// Counters saturate rather than wrap so they never decrease.
    #[must_use]
    pub fn merge(self, delta_ms: u64, now: DateTime<Utc>) -> Self {
        Self {
            time: self.time.saturating_add(delta_ms),
            sessions: self.sessions.saturating_add(1),
            last_visited: Some(now.timestamp_millis()),
        }
    }

    pub fn last_visited_at(&self) -> Option<DateTime<Utc>> {
        self.last_visited.and_then(DateTime::from_timestamp_millis)
    }
}

/// A value as found in the key/value store.
///
/// Older versions stored a bare millisecond count per hostname; current
/// versions store a full [`SiteRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Legacy(u64),
    Record(SiteRecord),
}

impl StoredValue {
    /// Converts the stored value into the current record shape.
    pub const fn normalize(self) -> SiteRecord {
        match self {
            Self::Legacy(time) => SiteRecord {
                time,
                sessions: 1,
                last_visited: None,
            },
            Self::Record(record) => record,
        }
    }
}

impl From<SiteRecord> for StoredValue {
    fn from(record: SiteRecord) -> Self {
        Self::Record(record)
    }
}

/// Normalizes a stored value. Idempotent over record-shaped values.
pub const fn normalize(value: StoredValue) -> SiteRecord {
    value.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_number_normalizes_to_single_session() {
        let value: StoredValue = serde_json::from_str("100").unwrap();
        assert_eq!(value, StoredValue::Legacy(100));
        assert_eq!(
            normalize(value),
            SiteRecord {
                time: 100,
                sessions: 1,
                last_visited: None,
            }
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let legacy = StoredValue::Legacy(42);
        let once = normalize(legacy);
        assert_eq!(normalize(StoredValue::from(once)), once);

        let record = SiteRecord {
            time: 5_000,
            sessions: 5,
            last_visited: Some(1_700_000_000_000),
        };
        assert_eq!(normalize(StoredValue::from(record)), record);
        assert_eq!(normalize(StoredValue::from(normalize(record.into()))), record);
    }

    #[test]
    fn record_json_uses_camel_case_last_visited() {
        let record = SiteRecord {
            time: 1_000,
            sessions: 2,
            last_visited: Some(1_700_000_000_000),
        };
        let json = serde_json::to_string(&StoredValue::from(record)).unwrap();
        assert_eq!(
            json,
            r#"{"time":1000,"sessions":2,"lastVisited":1700000000000}"#
        );
    }

    #[test]
    fn record_json_accepts_null_or_missing_last_visited() {
        let with_null: StoredValue =
            serde_json::from_str(r#"{"time":10,"sessions":1,"lastVisited":null}"#).unwrap();
        let missing: StoredValue = serde_json::from_str(r#"{"time":10,"sessions":1}"#).unwrap();
        assert_eq!(with_null, missing);
        assert_eq!(with_null.normalize().last_visited, None);
    }

    #[test]
    fn negative_or_textual_values_are_rejected() {
        assert!(serde_json::from_str::<StoredValue>("-5").is_err());
        assert!(serde_json::from_str::<StoredValue>(r#""100""#).is_err());
    }

    #[test]
    fn merge_adds_delta_and_one_session() {
        let now = DateTime::from_timestamp_millis(2_000).unwrap();
        let merged = SiteRecord::default().merge(1_000, now);
        assert_eq!(merged.time, 1_000);
        assert_eq!(merged.sessions, 1);
        assert_eq!(merged.last_visited, Some(2_000));
        assert_eq!(merged.last_visited_at(), Some(now));
    }

    #[test]
    fn merge_saturates() {
        let now = DateTime::from_timestamp_millis(0).unwrap();
        let record = SiteRecord {
            time: u64::MAX - 1,
            sessions: u64::MAX,
            last_visited: None,
        };
        let merged = record.merge(10, now);
        assert_eq!(merged.time, u64::MAX);
        assert_eq!(merged.sessions, u64::MAX);
    }
}
