//! Import command for loading a key/value dump into the local `SQLite` store.
//!
//! The input is a single JSON object mapping hostnames to stored values, the
//! same shape `st export` writes and a browser's local storage dump uses.
//! Both record objects and legacy bare numbers are accepted.

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result};

use st_core::{SiteKey, Snapshot, StoredValue};
use st_db::Database;

/// Outcome of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub fn run<R: Read>(reader: R, db: &mut Database) -> Result<ImportSummary> {
    let (values, skipped) = parse_values(reader)?;
    let imported = db.import_sites(&values)?;
    Ok(ImportSummary { imported, skipped })
}

fn parse_values<R: Read>(reader: R) -> Result<(Snapshot, usize)> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_reader(reader).context("expected a JSON object of hostname to value")?;

    let mut values = Snapshot::new();
    let mut skipped = 0;
    for (raw_key, raw_value) in raw {
        let key = match SiteKey::new(&raw_key) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(key = raw_key, %err, "skipping entry");
                skipped += 1;
                continue;
            }
        };
        match serde_json::from_value::<StoredValue>(raw_value) {
            Ok(value) => {
                values.insert(key, value);
            }
            Err(err) => {
                tracing::warn!(key = raw_key, %err, "skipping entry with unrecognized value");
                skipped += 1;
            }
        }
    }
    Ok((values, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    use st_core::SiteRecord;

    #[test]
    fn imports_legacy_and_record_values() {
        let mut db = Database::open_in_memory().unwrap();
        let input = r#"{
            "a.com": 100,
            "b.com": {"time": 5000, "sessions": 5, "lastVisited": 1700000000000},
            "c.com": {"time": 10, "sessions": 1, "lastVisited": null}
        }"#;

        let summary = run(input.as_bytes(), &mut db).unwrap();

        assert_eq!(summary, ImportSummary { imported: 3, skipped: 0 });
        let sites = db.list_sites().unwrap();
        assert_eq!(sites[&SiteKey::new("a.com").unwrap()], StoredValue::Legacy(100));
        assert_eq!(
            sites[&SiteKey::new("b.com").unwrap()],
            StoredValue::Record(SiteRecord {
                time: 5_000,
                sessions: 5,
                last_visited: Some(1_700_000_000_000),
            })
        );
    }

    #[test]
    fn skips_bad_keys_and_values() {
        let mut db = Database::open_in_memory().unwrap();
        let input = r#"{"": 1, "a.com": "soon", "b.com": -3, "c.com": 7}"#;

        let summary = run(input.as_bytes(), &mut db).unwrap();

        assert_eq!(summary, ImportSummary { imported: 1, skipped: 3 });
    }

    #[test]
    fn rejects_non_object_input() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(run("[1, 2]".as_bytes(), &mut db).is_err());
    }
}
