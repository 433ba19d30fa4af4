//! Implementation of the `st export` command.
//!
//! Writes every stored value as one JSON object keyed by hostname. Legacy
//! values are written as they are stored, so an export can be re-imported
//! without changing anything.

use std::io::Write;

use anyhow::{Context, Result};

use st_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database) -> Result<usize> {
    let sites = db.list_sites()?;
    serde_json::to_writer_pretty(&mut *writer, &sites).context("failed to serialize sites")?;
    writeln!(writer)?;
    Ok(sites.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use st_core::{SiteKey, SiteRecord, StoredValue};

    #[test]
    fn export_writes_key_value_object() {
        let db = Database::open_in_memory().unwrap();
        db.put_site(&SiteKey::new("b.com").unwrap(), StoredValue::Legacy(100))
            .unwrap();
        db.put_site(
            &SiteKey::new("a.com").unwrap(),
            StoredValue::Record(SiteRecord {
                time: 2_000,
                sessions: 2,
                last_visited: Some(1_735_689_600_000),
            }),
        )
        .unwrap();

        let mut output = Vec::new();
        let count = run(&mut output, &db).unwrap();

        assert_eq!(count, 2);
        assert_snapshot!(String::from_utf8(output).unwrap(), @r#"
        {
          "a.com": {
            "time": 2000,
            "sessions": 2,
            "lastVisited": 1735689600000
          },
          "b.com": 100
        }
        "#);
    }

    #[test]
    fn export_then_import_preserves_values() {
        let source = Database::open_in_memory().unwrap();
        source
            .put_site(&SiteKey::new("a.com").unwrap(), StoredValue::Legacy(42))
            .unwrap();
        let mut output = Vec::new();
        run(&mut output, &source).unwrap();

        let mut target = Database::open_in_memory().unwrap();
        crate::commands::import::run(output.as_slice(), &mut target).unwrap();

        assert_eq!(target.list_sites().unwrap(), source.list_sites().unwrap());
    }
}
