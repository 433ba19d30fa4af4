//! Status command for showing what the tracker has stored.

use std::io::Write;

use anyhow::Result;

use st_core::StoredValue;
use st_db::Database;

use super::report::format_duration;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let sites = db.list_sites()?;
    let rows = db.site_count()?;

    writeln!(writer, "Site tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Tick interval: {}ms", config.tick_interval_ms)?;

    if sites.is_empty() {
        writeln!(writer, "No sites recorded.")?;
    } else {
        let total: u64 = sites
            .values()
            .map(|value| StoredValue::normalize(*value).time)
            .fold(0, u64::saturating_add);
        let legacy = sites
            .values()
            .filter(|value| matches!(value, StoredValue::Legacy(_)))
            .count();
        writeln!(writer, "Sites: {}", sites.len())?;
        writeln!(writer, "Total time: {}", format_duration(total))?;
        if legacy > 0 {
            writeln!(writer, "Legacy entries: {legacy}")?;
        }
    }
    if rows > sites.len() {
        writeln!(writer, "Unreadable entries: {}", rows - sites.len())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use st_core::{SiteKey, SiteRecord};

    #[test]
    fn status_command_summarizes_stored_sites() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("st.db");
        let db = Database::open(&db_path).unwrap();
        db.put_site(&SiteKey::new("a.com").unwrap(), StoredValue::Legacy(60_000))
            .unwrap();
        db.put_site(
            &SiteKey::new("b.com").unwrap(),
            StoredValue::Record(SiteRecord {
                time: 3_600_000,
                sessions: 3_600,
                last_visited: Some(1),
            }),
        )
        .unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &db, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/st.db");
        assert_snapshot!(output, @r"
        Site tracker status
        Database: [TEMP]/st.db
        Tick interval: 1000ms
        Sites: 2
        Total time: 1h 1m
        Legacy entries: 1
        ");
    }

    #[test]
    fn status_command_reports_empty_store() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let mut output = Vec::new();
        run(&mut output, &db, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("No sites recorded."));
    }
}
