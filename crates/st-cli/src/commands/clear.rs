//! Clear command: removes every stored site record in one statement.

use std::io::Write;

use anyhow::Result;

use st_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database) -> Result<usize> {
    let removed = db.clear_sites()?;
    tracing::info!(removed, "cleared site records");
    writeln!(writer, "Cleared {removed} site(s).")?;
    Ok(removed)
}
