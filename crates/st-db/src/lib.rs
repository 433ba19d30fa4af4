//! Storage layer for the site time tracker.
//!
//! Provides the durable aggregate store using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! [`SqliteStore`] provides that synchronization: it owns the `Database` behind a
//! mutex and runs every operation on tokio's blocking pool, exposing the async
//! [`SiteStore`] interface the accumulation engine expects.
//!
//! # Schema
//!
//! The store is a flat key/value namespace: one row per hostname.
//!
//! - `key`: normalized hostname
//! - `value`: JSON, either a record object (`{"time":..,"sessions":..,"lastVisited":..}`)
//!   or a bare integer written by the legacy schema
//! - `updated_at`: ISO 8601 timestamp of the last write (e.g., `2024-01-15T10:30:00Z`)
//!
//! Legacy values are never rewritten in place; they are migrated on read and
//! replaced by a record the next time the site accumulates time.
//!
//! Accumulation goes through [`Database::merge_site`], which reads and writes
//! inside one `IMMEDIATE` transaction. A clear issued by another process is
//! then serialized against it by `SQLite`'s write lock.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use thiserror::Error;

use st_core::{SiteKey, SiteRecord, SiteStore, Snapshot, StoreError, StoredValue};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to encode a value for storage.
    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        // `st clear` and the tracker daemon may write at the same time
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Sites table: one accumulated value per hostname
            -- value: JSON record object, or a bare integer (legacy schema)
            -- updated_at: ISO 8601 format (e.g., '2024-01-15T10:30:00Z')
            CREATE TABLE IF NOT EXISTS sites (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads the value stored for a site.
    ///
    /// A row whose value cannot be decoded is reported as absent, so the next
    /// write replaces it.
    pub fn get_site(&self, key: &SiteKey) -> Result<Option<StoredValue>, DbError> {
        read_value(&self.conn, key)
    }

    /// Inserts or replaces the value for a site.
    pub fn put_site(&self, key: &SiteKey, value: StoredValue) -> Result<(), DbError> {
        write_value(&self.conn, key, value, Utc::now())
    }

    /// Adds one tick's time to a site's record and returns the new record.
    ///
    /// The read and the upsert share one `IMMEDIATE` transaction, which takes
    /// the write lock before reading. A `clear_sites` from any connection is
    /// therefore ordered strictly before or after the merge.
    pub fn merge_site(
        &mut self,
        key: &SiteKey,
        delta_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<SiteRecord, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let merged = read_value(&tx, key)?
            .map(StoredValue::normalize)
            .unwrap_or_default()
            .merge(delta_ms, now);
        write_value(&tx, key, merged.into(), now)?;
        tx.commit()?;
        Ok(merged)
    }

    /// Lists every decodable site value, ordered by hostname.
    ///
    /// Rows with an invalid hostname or an undecodable value are skipped.
    pub fn list_sites(&self) -> Result<Snapshot, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM sites ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;
        let mut sites = Snapshot::new();
        for row in rows {
            let (raw_key, raw_value) = row?;
            let key = match SiteKey::new(&raw_key) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(key = raw_key, %err, "skipping row with invalid site key");
                    continue;
                }
            };
            if let Some(value) = decode_value(&raw_key, &raw_value) {
                sites.insert(key, value);
            }
        }
        Ok(sites)
    }

    /// Writes every value in `values`, replacing existing rows, in one transaction.
    pub fn import_sites(&mut self, values: &Snapshot) -> Result<usize, DbError> {
        if values.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        for (key, value) in values {
            write_value(&tx, key, *value, now)?;
        }
        tx.commit()?;
        Ok(values.len())
    }

    /// Removes every site. Returns the number of rows removed.
    pub fn clear_sites(&self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM sites", [])?)
    }

    /// Counts stored rows, including undecodable ones.
    pub fn site_count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Async [`SiteStore`] over a [`Database`].
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    async fn with_db<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Database) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut db = db.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut db)
        })
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))?
        .map_err(|err| StoreError::Backend(Box::new(err)))
    }
}

impl SiteStore for SqliteStore {
    async fn get(&self, key: &SiteKey) -> Result<Option<StoredValue>, StoreError> {
        let key = key.clone();
        self.with_db(move |db| db.get_site(&key)).await
    }

    async fn set(&self, key: &SiteKey, value: StoredValue) -> Result<(), StoreError> {
        let key = key.clone();
        self.with_db(move |db| db.put_site(&key, value)).await
    }

    async fn merge(
        &self,
        key: &SiteKey,
        delta_ms: u64,
        at: DateTime<Utc>,
    ) -> Result<SiteRecord, StoreError> {
        let key = key.clone();
        self.with_db(move |db| db.merge_site(&key, delta_ms, at)).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_db(|db| db.clear_sites().map(|_| ())).await
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.with_db(|db| db.list_sites()).await
    }
}

/// Reads and decodes one row.
///
/// A row whose value cannot be decoded is reported as absent, so the next
/// write replaces it.
fn read_value(conn: &Connection, key: &SiteKey) -> Result<Option<StoredValue>, DbError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM sites WHERE key = ?",
            [key.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|raw| decode_value(key.as_str(), &raw)))
}

fn write_value(
    conn: &Connection,
    key: &SiteKey,
    value: StoredValue,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let encoded = encode_value(key, value)?;
    conn.execute(
        "
        INSERT INTO sites (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        ",
        params![key.as_str(), encoded, format_timestamp(now)],
    )?;
    Ok(())
}

fn encode_value(key: &SiteKey, value: StoredValue) -> Result<String, DbError> {
    serde_json::to_string(&value).map_err(|source| DbError::Encode {
        key: key.to_string(),
        source,
    })
}

fn decode_value(key: &str, raw: &str) -> Option<StoredValue> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, %err, "skipping undecodable site value");
            None
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
