use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use crate::error::{RecordError, Result};
use crate::store::{is_valid_table, latest, RecordStore};
use crate::types::{parse_timestamp, AllowedUserRecord, RecordKey};

/// Create the allowed-users table. Used by tooling and tests; the gateway
/// itself only ever reads. `telegram_id` is declared without a type so SQLite
/// keeps integer and text ids exactly as they were written.
pub fn init_db(conn: &Connection, table: &str) -> Result<()> {
    if !is_valid_table(table) {
        return Err(RecordError::InvalidTable(table.to_string()));
    }
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            telegram_id  NOT NULL,
            expires_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_telegram_id
            ON {table} (telegram_id);"
    ))?;
    Ok(())
}

/// Map a `SELECT telegram_id, expires_at` row to a record.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Value, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn into_record(telegram_id: Value, expires_at: Option<String>) -> Result<AllowedUserRecord> {
    let telegram_id = match telegram_id {
        Value::Integer(id) => id,
        Value::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| RecordError::InvalidRecord(format!("telegram_id {text:?} is not numeric")))?,
        other => {
            return Err(RecordError::InvalidRecord(format!(
                "telegram_id has unexpected type {:?}",
                other.data_type()
            )))
        }
    };
    let expires_at = expires_at.as_deref().map(parse_timestamp).transpose()?;
    Ok(AllowedUserRecord {
        telegram_id,
        expires_at,
    })
}

/// SQLite-backed record store.
///
/// rusqlite is blocking, so every query runs on the blocking pool with the
/// connection behind a mutex.
pub struct SqliteRecordStore {
    db: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteRecordStore {
    /// Open an existing database read-only.
    pub fn open(path: &str, table: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, table)
    }

    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        if !is_valid_table(table) {
            return Err(RecordError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find(&self, key: &RecordKey) -> Result<Option<AllowedUserRecord>> {
        let db = Arc::clone(&self.db);
        let sql = format!(
            "SELECT telegram_id, expires_at FROM {}
             WHERE telegram_id = ?1 AND expires_at IS NOT NULL",
            self.table
        );
        let key = key.clone();

        let rows = tokio::task::spawn_blocking(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = match &key {
                RecordKey::Numeric(id) => stmt.query_map(params![id], row_to_record)?,
                RecordKey::Text(text) => stmt.query_map(params![text], row_to_record)?,
            };
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| RecordError::Join(e.to_string()))??;

        debug!(rows = rows.len(), "sqlite record lookup");
        // expires_at is TEXT here, so ordering is decided after parsing
        let records = rows
            .into_iter()
            .map(|(id, expires)| into_record(id, expires))
            .collect::<Result<Vec<_>>>()?;
        Ok(latest(records))
    }
}
