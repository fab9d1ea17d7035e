use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{RecordError, Result};

/// One row of the externally managed `allowed_users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedUserRecord {
    pub telegram_id: i64,
    /// `None` when the store holds no expiry; such a record never grants.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AllowedUserRecord {
    /// Inclusive: a record expiring exactly at `now` is still active.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires >= now)
    }
}

/// How to match `telegram_id`. Historical rows hold the id either as a
/// number or as text, so lookups try both forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Numeric(i64),
    Text(String),
}

impl RecordKey {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordKey::Numeric(_) => "numeric",
            RecordKey::Text(_) => "text",
        }
    }
}

/// Accepts RFC 3339 (`2025-06-01T12:00:00Z`, Postgres `timestamptz` JSON) and
/// SQLite's `datetime()` form (`2025-06-01 12:00:00`, read as UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RecordError::InvalidRecord(format!("unparseable expires_at: {raw}")))
}
