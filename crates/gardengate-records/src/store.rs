use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AllowedUserRecord, RecordKey};

/// Read-only access to the allowed-users table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn name(&self) -> &str;

    /// At most one record matching `key`, the latest-expiring one if several.
    /// Rows without an expiry can never grant and are skipped.
    async fn find(&self, key: &RecordKey) -> Result<Option<AllowedUserRecord>>;
}

/// The latest-expiring record, compared on parsed instants rather than on
/// whatever text the store holds.
pub(crate) fn latest(records: Vec<AllowedUserRecord>) -> Option<AllowedUserRecord> {
    records.into_iter().max_by_key(|record| record.expires_at)
}

/// Table names are interpolated into queries and URLs, so keep them to
/// plain identifiers.
pub(crate) fn is_valid_table(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_compares_instants() {
        let record = |raw: &str| AllowedUserRecord {
            telegram_id: 1,
            expires_at: Some(crate::types::parse_timestamp(raw).unwrap()),
        };
        // 10:00+05:00 is 05:00Z, an hour before 06:00Z
        let picked = latest(vec![
            record("2030-01-01T10:00:00+05:00"),
            record("2030-01-01T06:00:00Z"),
        ])
        .unwrap();
        assert_eq!(picked, record("2030-01-01T06:00:00Z"));
        assert!(latest(Vec::new()).is_none());
    }

    #[test]
    fn table_names_are_identifiers() {
        assert!(is_valid_table("allowed_users"));
        assert!(is_valid_table("_t1"));
        assert!(!is_valid_table(""));
        assert!(!is_valid_table("1users"));
        assert!(!is_valid_table("users; DROP TABLE x"));
        assert!(!is_valid_table("users?select=*"));
    }
}
