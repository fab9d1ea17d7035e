use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gardengate_core::{AccessError, AuthorizationBackend, Result, VerifiedIdentity};
use tracing::debug;

use crate::store::RecordStore;
use crate::types::{AllowedUserRecord, RecordKey};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Grants while the identity's record has not yet expired.
pub struct ExpiringRecordBackend {
    store: Arc<dyn RecordStore>,
    clock: Clock,
}

impl ExpiringRecordBackend {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<dyn RecordStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Numeric form first. The text form is tried only when the numeric
    /// lookup found nothing; a failing store is reported, not retried.
    async fn lookup(&self, id: i64) -> crate::error::Result<Option<AllowedUserRecord>> {
        if let Some(record) = self.store.find(&RecordKey::Numeric(id)).await? {
            return Ok(Some(record));
        }
        debug!(store = self.store.name(), "no numeric match, trying text id");
        self.store.find(&RecordKey::Text(id.to_string())).await
    }
}

#[async_trait]
impl AuthorizationBackend for ExpiringRecordBackend {
    fn name(&self) -> &str {
        "expiring-record"
    }

    async fn check(&self, identity: &VerifiedIdentity) -> Result<bool> {
        let Some(id) = identity.id() else {
            return Ok(false);
        };
        let record = self.lookup(id).await.map_err(AccessError::from)?;
        let now = (self.clock)();
        Ok(record.is_some_and(|r| r.is_active_at(now)))
    }
}
