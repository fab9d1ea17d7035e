//! Startup wiring: pick the one authorization backend the config names.

use std::sync::Arc;

use gardengate_core::config::{BackendKind, RecordStoreKind};
use gardengate_core::{AccessError, AuthorizationBackend, GardenConfig, Result};
use gardengate_records::{ExpiringRecordBackend, RecordStore, RestRecordStore, SqliteRecordStore};
use gardengate_telegram::{
    AllowlistSource, BotDirectory, ChatDirectory, GroupRef, LiveMembershipBackend,
    StaticListBackend,
};

use tracing::debug;

use crate::app::MembershipView;

pub struct Built {
    pub backend: Arc<dyn AuthorizationBackend>,
    /// Present only for the live-membership backend; the roster endpoint
    /// reuses its directory and group.
    pub membership: Option<MembershipView>,
}

pub fn build(config: &GardenConfig) -> Result<Built> {
    let access = &config.access;
    match access.backend {
        BackendKind::StaticList => {
            let source = AllowlistSource::from_config(&access.static_list)?;
            debug!(from_file = source.is_file(), "static allowlist configured");
            Ok(Built {
                backend: Arc::new(StaticListBackend::new(source)),
                membership: None,
            })
        }
        BackendKind::ExpiringRecord => {
            let records = &access.records;
            let store: Arc<dyn RecordStore> = match records.store {
                RecordStoreKind::Sqlite => {
                    let path = required(records.path.as_deref(), "access.records.path")?;
                    Arc::new(SqliteRecordStore::open(path, &records.table)?)
                }
                RecordStoreKind::Rest => {
                    let url = required(records.url.as_deref(), "access.records.url")?;
                    let key = required(records.api_key.as_deref(), "access.records.api_key")?;
                    Arc::new(RestRecordStore::new(
                        url,
                        key,
                        &records.table,
                        config.backend_timeout(),
                    )?)
                }
            };
            Ok(Built {
                backend: Arc::new(ExpiringRecordBackend::new(store)),
                membership: None,
            })
        }
        BackendKind::LiveMembership => {
            let group = access
                .membership
                .group
                .as_ref()
                .and_then(GroupRef::from_setting)
                .ok_or_else(|| {
                    AccessError::BackendMisconfigured("access.membership.group is not set".into())
                })?;
            let directory: Arc<dyn ChatDirectory> = Arc::new(BotDirectory::new(
                config.bot_token()?,
                config.backend_timeout(),
                config.telegram.api_url.as_deref(),
            )?);
            let backend = LiveMembershipBackend::new(directory, group);
            let view = MembershipView {
                directory: Arc::clone(backend.directory()),
                group: backend.group().clone(),
            };
            Ok(Built {
                backend: Arc::new(backend),
                membership: Some(view),
            })
        }
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AccessError::BackendMisconfigured(format!("{key} is not set")))
}
