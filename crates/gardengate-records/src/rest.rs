//! PostgREST-style record store (`GET {url}/rest/v1/{table}?telegram_id=eq.42`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{RecordError, Result};
use crate::store::{is_valid_table, latest, RecordStore};
use crate::types::{parse_timestamp, AllowedUserRecord, RecordKey};

#[derive(Debug, Deserialize)]
struct Row {
    telegram_id: Value,
    #[serde(default)]
    expires_at: Option<String>,
}

impl Row {
    fn into_record(self) -> Result<AllowedUserRecord> {
        let telegram_id = match &self.telegram_id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            RecordError::InvalidRecord(format!("telegram_id {} is not numeric", self.telegram_id))
        })?;
        let expires_at = self.expires_at.as_deref().map(parse_timestamp).transpose()?;
        Ok(AllowedUserRecord {
            telegram_id,
            expires_at,
        })
    }
}

/// Filter value for the `telegram_id` column. PostgREST treats a quoted
/// operand as a literal string, which is how text-typed ids are matched.
fn eq_filter(key: &RecordKey) -> String {
    match key {
        RecordKey::Numeric(id) => format!("eq.{id}"),
        RecordKey::Text(text) => format!("eq.\"{}\"", text.replace('"', "\\\"")),
    }
}

pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestRecordStore {
    pub fn new(url: &str, api_key: &str, table: &str, timeout: Duration) -> Result<Self> {
        if !is_valid_table(table) {
            return Err(RecordError::InvalidTable(table.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    fn name(&self) -> &str {
        "rest"
    }

    async fn find(&self, key: &RecordKey) -> Result<Option<AllowedUserRecord>> {
        let filter = eq_filter(key);
        let resp = self
            .client
            .get(self.endpoint())
            .query(&[
                ("select", "telegram_id,expires_at"),
                ("telegram_id", filter.as_str()),
                ("expires_at", "not.is.null"),
                ("order", "expires_at.desc.nullslast"),
                ("limit", "1"),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if matches!(status.as_u16(), 401 | 403 | 404) {
            return Err(RecordError::Rejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RecordError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let rows: Vec<Row> = resp.json().await?;
        debug!(key = key.kind(), rows = rows.len(), "rest record lookup");
        let records = rows
            .into_iter()
            .map(Row::into_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(latest(records))
    }
}
