use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AccessError, Result};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RECORDS_TABLE: &str = "allowed_users";
pub const DEFAULT_CONFIG_PATH: &str = "gardengate.toml";

/// Flat environment names used by earlier deployments, mapped onto the
/// nested config keys. Later entries win, so a group username beats a group id.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("BOT_TOKEN", "telegram.bot_token"),
    ("ALLOWED_USERS", "access.static_list.users"),
    ("ALLOWLIST_FILE", "access.static_list.file"),
    ("PRIVATE_GROUP_ID", "access.membership.group"),
    ("PRIVATE_GROUP_USERNAME", "access.membership.group"),
    ("SUPABASE_URL", "access.records.url"),
    ("SUPABASE_ANON_KEY", "access.records.api_key"),
];

/// Top-level config (gardengate.toml + legacy env names + GARDENGATE_* overrides).
///
/// Built once at startup and handed to constructors; nothing below `main`
/// reads the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GardenConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot token; doubles as the initData signing secret.
    pub bot_token: Option<String>,
    /// Reject initData whose `auth_date` is older than this. Unset disables the check.
    pub max_auth_age_secs: Option<u64>,
    /// Bot API base URL override (self-hosted Bot API server).
    pub api_url: Option<String>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("max_auth_age_secs", &self.max_auth_age_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Which authorization backend answers for private resources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    StaticList,
    ExpiringRecord,
    LiveMembership,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::StaticList => "static-list",
            BackendKind::ExpiringRecord => "expiring-record",
            BackendKind::LiveMembership => "live-membership",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,
    /// JSON manifest of resource permalinks → access requirement.
    pub manifest_path: Option<String>,
    #[serde(default)]
    pub static_list: StaticListConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            backend_timeout_secs: default_backend_timeout_secs(),
            manifest_path: None,
            static_list: StaticListConfig::default(),
            records: RecordsConfig::default(),
            membership: MembershipConfig::default(),
        }
    }
}

/// Allowlist source. When both are set the file wins.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticListConfig {
    /// Inline comma-separated usernames, e.g. `"alice, @bob"`.
    pub users: Option<String>,
    /// Line-oriented file; `#` starts a comment line.
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStoreKind {
    #[default]
    Sqlite,
    Rest,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default)]
    pub store: RecordStoreKind,
    /// SQLite database file (store = "sqlite").
    pub path: Option<String>,
    /// PostgREST base URL, e.g. `https://xyz.supabase.co` (store = "rest").
    pub url: Option<String>,
    /// PostgREST API key, sent as `apikey` and bearer token.
    pub api_key: Option<String>,
    #[serde(default = "default_records_table")]
    pub table: String,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            store: RecordStoreKind::default(),
            path: None,
            url: None,
            api_key: None,
            table: default_records_table(),
        }
    }
}

impl fmt::Debug for RecordsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordsConfig")
            .field("store", &self.store)
            .field("path", &self.path)
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .finish()
    }
}

/// A Telegram group reference as written in config: numeric chat id or handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GroupSetting {
    Id(i64),
    Handle(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MembershipConfig {
    pub group: Option<GroupSetting>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_backend_timeout_secs() -> u64 {
    DEFAULT_BACKEND_TIMEOUT_SECS
}
fn default_records_table() -> String {
    DEFAULT_RECORDS_TABLE.to_string()
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

impl GardenConfig {
    /// Load config from a TOML file, then legacy env names, then
    /// `GARDENGATE_*` env vars (`__` separates nested keys).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(legacy_env())
            .merge(Env::prefixed("GARDENGATE_").split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| AccessError::Config(e.to_string()))
    }

    /// Fail fast on settings the selected backend cannot run without.
    pub fn validate(&self) -> Result<()> {
        self.bot_token()?;

        let access = &self.access;
        if access.backend_timeout_secs == 0 {
            return Err(AccessError::Config(
                "access.backend_timeout_secs must be greater than zero".into(),
            ));
        }

        match access.backend {
            BackendKind::StaticList => {
                if is_blank(access.static_list.users.as_deref())
                    && is_blank(access.static_list.file.as_deref())
                {
                    return Err(AccessError::BackendMisconfigured(
                        "static-list backend needs access.static_list.users or access.static_list.file"
                            .into(),
                    ));
                }
            }
            BackendKind::ExpiringRecord => match access.records.store {
                RecordStoreKind::Sqlite => {
                    if is_blank(access.records.path.as_deref()) {
                        return Err(AccessError::BackendMisconfigured(
                            "sqlite record store needs access.records.path".into(),
                        ));
                    }
                }
                RecordStoreKind::Rest => {
                    if is_blank(access.records.url.as_deref())
                        || is_blank(access.records.api_key.as_deref())
                    {
                        return Err(AccessError::BackendMisconfigured(
                            "rest record store needs access.records.url and access.records.api_key"
                                .into(),
                        ));
                    }
                }
            },
            BackendKind::LiveMembership => {
                let missing = match &access.membership.group {
                    None => true,
                    Some(GroupSetting::Handle(h)) => h.trim().is_empty(),
                    Some(GroupSetting::Id(_)) => false,
                };
                if missing {
                    return Err(AccessError::BackendMisconfigured(
                        "live-membership backend needs access.membership.group".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn bot_token(&self) -> Result<&str> {
        match self.telegram.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(AccessError::BackendMisconfigured(
                "telegram.bot_token (BOT_TOKEN) is not set".into(),
            )),
        }
    }

    pub fn backend_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.access.backend_timeout_secs)
    }
}

fn legacy_env() -> Figment {
    LEGACY_ENV.iter().fold(Figment::new(), |figment, &(var, key)| {
        figment.merge(Env::raw().only(&[var]).map(move |_| key.into()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(raw: &str) -> GardenConfig {
        GardenConfig::from_figment(Figment::new().merge(Toml::string(raw))).unwrap()
    }

    #[test]
    fn defaults_apply_to_empty_file() {
        let cfg = from_toml("");
        assert_eq!(cfg.server.port, DEFAULT_PORT);
        assert_eq!(cfg.server.bind, DEFAULT_BIND);
        assert_eq!(cfg.access.backend, BackendKind::StaticList);
        assert_eq!(cfg.access.backend_timeout_secs, 5);
        assert_eq!(cfg.access.records.table, "allowed_users");
    }

    #[test]
    fn missing_bot_token_fails_validation() {
        let cfg = from_toml(
            r#"
            [access.static_list]
            users = "alice"
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, AccessError::BackendMisconfigured(_)));
    }

    #[test]
    fn static_list_needs_a_source() {
        let cfg = from_toml(
            r#"
            [telegram]
            bot_token = "123:abc"
            "#,
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn group_accepts_id_or_handle() {
        let by_id = from_toml(
            r#"
            [telegram]
            bot_token = "123:abc"
            [access]
            backend = "live-membership"
            [access.membership]
            group = -1001234567890
            "#,
        );
        assert_eq!(
            by_id.access.membership.group,
            Some(GroupSetting::Id(-1001234567890))
        );
        assert!(by_id.validate().is_ok());

        let by_handle = from_toml(
            r#"
            [telegram]
            bot_token = "123:abc"
            [access]
            backend = "live-membership"
            [access.membership]
            group = "my_garden"
            "#,
        );
        assert_eq!(
            by_handle.access.membership.group,
            Some(GroupSetting::Handle("my_garden".into()))
        );
    }

    #[test]
    fn rest_store_requires_credentials() {
        let cfg = from_toml(
            r#"
            [telegram]
            bot_token = "123:abc"
            [access]
            backend = "expiring-record"
            [access.records]
            store = "rest"
            url = "https://example.supabase.co"
            "#,
        );
        assert!(matches!(
            cfg.validate().unwrap_err(),
            AccessError::BackendMisconfigured(_)
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = from_toml(
            r#"
            [telegram]
            bot_token = "123:super-secret"
            [access.records]
            api_key = "anon-key-value"
            "#,
        );
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("anon-key-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
