//! Live group-membership checks through the Telegram Bot API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gardengate_core::config::GroupSetting;
use gardengate_core::{AccessError, AuthorizationBackend, Result, VerifiedIdentity};
use serde::Serialize;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, ChatMember, Recipient, UserId};
use teloxide::Bot;
use tracing::{debug, warn};

use crate::error::{TelegramError, TgResult};

/// A member's standing in a group, as reported by `getChatMember`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Creator, administrator and plain member count as "in the group".
    pub fn is_present(self) -> bool {
        matches!(
            self,
            MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Creator => "creator",
            MemberStatus::Administrator => "administrator",
            MemberStatus::Member => "member",
            MemberStatus::Restricted => "restricted",
            MemberStatus::Left => "left",
            MemberStatus::Kicked => "kicked",
        }
    }

    fn of(member: &ChatMember) -> Self {
        let kind = &member.kind;
        if kind.is_owner() {
            MemberStatus::Creator
        } else if kind.is_administrator() {
            MemberStatus::Administrator
        } else if kind.is_restricted() {
            MemberStatus::Restricted
        } else if kind.is_left() {
            MemberStatus::Left
        } else if kind.is_banned() {
            MemberStatus::Kicked
        } else {
            MemberStatus::Member
        }
    }
}

/// The group to check: numeric chat id or an `@handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    Id(i64),
    Handle(String),
}

impl GroupRef {
    /// Numeric strings become ids; anything else is a handle, `@`-prefixed if bare.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "@" {
            return None;
        }
        if let Ok(id) = raw.parse::<i64>() {
            return Some(GroupRef::Id(id));
        }
        if raw.starts_with('@') {
            Some(GroupRef::Handle(raw.to_string()))
        } else {
            Some(GroupRef::Handle(format!("@{raw}")))
        }
    }

    pub fn from_setting(setting: &GroupSetting) -> Option<Self> {
        match setting {
            GroupSetting::Id(id) => Some(GroupRef::Id(*id)),
            GroupSetting::Handle(handle) => Self::parse(handle),
        }
    }

    fn recipient(&self) -> Recipient {
        match self {
            GroupRef::Id(id) => Recipient::Id(ChatId(*id)),
            GroupRef::Handle(handle) => Recipient::ChannelUsername(handle.clone()),
        }
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Id(id) => write!(f, "{id}"),
            GroupRef::Handle(handle) => f.write_str(handle),
        }
    }
}

/// One group member as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMember {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: MemberStatus,
}

impl GroupMember {
    fn from_chat_member(member: &ChatMember) -> Self {
        let user = &member.user;
        Self {
            id: user.id.0 as i64,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()).filter(|n| !n.is_empty()),
            last_name: user.last_name.clone(),
            status: MemberStatus::of(member),
        }
    }
}

/// Basic facts about the group chat itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// The Bot API calls this crate relies on. `BotDirectory` is the real one;
/// tests substitute their own.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn member(&self, group: &GroupRef, user_id: i64) -> TgResult<GroupMember>;

    async fn administrators(&self, group: &GroupRef) -> TgResult<Vec<GroupMember>>;

    async fn chat_info(&self, group: &GroupRef) -> TgResult<GroupInfo>;
}

/// `ChatDirectory` backed by a teloxide `Bot`.
#[derive(Clone)]
pub struct BotDirectory {
    bot: Bot,
}

impl BotDirectory {
    pub fn new(
        bot_token: &str,
        timeout: Duration,
        api_url: Option<&str>,
    ) -> TgResult<Self> {
        if bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .map_err(|e| TelegramError::Client(e.to_string()))?;

        let mut bot = Bot::with_client(bot_token, client);
        if let Some(url) = api_url {
            let url = reqwest::Url::parse(url)
                .map_err(|e| TelegramError::InvalidApiUrl(e.to_string()))?;
            bot = bot.set_api_url(url);
        }
        Ok(Self { bot })
    }
}

#[async_trait]
impl ChatDirectory for BotDirectory {
    async fn member(&self, group: &GroupRef, user_id: i64) -> TgResult<GroupMember> {
        let user_id = UserId(user_id as u64);
        let member = self.bot.get_chat_member(group.recipient(), user_id).await?;
        Ok(GroupMember::from_chat_member(&member))
    }

    async fn administrators(&self, group: &GroupRef) -> TgResult<Vec<GroupMember>> {
        let admins = self.bot.get_chat_administrators(group.recipient()).await?;
        Ok(admins.iter().map(GroupMember::from_chat_member).collect())
    }

    async fn chat_info(&self, group: &GroupRef) -> TgResult<GroupInfo> {
        let chat = self.bot.get_chat(group.recipient()).await?;
        let kind = if chat.is_private() {
            "private"
        } else if chat.is_group() {
            "group"
        } else if chat.is_supergroup() {
            "supergroup"
        } else {
            "channel"
        };
        Ok(GroupInfo {
            id: chat.id.0,
            title: chat.title().map(String::from),
            username: chat.username().map(String::from),
            kind,
        })
    }
}

/// Admits identities that are currently present in one Telegram group.
pub struct LiveMembershipBackend {
    directory: Arc<dyn ChatDirectory>,
    group: GroupRef,
}

impl LiveMembershipBackend {
    pub fn new(directory: Arc<dyn ChatDirectory>, group: GroupRef) -> Self {
        Self { directory, group }
    }

    pub fn group(&self) -> &GroupRef {
        &self.group
    }

    pub fn directory(&self) -> &Arc<dyn ChatDirectory> {
        &self.directory
    }
}

#[async_trait]
impl AuthorizationBackend for LiveMembershipBackend {
    fn name(&self) -> &str {
        "live-membership"
    }

    async fn check(&self, identity: &VerifiedIdentity) -> Result<bool> {
        let Some(user_id) = identity.id().filter(|id| *id > 0) else {
            debug!(identity = %identity, "no usable user id; membership cannot match");
            return Ok(false);
        };

        match self.directory.member(&self.group, user_id).await {
            Ok(member) => {
                debug!(
                    identity = %identity,
                    group = %self.group,
                    status = member.status.as_str(),
                    "membership looked up"
                );
                Ok(member.status.is_present())
            }
            Err(e) if e.is_user_absent() => Ok(false),
            Err(e) => {
                let err = AccessError::from(e);
                warn!(group = %self.group, code = err.code(), error = %err, "membership lookup failed");
                Err(err)
            }
        }
    }
}
