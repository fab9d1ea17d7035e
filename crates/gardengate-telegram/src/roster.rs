//! Group roster for verified callers: the group's administrators plus the
//! caller's own membership entry.
//!
//! Bots cannot enumerate ordinary members, so the administrator list is the
//! best available view. When even that is refused, the chat's own info stands
//! in for it.

use gardengate_core::{AccessError, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::membership::{ChatDirectory, GroupInfo, GroupMember, GroupRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RosterEntry {
    Member(GroupMember),
    Chat(GroupInfo),
}

impl RosterEntry {
    fn id(&self) -> i64 {
        match self {
            RosterEntry::Member(m) => m.id,
            RosterEntry::Chat(c) => c.id,
        }
    }
}

pub async fn group_roster(
    directory: &dyn ChatDirectory,
    group: &GroupRef,
    caller_id: i64,
) -> Result<Vec<RosterEntry>> {
    let mut entries: Vec<RosterEntry> = match directory.administrators(group).await {
        Ok(admins) => {
            info!(group = %group, count = admins.len(), "fetched group administrators");
            admins.into_iter().map(RosterEntry::Member).collect()
        }
        Err(e) => {
            warn!(group = %group, error = %e, "administrators unavailable; falling back to chat info");
            let chat = directory
                .chat_info(group)
                .await
                .map_err(AccessError::from)?;
            vec![RosterEntry::Chat(chat)]
        }
    };

    match directory.member(group, caller_id).await {
        Ok(me) => {
            if !entries.iter().any(|e| e.id() == me.id) {
                entries.push(RosterEntry::Member(me));
            }
        }
        Err(e) => warn!(group = %group, error = %e, "caller membership unavailable"),
    }

    Ok(entries)
}
