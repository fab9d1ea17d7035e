use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity claims taken from an initData payload whose signature checked out.
///
/// Request-scoped and never persisted. Both fields may be absent when the
/// payload carried no `user` object; backends treat that as "not allowed".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerifiedIdentity {
    id: Option<i64>,
    username: Option<String>,
}

impl VerifiedIdentity {
    /// Wrap claims that have already passed initData signature verification.
    ///
    /// Callers must not feed this with anything read from an unverified request.
    pub fn from_verified_claims(id: Option<i64>, username: Option<String>) -> Self {
        Self { id, username }
    }

    /// Telegram user id.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Telegram username as sent by Telegram (case preserved, no `@`).
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none() && self.username.is_none()
    }
}

impl fmt::Display for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "tg:{id}"),
            None => write!(f, "tg:anonymous"),
        }
    }
}

/// Access level attached to a published resource.
///
/// Shared with the publishing side: `public` is listed for everyone,
/// `private` only for identities the active backend admits, and `none`
/// (or no value at all) is shown to nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequirement {
    Public,
    Private,
    #[default]
    None,
}

impl AccessRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequirement::Public => "public",
            AccessRequirement::Private => "private",
            AccessRequirement::None => "none",
        }
    }

    /// Interpret a front-matter `access` value. Absent or unrecognised values
    /// collapse to `None`, so a typo never widens access.
    pub fn from_front_matter(value: Option<&str>) -> Self {
        match value {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = raw, "unrecognised access value; treating as none");
                AccessRequirement::None
            }),
            None => AccessRequirement::None,
        }
    }
}

impl FromStr for AccessRequirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(AccessRequirement::Public),
            "private" => Ok(AccessRequirement::Private),
            "none" | "" => Ok(AccessRequirement::None),
            other => Err(format!("unknown access requirement: {other}")),
        }
    }
}

impl fmt::Display for AccessRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a verified identity was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The backend answered "no" for this identity.
    NotAuthorized,
    /// The resource has no access rule that could admit anyone.
    NotListed,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotAuthorized => "NOT_AUTHORIZED",
            DenyReason::NotListed => "NOT_LISTED",
        }
    }
}

/// Outcome of a completed access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Grant,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_granted(&self) -> bool {
        matches!(self, Verdict::Grant)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Verdict::Grant => None,
            Verdict::Deny(reason) => Some(*reason),
        }
    }
}
