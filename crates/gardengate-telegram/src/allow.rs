//! Static username allowlist.
//!
//! Deny-by-default: an empty list admits no one. Matching is
//! case-insensitive and ignores a leading `@`, so `Alice`, `alice` and
//! `@alice` are the same entry. Identities without a username never match.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use gardengate_core::config::StaticListConfig;
use gardengate_core::{AccessError, AuthorizationBackend, Result, VerifiedIdentity};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Coarsest mtime resolution we expect from a filesystem (FAT keeps two
/// seconds). A stamp younger than this at read time may hide a later write.
const MTIME_GRANULARITY: Duration = Duration::from_secs(2);

/// Canonical form of one allowlist entry or username. Blank entries and
/// `#` comments yield `None`.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('#') {
        return None;
    }
    let name = trimmed.trim_start_matches('@').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// An immutable, normalized set of usernames.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    users: HashSet<String>,
}

impl Allowlist {
    /// Parse a line-oriented list. Each line may also hold several
    /// comma-separated entries, which covers the inline `"alice, @bob"` form.
    pub fn parse(raw: &str) -> Self {
        let users = raw
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .flat_map(|line| line.split(','))
            .filter_map(normalize_username)
            .collect();
        Self { users }
    }

    pub fn contains(&self, username: &str) -> bool {
        normalize_username(username).is_some_and(|name| self.users.contains(&name))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Size and mtime of the allowlist file when it was last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct Snapshot {
    stamp: FileStamp,
    read_at: SystemTime,
    digest: Vec<u8>,
    list: Arc<Allowlist>,
}

impl Snapshot {
    /// The cached list is trusted only when the stamp still matches and the
    /// file had stopped changing well before we read it.
    fn still_valid(&self, stamp: FileStamp) -> bool {
        self.stamp == stamp
            && stamp
                .modified
                .and_then(|modified| self.read_at.duration_since(modified).ok())
                .is_some_and(|age| age >= MTIME_GRANULARITY)
    }
}

/// Where the allowlist comes from.
///
/// File sources are re-checked on every decision. The file is re-read whenever
/// its stamp moved or is too fresh to trust, and only reparsed when its
/// content digest changed. A new list is swapped in as a new `Arc`, so
/// concurrent readers see either the old list or the new one.
#[derive(Debug)]
pub struct AllowlistSource {
    kind: SourceKind,
}

#[derive(Debug)]
enum SourceKind {
    Inline(Arc<Allowlist>),
    File {
        path: PathBuf,
        cached: RwLock<Option<Snapshot>>,
    },
}

impl AllowlistSource {
    pub fn inline(raw: &str) -> Self {
        Self {
            kind: SourceKind::Inline(Arc::new(Allowlist::parse(raw))),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::File {
                path: path.into(),
                cached: RwLock::new(None),
            },
        }
    }

    pub fn from_config(cfg: &StaticListConfig) -> Result<Self> {
        match (cfg.file.as_deref(), cfg.users.as_deref()) {
            (Some(path), _) if !path.trim().is_empty() => Ok(Self::file(path.trim())),
            (_, Some(users)) => Ok(Self::inline(users)),
            _ => Err(AccessError::BackendMisconfigured(
                "no allowlist source configured".into(),
            )),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, SourceKind::File { .. })
    }

    /// The list as of now.
    pub async fn current(&self) -> Result<Arc<Allowlist>> {
        match &self.kind {
            SourceKind::Inline(list) => Ok(Arc::clone(list)),
            SourceKind::File { path, cached } => {
                let meta = tokio::fs::metadata(path).await.map_err(|e| {
                    AccessError::BackendUnavailable(format!(
                        "allowlist {} unreadable: {e}",
                        path.display()
                    ))
                })?;
                let stamp = FileStamp {
                    modified: meta.modified().ok(),
                    len: meta.len(),
                };

                {
                    let guard = cached.read().unwrap_or_else(|e| e.into_inner());
                    if let Some(snapshot) = guard.as_ref() {
                        if snapshot.still_valid(stamp) {
                            return Ok(Arc::clone(&snapshot.list));
                        }
                    }
                }

                let read_at = SystemTime::now();
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AccessError::BackendUnavailable(format!(
                        "allowlist {} unreadable: {e}",
                        path.display()
                    ))
                })?;
                let digest = Sha256::digest(raw.as_bytes()).to_vec();

                let mut guard = cached.write().unwrap_or_else(|e| e.into_inner());
                let list = match guard.as_ref() {
                    Some(snapshot) if snapshot.digest == digest => Arc::clone(&snapshot.list),
                    _ => {
                        let list = Arc::new(Allowlist::parse(&raw));
                        info!(entries = list.len(), "allowlist reloaded");
                        list
                    }
                };
                *guard = Some(Snapshot {
                    stamp,
                    read_at,
                    digest,
                    list: Arc::clone(&list),
                });
                Ok(list)
            }
        }
    }
}

/// Admits identities whose username is on the allowlist.
pub struct StaticListBackend {
    source: AllowlistSource,
}

impl StaticListBackend {
    pub fn new(source: AllowlistSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AuthorizationBackend for StaticListBackend {
    fn name(&self) -> &str {
        "static-list"
    }

    async fn check(&self, identity: &VerifiedIdentity) -> Result<bool> {
        let Some(username) = identity.username() else {
            debug!(identity = %identity, "no username; static list cannot match");
            return Ok(false);
        };
        let list = self.source.current().await?;
        Ok(list.contains(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn who(username: Option<&str>) -> VerifiedIdentity {
        VerifiedIdentity::from_verified_claims(Some(1), username.map(String::from))
    }

    #[test]
    fn empty_list_denies_all() {
        let list = Allowlist::parse("");
        assert!(list.is_empty());
        assert!(!list.contains("alice"));
    }

    #[test]
    fn case_and_at_prefix_are_ignored() {
        let list = Allowlist::parse("alice");
        assert!(list.contains("Alice"));
        assert!(list.contains("alice"));
        assert!(list.contains("@alice"));
        assert!(list.contains("  @ALICE "));
        assert!(!list.contains("bob"));
    }

    #[test]
    fn entries_are_normalized_too() {
        let list = Allowlist::parse("@Bob\n  CAROL  \n");
        assert!(list.contains("bob"));
        assert!(list.contains("carol"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let list = Allowlist::parse("# friends\n\nalice\n   # bob\n@\n");
        assert_eq!(list.len(), 1);
        assert!(list.contains("alice"));
        assert!(!list.contains("bob"));
        assert!(!list.contains("# friends"));
    }

    #[test]
    fn inline_comma_separated_form() {
        let list = Allowlist::parse("alice, @bob ,, carol");
        assert_eq!(list.len(), 3);
        assert!(list.contains("BOB"));
    }

    #[tokio::test]
    async fn missing_username_never_matches() {
        let backend = StaticListBackend::new(AllowlistSource::inline("alice"));
        assert!(!backend.check(&who(None)).await.unwrap());
    }

    #[tokio::test]
    async fn inline_backend_checks_membership() {
        let backend = StaticListBackend::new(AllowlistSource::inline("bob"));
        assert!(backend.check(&who(Some("Bob"))).await.unwrap());
        assert!(!backend.check(&who(Some("carol"))).await.unwrap());
    }

    #[tokio::test]
    async fn file_edits_take_effect_on_next_check() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice").unwrap();
        let backend = StaticListBackend::new(AllowlistSource::file(file.path()));

        assert!(backend.check(&who(Some("alice"))).await.unwrap());
        assert!(!backend.check(&who(Some("carol"))).await.unwrap());

        std::fs::write(file.path(), "alice\n@carol\n").unwrap();
        assert!(backend.check(&who(Some("carol"))).await.unwrap());

        std::fs::write(file.path(), "# everyone removed\n").unwrap();
        assert!(!backend.check(&who(Some("alice"))).await.unwrap());
    }

    #[tokio::test]
    async fn same_length_rewrite_with_unchanged_mtime_is_seen() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "alice\n").unwrap();
        let original = std::fs::metadata(file.path()).unwrap().modified().unwrap();
        let backend = StaticListBackend::new(AllowlistSource::file(file.path()));
        assert!(backend.check(&who(Some("alice"))).await.unwrap());

        std::fs::write(file.path(), "carol\n").unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_modified(original)
            .unwrap();

        assert!(backend.check(&who(Some("carol"))).await.unwrap());
        assert!(!backend.check(&who(Some("alice"))).await.unwrap());
    }

    #[tokio::test]
    async fn settled_file_is_served_from_cache() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "alice\n").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        let handle = std::fs::OpenOptions::new().write(true).open(file.path()).unwrap();
        handle.set_modified(old).unwrap();
        let source = AllowlistSource::file(file.path());

        let first = source.current().await.unwrap();
        let second = source.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // a real edit moves the stamp and is picked up
        std::fs::write(file.path(), "alice\nbob\n").unwrap();
        let third = source.current().await.unwrap();
        assert!(third.contains("bob"));
    }

    #[tokio::test]
    async fn vanished_file_is_unavailable_not_denied() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StaticListBackend::new(AllowlistSource::file(dir.path().join("gone.txt")));
        let err = backend.check(&who(Some("alice"))).await.unwrap_err();
        assert!(matches!(err, AccessError::BackendUnavailable(_)));
    }

    #[test]
    fn config_prefers_file_over_inline() {
        let cfg = StaticListConfig {
            users: Some("alice".into()),
            file: Some("/srv/allow.txt".into()),
        };
        assert!(AllowlistSource::from_config(&cfg).unwrap().is_file());

        let inline = StaticListConfig {
            users: Some("alice".into()),
            file: None,
        };
        assert!(!AllowlistSource::from_config(&inline).unwrap().is_file());
    }
}
