//! Resource manifest: permalink → access requirement, written at publish time.
//!
//! The site build emits a JSON object such as
//! `{ "/notes/garden-log/": "private", "/": "public", "/drafts/x/": null }`.
//! Paths missing from the manifest resolve to `none`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AccessError, Result};
use crate::types::AccessRequirement;

#[derive(Debug, Clone, Default)]
pub struct ResourceManifest {
    entries: HashMap<String, AccessRequirement>,
}

impl ResourceManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, Option<String>> = serde_json::from_str(raw)?;
        let entries = parsed
            .into_iter()
            .map(|(path, access)| {
                (
                    normalize_resource_path(&path),
                    AccessRequirement::from_front_matter(access.as_deref()),
                )
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AccessError::Config(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn requirement_for(&self, resource: &str) -> AccessRequirement {
        self.entries
            .get(&normalize_resource_path(resource))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical `/segment/segment/` form; the bare root stays `/`.
pub fn normalize_resource_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
