//! Artifact records and AQL result decoding.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// An artifact found by the candidate query. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Repository-relative path, `repo/dir/name`. Unique within a run.
    pub path: String,
    /// Creation time reported by the repository
    pub created_at: DateTime<Utc>,
    /// Size in bytes, informational only
    pub size_bytes: Option<u64>,
}

impl ArtifactRecord {
    pub fn new(path: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            created_at,
            size_bytes: None,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

/// One row of an AQL `items.find` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AqlItem {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl AqlItem {
    /// Join `repo`, `path` and `name`; AQL reports files at the repo root with `path == "."`
    fn full_path(&self) -> Option<String> {
        let segments: Vec<&str> = [self.repo.as_deref(), self.path.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        if segments.is_empty() { None } else { Some(segments.join("/")) }
    }

    /// Convert to a record, dropping rows without a path or a parseable timestamp
    pub fn into_record(self) -> Option<ArtifactRecord> {
        let Some(path) = self.full_path() else {
            warn!("Dropping search result without a path: {:?}", self);
            return None;
        };

        let created_at = match self.created.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(ts)) => ts.with_timezone(&Utc),
            Some(Err(e)) => {
                warn!("Dropping {}: unparseable creation time: {}", path, e);
                return None;
            }
            None => {
                warn!("Dropping {}: no creation time in search result", path);
                return None;
            }
        };

        Some(ArtifactRecord {
            path,
            created_at,
            size_bytes: self.size,
        })
    }
}

/// AQL responses wrap rows in `results`; a bare array is accepted too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AqlResponse {
    Wrapped { results: Vec<AqlItem> },
    Bare(Vec<AqlItem>),
}

impl AqlResponse {
    pub fn into_items(self) -> Vec<AqlItem> {
        match self {
            AqlResponse::Wrapped { results } => results,
            AqlResponse::Bare(items) => items,
        }
    }
}
