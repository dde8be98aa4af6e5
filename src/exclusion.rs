//! Exclusion patterns that protect artifacts from deletion.
//!
//! Patterns use glob syntax (`*`, `?`, `[...]`, `**`). Matching is always
//! case-sensitive because repository paths are, and `*`/`?` never cross a
//! `/`. Use `**` to match across directories. This is fixed policy and not
//! configurable.

use std::fs;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::artifact::ArtifactRecord;
use crate::error::{Result, SweepError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// On-disk exclusion document: `{"patterns": [...]}`
#[derive(Debug, Default, Deserialize)]
struct ExclusionDocument {
    #[serde(default)]
    patterns: Vec<String>,
    /// Older files use `exclude`; they were written for a matcher where `*`
    /// also matched `/`
    #[serde(default)]
    exclude: Option<Vec<String>>,
}

impl ExclusionDocument {
    fn into_patterns(self, source_name: &str) -> Vec<String> {
        let mut patterns = self.patterns;
        if let Some(legacy) = self.exclude {
            warn!(
                "{} uses the legacy \"exclude\" key; '*' no longer matches across '/'",
                source_name
            );
            for pattern in legacy.iter().filter(|p| p.contains('*') && !p.contains("**")) {
                warn!("Legacy exclusion '{}' now stays within one path segment", pattern);
            }
            patterns.extend(legacy);
        }
        patterns
    }
}

/// Compiled, immutable set of exclusion patterns
#[derive(Debug, Clone, Default)]
pub struct ExclusionRuleSet {
    patterns: Vec<Pattern>,
}

impl ExclusionRuleSet {
    /// Compile a list of glob patterns
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| {
                    let reason = format!("bad pattern '{}': {}", p, e);
                    SweepError::exclusion_load("pattern list", reason)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Parse an exclusion document from a JSON string
    pub fn from_json(source_name: &str, content: &str) -> Result<Self> {
        let doc: ExclusionDocument = serde_json::from_str(content)
            .map_err(|e| SweepError::exclusion_load(source_name, e))?;

        Self::from_patterns(doc.into_patterns(source_name)).map_err(|e| match e {
            SweepError::ExclusionLoad { reason, .. } => {
                SweepError::exclusion_load(source_name, reason)
            }
            other => other,
        })
    }

    /// Load an exclusion document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| SweepError::exclusion_load(&source_name, e))?;

        let rules = Self::from_json(&source_name, &content)?;
        info!("Loaded {} exclusion patterns from {}", rules.len(), source_name);
        Ok(rules)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern matching `path`, if any
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.matches_with(path, MATCH_OPTIONS))
            .map(Pattern::as_str)
    }

    /// True if any pattern matches the record's path
    pub fn is_excluded(&self, record: &ArtifactRecord) -> bool {
        match self.matching_pattern(&record.path) {
            Some(pattern) => {
                debug!("{} matches exclusion pattern {}", record.path, pattern);
                true
            }
            None => false,
        }
    }
}
