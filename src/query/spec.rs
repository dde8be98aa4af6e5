//! Query spec loading and AQL rendering.
//!
//! A query spec is either raw AQL (`items.find(...)`) or a JFrog file spec
//! (`{"files":[{"aql":{"items.find":{...}}}]}`). Both may reference
//! `${timeframe}` (the age expression, e.g. `6mo`) and `${cutoff}` (RFC 3339).

use std::fs;
use std::path::Path;

use chrono::SecondsFormat;
use log::warn;
use serde_json::Value;

use crate::age::{AgeCutoff, AgeSpan};
use crate::error::{Result, SweepError};

const TIMEFRAME_VAR: &str = "${timeframe}";
const CUTOFF_VAR: &str = "${cutoff}";

/// Fields every page must return for records to be built
const INCLUDE_CLAUSE: &str = r#".include("repo","path","name","created","size")"#;

/// Stable ordering so offset paging neither skips nor repeats rows
const SORT_CLAUSE: &str = r#".sort({"$asc":["repo","path","name"]})"#;

/// Externally authored query, opaque apart from variable substitution
#[derive(Debug, Clone)]
pub struct QuerySpec {
    source_name: String,
    template: String,
}

impl QuerySpec {
    pub fn from_text(source_name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            template: template.into(),
        }
    }

    /// Read a query spec file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let template = fs::read_to_string(path).map_err(|e| {
            let reason = format!("cannot read query spec {}: {}", path.display(), e);
            SweepError::InvalidConfiguration(reason)
        })?;
        Ok(Self::from_text(path.display().to_string(), template))
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Render to a single AQL statement without a paging window
    pub fn render(&self, age: &AgeSpan, cutoff: &AgeCutoff) -> Result<String> {
        let substituted = self
            .template
            .replace(TIMEFRAME_VAR, &age.to_string())
            .replace(CUTOFF_VAR, &cutoff.instant().to_rfc3339_opts(SecondsFormat::Millis, true));

        let trimmed = substituted.trim();
        let mut aql = if trimmed.starts_with('{') {
            self.render_file_spec(trimmed)?
        } else {
            trimmed.to_string()
        };

        if aql.is_empty() {
            return Err(self.invalid("query is empty"));
        }
        if aql.contains(".offset(") || aql.contains(".limit(") {
            return Err(self.invalid(
                "query must not set .offset() or .limit(); paging is applied per request",
            ));
        }

        // AQL clause order is find, include, sort, then the paging window
        if !aql.contains(".include(") {
            match aql.find(".sort(") {
                Some(at) => aql.insert_str(at, INCLUDE_CLAUSE),
                None => aql.push_str(INCLUDE_CLAUSE),
            }
        }
        if !aql.contains(".sort(") {
            aql.push_str(SORT_CLAUSE);
        }

        Ok(aql)
    }

    fn render_file_spec(&self, json: &str) -> Result<String> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| self.invalid(format!("not valid JSON: {}", e)))?;

        let files = doc["files"]
            .as_array()
            .ok_or_else(|| self.invalid("file spec has no \"files\" array"))?;
        if files.len() > 1 {
            warn!(
                "Query spec {} has {} file entries; only the first is used",
                self.source_name,
                files.len()
            );
        }

        let criteria = files
            .first()
            .and_then(|f| f["aql"].get("items.find"))
            .ok_or_else(|| self.invalid("first file entry has no aql.items.find"))?;

        Ok(format!("items.find({})", criteria))
    }

    fn invalid(&self, reason: impl std::fmt::Display) -> SweepError {
        SweepError::InvalidConfiguration(format!("query spec {}: {}", self.source_name, reason))
    }
}

/// Append a paging window to a rendered query
pub fn with_page(aql: &str, offset: usize, limit: usize) -> String {
    format!("{}.offset({}).limit({})", aql, offset, limit)
}

/// Recover `(offset, limit)` from a query produced by `with_page`
pub fn page_window(aql: &str) -> Option<(usize, usize)> {
    fn arg(aql: &str, call: &str) -> Option<usize> {
        let start = aql.rfind(call)? + call.len();
        let end = start + aql[start..].find(')')?;
        aql[start..end].trim().parse().ok()
    }

    Some((arg(aql, ".offset(")?, arg(aql, ".limit(")?))
}
