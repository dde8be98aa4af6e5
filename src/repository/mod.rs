//! Remote repository abstraction.
//!
//! This module provides:
//! - `ArtifactRepository` trait: run one AQL page, delete one path
//! - `ArtifactoryClient`: HTTP implementation against the Artifactory REST API
//! - `InMemoryRepository`: fixture used by tests and dry pipelines

pub mod artifactory;
pub mod memory;

use async_trait::async_trait;

use crate::artifact::ArtifactRecord;

pub use artifactory::{ArtifactoryClient, ArtifactoryConfig};
pub use memory::InMemoryRepository;

/// One page of search results.
///
/// `rows` counts every row the server returned, including rows that could
/// not be turned into records. Paging advances by `rows`, not by
/// `records.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub records: Vec<ArtifactRecord>,
    pub rows: usize,
}

impl SearchPage {
    /// A page where every row decoded into a record
    pub fn complete(records: Vec<ArtifactRecord>) -> Self {
        let rows = records.len();
        Self { records, rows }
    }

    /// Rows the server returned that did not become records
    pub fn dropped(&self) -> usize {
        self.rows.saturating_sub(self.records.len())
    }
}

/// Something that can execute a query-language request and delete artifacts.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Run one page of a rendered AQL query
    async fn search(&self, aql: &str) -> Result<SearchPage, RepositoryError>;

    /// Delete the artifact at a repository-relative path
    async fn delete(&self, path: &str) -> Result<(), RepositoryError>;

    /// Human-readable location used in diagnostics
    fn endpoint(&self) -> &str;
}

/// Errors raised at the remote boundary
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Network(_) => true,
            RepositoryError::Api { status, .. } => *status == 429 || *status >= 500,
            RepositoryError::NotFound(_) => false,
            RepositoryError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RepositoryError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => RepositoryError::InvalidResponse(e.to_string()),
            None => RepositoryError::Network(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_is_retryable() {
        assert!(RepositoryError::Network("reset".to_string()).is_retryable());
        assert!(
            RepositoryError::Api {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_retryable()
        );
        assert!(
            RepositoryError::Api {
                status: 429,
                message: "slow down".to_string()
            }
            .is_retryable()
        );
        assert!(
            !RepositoryError::Api {
                status: 401,
                message: "bad token".to_string()
            }
            .is_retryable()
        );
        assert!(!RepositoryError::NotFound("x".to_string()).is_retryable());
        assert!(!RepositoryError::InvalidResponse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_search_page_counts_dropped_rows() {
        let page = SearchPage {
            records: vec![],
            rows: 3,
        };
        assert_eq!(page.dropped(), 3);
        assert_eq!(SearchPage::complete(vec![]).rows, 0);
    }

    #[test]
    fn test_not_found_classification() {
        assert!(RepositoryError::NotFound("a/b".to_string()).is_not_found());
        assert!(
            !RepositoryError::Api {
                status: 500,
                message: String::new()
            }
            .is_not_found()
        );
    }
}
