//! In-memory repository fixture
//!
//! Holds a fixed list of artifacts, answers paged AQL queries by honouring
//! the trailing `.offset(n).limit(m)` window, and records every call so tests
//! can assert on remote traffic.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::artifact::ArtifactRecord;
use crate::query::page_window;
use crate::repository::{ArtifactRepository, RepositoryError, SearchPage};

/// Repository backed by a `Vec`, for tests and offline runs
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<ArtifactRecord>>,
    delete_failures: HashMap<String, u16>,
    externally_deleted: HashSet<String>,
    unreadable: HashSet<String>,
    delete_delay: Option<Duration>,
    search_delay: Option<Duration>,
    failing_searches: AtomicUsize,
    search_failure_status: u16,
    search_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryRepository {
    pub fn new(records: Vec<ArtifactRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            search_failure_status: 503,
            ..Default::default()
        }
    }

    /// Make deletes of `path` fail with the given HTTP status
    pub fn with_delete_failure(mut self, path: impl Into<String>, status: u16) -> Self {
        self.delete_failures.insert(path.into(), status);
        self
    }

    /// Simulate `path` having been removed by someone else after the query ran
    pub fn with_externally_deleted(mut self, path: impl Into<String>) -> Self {
        self.externally_deleted.insert(path.into());
        self
    }

    /// Return `path` as a row that fails to decode: it counts toward the
    /// page's rows but never becomes a record
    pub fn with_unreadable(mut self, path: impl Into<String>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    /// Sleep this long inside every delete call
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Sleep this long inside every search call
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    /// Fail the next `count` searches with `status`
    pub fn with_failing_searches(mut self, count: usize, status: u16) -> Self {
        self.failing_searches = AtomicUsize::new(count);
        self.search_failure_status = status;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Every AQL string received, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Paths successfully deleted, in completion order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn lock_error() -> RepositoryError {
        RepositoryError::InvalidResponse("in-memory repository lock poisoned".to_string())
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryRepository {
    async fn search(&self, aql: &str) -> Result<SearchPage, RepositoryError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().map_err(|_| Self::lock_error())?.push(aql.to_string());

        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }

        let remaining_failures = self.failing_searches.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.failing_searches.store(remaining_failures - 1, Ordering::SeqCst);
            return Err(RepositoryError::Api {
                status: self.search_failure_status,
                message: "simulated search failure".to_string(),
            });
        }

        let records = self.records.lock().map_err(|_| Self::lock_error())?;
        let (offset, limit) = page_window(aql).unwrap_or((0, records.len()));

        let window: Vec<&ArtifactRecord> = records.iter().skip(offset).take(limit).collect();

        Ok(SearchPage {
            rows: window.len(),
            records: window
                .into_iter()
                .filter(|r| !self.unreadable.contains(&r.path))
                .cloned()
                .collect(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), RepositoryError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = self.delete_failures.get(path) {
            return Err(RepositoryError::Api {
                status: *status,
                message: format!("simulated delete failure for {}", path),
            });
        }

        if self.externally_deleted.contains(path) {
            return Err(RepositoryError::NotFound(path.to_string()));
        }

        let mut records = self.records.lock().map_err(|_| Self::lock_error())?;
        let Some(index) = records.iter().position(|r| r.path == path) else {
            return Err(RepositoryError::NotFound(path.to_string()));
        };
        records.remove(index);
        drop(records);

        self.deleted.lock().map_err(|_| Self::lock_error())?.push(path.to_string());
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "memory://"
    }
}
