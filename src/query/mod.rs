//! Candidate query executor.
//!
//! Runs the rendered query page by page and yields records as a lazy stream.
//! Every call to `CandidateQuery::stream` starts again from offset 0. Search
//! failures that look transient are retried with exponential backoff; deletes
//! are never retried here.

mod spec;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::{debug, warn};

use crate::age::{AgeCutoff, AgeSpan};
use crate::artifact::ArtifactRecord;
use crate::error::{Result, SweepError};
use crate::repository::{ArtifactRepository, SearchPage};

pub use spec::{QuerySpec, page_window, with_page};

/// Bounded exponential backoff for search requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// A rendered query bound to a repository
pub struct CandidateQuery {
    repository: Arc<dyn ArtifactRepository>,
    aql: String,
    page_size: usize,
    retry: RetryPolicy,
}

impl CandidateQuery {
    /// Render `spec` for this run.
    ///
    /// Fails if the query spec can't be rendered or `page_size` is zero.
    pub fn new(
        repository: Arc<dyn ArtifactRepository>,
        spec: &QuerySpec,
        age: &AgeSpan,
        cutoff: &AgeCutoff,
        page_size: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(SweepError::InvalidConfiguration(
                "page size must be at least 1".to_string(),
            ));
        }
        if retry.max_attempts == 0 {
            return Err(SweepError::InvalidConfiguration(
                "query retry attempts must be at least 1".to_string(),
            ));
        }

        let aql = spec.render(age, cutoff)?;
        debug!("Rendered query from {}: {}", spec.source_name(), aql);

        Ok(Self {
            repository,
            aql,
            page_size,
            retry,
        })
    }

    pub fn aql(&self) -> &str {
        &self.aql
    }

    /// Fetch one page starting at `offset`, retrying transient failures
    pub async fn fetch_page(&self, offset: usize) -> Result<SearchPage> {
        let aql = with_page(&self.aql, offset, self.page_size);
        let mut attempt = 1;

        loop {
            match self.repository.search(&aql).await {
                Ok(page) => {
                    debug!(
                        "Fetched {} candidates from {} rows at offset {}",
                        page.records.len(),
                        page.rows,
                        offset
                    );
                    if page.dropped() > 0 {
                        warn!("{} unusable row(s) skipped at offset {}", page.dropped(), offset);
                    }
                    return Ok(page);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Search at offset {} failed (attempt {}/{}): {}; retrying in {:?}",
                        offset, attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(SweepError::QueryExecution {
                        context: format!(
                            "POST {} offset={} limit={}",
                            self.repository.endpoint(),
                            offset,
                            self.page_size
                        ),
                        message: format!("{} (after {} attempt(s))", e, attempt),
                    });
                }
            }
        }
    }

    /// Lazily page through all candidates.
    ///
    /// A page with fewer rows than `page_size` ends the stream. Rows that
    /// didn't decode still count toward the page and the next offset.
    pub fn stream(&self) -> BoxStream<'_, Result<ArtifactRecord>> {
        let pages = stream::try_unfold(Some(0usize), move |next_offset| async move {
            let Some(offset) = next_offset else {
                return Ok::<_, SweepError>(None);
            };

            let page = self.fetch_page(offset).await?;
            if page.rows == 0 {
                return Ok(None);
            }

            let next = if page.rows < self.page_size {
                None
            } else {
                Some(offset + page.rows)
            };
            Ok(Some((page.records, next)))
        });

        pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}
