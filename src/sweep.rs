//! End-to-end sweep: parse, load, query, select, dispatch, summarize.
//!
//! Every input is validated before the first remote call, so a malformed
//! age, exclusion file, query spec or worker count aborts the run without
//! touching the repository. The deletion set is fully collected before
//! dispatch starts; deleting while still paging would shift the offsets of
//! later pages.
//!
//! A shutdown signal received while paging stops the query at once. The
//! partial selection is then handed to the dispatcher, which reports every
//! record as cancelled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{info, warn};
use tokio::sync::watch;

use crate::age;
use crate::dispatch::{DEFAULT_WORKERS, Dispatcher, ItemOutcome};
use crate::error::Result;
use crate::exclusion::ExclusionRuleSet;
use crate::query::{CandidateQuery, QuerySpec, RetryPolicy};
use crate::report::{RunSummary, summarize_items};
use crate::repository::ArtifactRepository;
use crate::select::select_stream;

/// Default number of candidates requested per query page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Everything a run needs besides the repository itself
#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub age_expression: String,
    pub exclusions_file: PathBuf,
    pub query_spec_file: PathBuf,
    pub dry_run: bool,
    pub workers: usize,
    pub page_size: usize,
    pub retry: RetryPolicy,
}

impl SweepRequest {
    pub fn new(
        age_expression: impl Into<String>,
        exclusions_file: impl Into<PathBuf>,
        query_spec_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            age_expression: age_expression.into(),
            exclusions_file: exclusions_file.into(),
            query_spec_file: query_spec_file.into(),
            dry_run: false,
            workers: DEFAULT_WORKERS,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of a completed dispatch phase
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub summary: RunSummary,
    pub outcomes: Vec<ItemOutcome>,
}

/// Drives one run against a repository
pub struct Sweeper {
    repository: Arc<dyn ArtifactRepository>,
    shutdown_rx: Option<watch::Receiver<bool>>,
}

impl Sweeper {
    pub fn new(repository: Arc<dyn ArtifactRepository>) -> Self {
        Self {
            repository,
            shutdown_rx: None,
        }
    }

    /// Stop paging and dispatching once `shutdown_rx` flips to true
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves when shutdown is signalled. Pends forever without a channel
    /// or once the sender is gone.
    fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let shutdown_rx = self.shutdown_rx.clone();
        async move {
            if let Some(mut rx) = shutdown_rx {
                let signalled = rx.wait_for(|stop| *stop).await.is_ok();
                if signalled {
                    return;
                }
            }
            std::future::pending::<()>().await
        }
    }

    /// Run with the current time as run start
    pub async fn run(&self, request: &SweepRequest) -> Result<SweepReport> {
        self.run_at(request, Utc::now()).await
    }

    /// Run with an explicit run start, which fixes the cutoff
    pub async fn run_at(
        &self,
        request: &SweepRequest,
        run_start: DateTime<Utc>,
    ) -> Result<SweepReport> {
        let started = Instant::now();

        let span = age::parse(&request.age_expression)?;
        let cutoff = span.cutoff_from(run_start)?;
        let rules = ExclusionRuleSet::load(&request.exclusions_file)?;
        let spec = QuerySpec::load(&request.query_spec_file)?;

        let mut dispatcher =
            Dispatcher::new(Arc::clone(&self.repository), request.workers, request.dry_run)?;
        if let Some(rx) = &self.shutdown_rx {
            dispatcher = dispatcher.with_shutdown(rx.clone());
        }

        let query = CandidateQuery::new(
            Arc::clone(&self.repository),
            &spec,
            &span,
            &cutoff,
            request.page_size,
            request.retry.clone(),
        )?;

        info!(
            "Searching {} for artifacts created on or before {} ({}) using {}",
            self.repository.endpoint(),
            cutoff.instant().to_rfc3339(),
            span,
            spec.source_name()
        );

        let candidates = query.stream().take_until(self.shutdown_signal());
        let (selected, tally) = select_stream(candidates, &cutoff, &rules, request.dry_run).await?;

        let interrupted = self.shutdown_requested();
        if interrupted {
            warn!(
                "Shutdown requested; query stopped after {} candidate(s), {} left undeleted",
                tally.scanned, tally.selected
            );
        }

        if tally.scanned == 0 {
            info!("No matching artifacts found.");
        } else {
            info!(
                "{} artifact(s) found: {} too recent, {} excluded, {} selected",
                tally.scanned, tally.too_recent, tally.excluded, tally.selected
            );
        }

        let outcomes = dispatcher.run(selected).await;

        let summary = summarize_items(&outcomes)
            .with_selection(tally)
            .with_dry_run(request.dry_run)
            .with_interrupted(interrupted || self.shutdown_requested())
            .with_elapsed(started.elapsed());

        info!(
            "Run complete: deleted={} simulated={} skipped={} failed={} in {:?}",
            summary.deleted, summary.simulated, summary.skipped, summary.failed, summary.elapsed
        );

        Ok(SweepReport { summary, outcomes })
    }
}
