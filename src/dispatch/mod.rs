//! Deletion dispatcher - bounded worker pool over a shared work queue.
//!
//! Each worker claims one record at a time from the queue, runs the delete
//! (or logs a simulated one in dry-run mode) and records an outcome. The
//! queue lock is only held while claiming, never across a network call.
//!
//! A shutdown signal stops further claims; a delete already in flight is
//! allowed to finish. Records left unclaimed are reported as cancelled.

mod outcome;

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::artifact::ArtifactRecord;
use crate::error::{Result, SweepError};
use crate::repository::ArtifactRepository;

pub use outcome::{DeletionOutcome, ItemOutcome, SKIP_ALREADY_ABSENT, SKIP_CANCELLED};

/// Worker count used when neither config nor CLI sets one
pub const DEFAULT_WORKERS: usize = 4;

/// Shared, order-agnostic source of records to delete
#[derive(Debug, Default)]
struct WorkQueue {
    items: Mutex<VecDeque<ArtifactRecord>>,
}

impl WorkQueue {
    fn new(records: Vec<ArtifactRecord>) -> Self {
        Self {
            items: Mutex::new(records.into()),
        }
    }

    /// Take the next record; the lock is released before this returns
    fn claim(&self) -> Option<ArtifactRecord> {
        self.items.lock().ok()?.pop_front()
    }

    fn drain(&self) -> Vec<ArtifactRecord> {
        self.items
            .lock()
            .map(|mut items| items.drain(..).collect())
            .unwrap_or_default()
    }
}

/// Runs deletions across a fixed number of workers
pub struct Dispatcher {
    repository: Arc<dyn ArtifactRepository>,
    worker_count: usize,
    dry_run: bool,
    shutdown_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Create a dispatcher. `worker_count` must be at least 1.
    pub fn new(
        repository: Arc<dyn ArtifactRepository>,
        worker_count: usize,
        dry_run: bool,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(SweepError::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }

        // Never signalled unless replaced via with_shutdown
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            repository,
            worker_count,
            dry_run,
            shutdown_rx,
        })
    }

    /// Stop claiming new records once `shutdown_rx` flips to true
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = shutdown_rx;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Process every selected record. Always returns one outcome per input record.
    pub async fn run(&self, selected: Vec<ArtifactRecord>) -> Vec<ItemOutcome> {
        let total = selected.len();
        let queue = Arc::new(WorkQueue::new(selected));
        let workers = self.worker_count.min(total.max(1));

        info!(
            "Executing {} deletions using {} worker(s){}",
            total,
            workers,
            if self.dry_run { " (dry run)" } else { "" }
        );

        let joins: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let repository = Arc::clone(&self.repository);
                let shutdown_rx = self.shutdown_rx.clone();
                let dry_run = self.dry_run;

                tokio::spawn(async move {
                    worker_loop(worker_id, queue, repository, shutdown_rx, dry_run).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        for (worker_id, join) in joins.into_iter().enumerate() {
            match join.await {
                Ok(worker_outcomes) => outcomes.extend(worker_outcomes),
                // Items are executed under catch_unwind, so this means the loop itself died
                Err(e) => error!("[worker-{}] terminated abnormally: {}", worker_id, e),
            }
        }

        let unclaimed = queue.drain();
        if !unclaimed.is_empty() {
            warn!("Run stopped with {} record(s) not dispatched", unclaimed.len());
            outcomes.extend(
                unclaimed
                    .into_iter()
                    .map(|record| ItemOutcome::new(record.path, DeletionOutcome::cancelled())),
            );
        }

        outcomes
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    repository: Arc<dyn ArtifactRepository>,
    shutdown_rx: watch::Receiver<bool>,
    dry_run: bool,
) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::new();

    loop {
        // Cancellation is only honoured between items
        if *shutdown_rx.borrow() {
            debug!("[worker-{}] shutdown requested, no further claims", worker_id);
            break;
        }

        let Some(record) = queue.claim() else {
            break;
        };

        let outcome = AssertUnwindSafe(execute(repository.as_ref(), &record, dry_run))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("[ERROR] Delete panicked: {}", record.path);
                DeletionOutcome::Failed("delete task panicked".to_string())
            });

        outcomes.push(ItemOutcome::new(record.path, outcome));
    }

    debug!("[worker-{}] finished after {} item(s)", worker_id, outcomes.len());
    outcomes
}

/// Terminal action for one record
async fn execute(
    repository: &dyn ArtifactRepository,
    record: &ArtifactRecord,
    dry_run: bool,
) -> DeletionOutcome {
    if dry_run {
        info!("[DRYRUN-COMPLETE] {}", record.path);
        return DeletionOutcome::SimulatedDeleted;
    }

    match repository.delete(&record.path).await {
        Ok(()) => {
            info!("[DELETED] {}", record.path);
            DeletionOutcome::Deleted
        }
        Err(e) if e.is_not_found() => {
            info!("[ABSENT] {} was already deleted", record.path);
            DeletionOutcome::already_absent()
        }
        Err(e) => {
            error!("[ERROR] Delete failed: {} - {}", record.path, e);
            DeletionOutcome::Failed(e.to_string())
        }
    }
}
