//! Sweep pipeline integration tests
//!
//! Drives full runs against the in-memory repository: dry run, partial
//! failure, idempotent delete and parallel dispatch.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use artsweep::artifact::ArtifactRecord;
use artsweep::dispatch::{DeletionOutcome, SKIP_ALREADY_ABSENT};
use artsweep::error::Result;
use artsweep::repository::InMemoryRepository;
use artsweep::{SweepRequest, Sweeper};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tempfile::TempDir;

fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    run_start() - ChronoDuration::days(days)
}

/// Writes the exclusion document and query spec a run reads from disk
fn write_inputs(dir: &TempDir, patterns: &[&str]) -> Result<SweepRequest> {
    let exclusions = dir.path().join("exclusions.json");
    let query = dir.path().join("aql-filespec.json");

    fs::write(&exclusions, serde_json::json!({ "patterns": patterns }).to_string())?;
    fs::write(
        &query,
        concat!(
            r#"{"files":[{"aql":{"items.find":"#,
            r#"{"repo":{"$match":"*"},"created":{"$before":"${timeframe}"}}}}]}"#
        ),
    )?;

    Ok(SweepRequest::new("90d", exclusions, query))
}

/// Integration test: one excluded, one too recent, one eligible; dry run touches nothing
#[tokio::test]
async fn test_dry_run_selects_one_and_makes_no_remote_deletes() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &["docker-prod/**"])?.with_dry_run(true);

    let repo = Arc::new(InMemoryRepository::new(vec![
        ArtifactRecord::new("docker-prod/app/1.0/manifest.json", days_ago(200)),
        ArtifactRecord::new("libs-snapshot/app/2.0/app-2.0.jar", days_ago(10)),
        ArtifactRecord::new("libs-release/app/1.0/app-1.0.jar", days_ago(200)).with_size(1024),
    ]));

    let report = Sweeper::new(repo.clone()).run_at(&request, run_start()).await?;

    assert_eq!(report.summary.scanned, 3);
    assert_eq!(report.summary.excluded, 1);
    assert_eq!(report.summary.too_recent, 1);
    assert_eq!(report.summary.selected, 1);
    assert_eq!(report.summary.simulated, 1);
    assert_eq!(report.summary.deleted, 0);
    assert!(report.summary.dry_run);
    assert_eq!(report.summary.exit_code(), 0);

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].path, "libs-release/app/1.0/app-1.0.jar");
    assert_eq!(report.outcomes[0].outcome, DeletionOutcome::SimulatedDeleted);

    assert_eq!(repo.delete_calls(), 0);
    assert!(repo.search_calls() >= 1);
    Ok(())
}

/// Integration test: the delete of record #2 fails, the rest go through, exit is non-zero
#[tokio::test]
async fn test_partial_failure_is_isolated_and_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &[])?.with_workers(2);

    let records: Vec<_> = (1..=4)
        .map(|i| ArtifactRecord::new(format!("libs-release/app/{}/app.jar", i), days_ago(365)))
        .collect();
    let repo = Arc::new(
        InMemoryRepository::new(records)
            .with_delete_failure("libs-release/app/2/app.jar", 500)
            .with_externally_deleted("libs-release/app/4/app.jar"),
    );

    let report = Sweeper::new(repo.clone()).run_at(&request, run_start()).await?;

    let failed: Vec<_> = report.outcomes.iter().filter(|o| o.outcome.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, "libs-release/app/2/app.jar");

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.deleted + report.summary.skipped, 3);
    assert!(report.summary.has_failures());
    assert_eq!(report.summary.exit_code(), 1);
    assert_eq!(repo.delete_calls(), 4);
    Ok(())
}

/// Integration test: "not found" from the repository is a skip, not a failure
#[tokio::test]
async fn test_already_absent_is_skipped() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &[])?;

    let repo = Arc::new(
        InMemoryRepository::new(vec![ArtifactRecord::new("generic/old.tar.gz", days_ago(120))])
            .with_externally_deleted("generic/old.tar.gz"),
    );

    let report = Sweeper::new(repo).run_at(&request, run_start()).await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        report.outcomes[0].outcome,
        DeletionOutcome::Skipped(SKIP_ALREADY_ABSENT.to_string())
    );
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.exit_code(), 0);
    Ok(())
}

/// Integration test: a second run over the same repository finds nothing left to delete
#[tokio::test]
async fn test_rerun_after_real_run_is_a_no_op() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &[])?;

    let repo = Arc::new(InMemoryRepository::new(vec![
        ArtifactRecord::new("libs-release/a.jar", days_ago(100)),
        ArtifactRecord::new("libs-release/b.jar", days_ago(100)),
    ]));
    let sweeper = Sweeper::new(repo.clone());

    let first = sweeper.run_at(&request, run_start()).await?;
    assert_eq!(first.summary.deleted, 2);

    let second = sweeper.run_at(&request, run_start()).await?;
    assert_eq!(second.summary.scanned, 0);
    assert!(second.outcomes.is_empty());
    assert_eq!(repo.delete_calls(), 2);
    Ok(())
}

/// Integration test: 100 records at a fixed delay across 5 workers finish in ~20 delays
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_dispatch_wall_clock() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &[])?.with_workers(5).with_page_size(30);

    let delay = Duration::from_millis(20);
    let records: Vec<_> = (0..100)
        .map(|i| ArtifactRecord::new(format!("libs-release/bulk/{:03}.jar", i), days_ago(365)))
        .collect();
    let repo = Arc::new(InMemoryRepository::new(records).with_delete_delay(delay));

    let started = Instant::now();
    let report = Sweeper::new(repo.clone()).run_at(&request, run_start()).await?;
    let elapsed = started.elapsed();

    assert_eq!(report.summary.scanned, 100);
    assert_eq!(report.summary.deleted, 100);
    // pages of 30: 30, 30, 30, 10
    assert_eq!(repo.search_calls(), 4);
    assert!(elapsed >= delay * 20, "elapsed {:?}", elapsed);
    assert!(elapsed < delay * 50, "elapsed {:?} suggests serial dispatch", elapsed);
    Ok(())
}

/// Integration test: a row that fails to decode on a full page doesn't end the scan early
#[tokio::test]
async fn test_unreadable_row_does_not_truncate_the_sweep() -> Result<()> {
    let dir = TempDir::new()?;
    let request = write_inputs(&dir, &[])?.with_page_size(3);

    let records: Vec<_> = (1..=5)
        .map(|i| ArtifactRecord::new(format!("r/a/{}.jar", i), days_ago(365)))
        .collect();
    let repo = Arc::new(InMemoryRepository::new(records).with_unreadable("r/a/2.jar"));

    let report = Sweeper::new(repo.clone()).run_at(&request, run_start()).await?;

    assert_eq!(report.summary.scanned, 4);
    assert_eq!(report.summary.deleted, 4);
    assert_eq!(repo.search_calls(), 2);

    let mut deleted = repo.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["r/a/1.jar", "r/a/3.jar", "r/a/4.jar", "r/a/5.jar"]);
    Ok(())
}
