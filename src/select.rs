//! Selection filter: age + exclusion.
//!
//! The query's own server-side filter is only a hint. Every candidate is
//! re-checked here against the locally computed cutoff, and this check is
//! what decides deletion.

use futures::stream::{Stream, TryStreamExt};
use log::{debug, info};

use crate::age::AgeCutoff;
use crate::artifact::ArtifactRecord;
use crate::exclusion::ExclusionRuleSet;

/// Why a candidate was or wasn't forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Selected,
    TooRecent,
    Excluded,
}

/// Classify one candidate. Age is checked before exclusions.
pub fn classify(record: &ArtifactRecord, cutoff: &AgeCutoff, rules: &ExclusionRuleSet) -> Verdict {
    if !cutoff.admits(record.created_at) {
        Verdict::TooRecent
    } else if rules.is_excluded(record) {
        Verdict::Excluded
    } else {
        Verdict::Selected
    }
}

/// Keep records old enough and not excluded, preserving input order
pub fn select<'a, I>(
    candidates: I,
    cutoff: &'a AgeCutoff,
    rules: &'a ExclusionRuleSet,
) -> impl Iterator<Item = ArtifactRecord> + 'a
where
    I: IntoIterator<Item = ArtifactRecord>,
    I::IntoIter: 'a,
{
    candidates
        .into_iter()
        .filter(move |record| classify(record, cutoff, rules) == Verdict::Selected)
}

/// Counts of what the filter saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionTally {
    pub scanned: usize,
    pub too_recent: usize,
    pub excluded: usize,
    pub selected: usize,
}

impl SelectionTally {
    fn record(&mut self, verdict: Verdict) {
        self.scanned += 1;
        match verdict {
            Verdict::Selected => self.selected += 1,
            Verdict::TooRecent => self.too_recent += 1,
            Verdict::Excluded => self.excluded += 1,
        }
    }
}

/// Drain a candidate stream through the filter, collecting the deletion set.
///
/// `dry_run` only changes the log tag on queued records.
pub async fn select_stream<S, E>(
    candidates: S,
    cutoff: &AgeCutoff,
    rules: &ExclusionRuleSet,
    dry_run: bool,
) -> Result<(Vec<ArtifactRecord>, SelectionTally), E>
where
    S: Stream<Item = Result<ArtifactRecord, E>>,
{
    let label = if dry_run { "[DRYRUN]" } else { "[DELETE]" };

    let initial = (Vec::new(), SelectionTally::default());
    candidates
        .try_fold(initial, move |(mut selected, mut tally), record| async move {
            let verdict = classify(&record, cutoff, rules);
            tally.record(verdict);

            match verdict {
                Verdict::Selected => {
                    debug!("{} queued {}", label, record.path);
                    selected.push(record);
                }
                Verdict::Excluded => info!("[SKIP] Excluded by pattern: {}", record.path),
                Verdict::TooRecent => {
                    debug!("[SKIP] Newer than cutoff: {} ({})", record.path, record.created_at)
                }
            }

            Ok((selected, tally))
        })
        .await
}
