//! Run summary aggregation and rendering.
//!
//! Counting is commutative, so the summary doesn't depend on the order in
//! which workers finished.

use std::fmt::Write as _;
use std::time::Duration;

use colored::Colorize;
use serde::{Serialize, Serializer};

use crate::dispatch::{DeletionOutcome, ItemOutcome};
use crate::select::SelectionTally;

/// Counts per outcome kind plus elapsed time. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    /// A shutdown signal cut the run short
    pub interrupted: bool,
    pub scanned: usize,
    pub too_recent: usize,
    pub excluded: usize,
    pub selected: usize,
    pub deleted: usize,
    pub simulated: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Aggregate dispatcher outcomes. Never fails; no outcomes means all zeros.
pub fn summarize<'a, I>(outcomes: I) -> RunSummary
where
    I: IntoIterator<Item = &'a DeletionOutcome>,
{
    outcomes.into_iter().fold(RunSummary::default(), |mut summary, outcome| {
        match outcome {
            DeletionOutcome::Deleted => summary.deleted += 1,
            DeletionOutcome::SimulatedDeleted => summary.simulated += 1,
            DeletionOutcome::Skipped(_) => summary.skipped += 1,
            DeletionOutcome::Failed(_) => summary.failed += 1,
        }
        summary
    })
}

/// Convenience over `summarize` for path-tagged outcomes
pub fn summarize_items(outcomes: &[ItemOutcome]) -> RunSummary {
    summarize(outcomes.iter().map(|o| &o.outcome))
}

/// Output format for the rendered summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

impl RunSummary {
    /// Fold in what the selection filter saw
    pub fn with_selection(mut self, tally: SelectionTally) -> Self {
        self.scanned = tally.scanned;
        self.too_recent = tally.too_recent;
        self.excluded = tally.excluded;
        self.selected = tally.selected;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_interrupted(mut self, interrupted: bool) -> Self {
        self.interrupted = interrupted;
        self
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Process exit status: non-zero iff any item failed
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() { 1 } else { 0 }
    }

    /// Plain-text block for the operator
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let title = if self.dry_run { "Sweep summary (dry run)" } else { "Sweep summary" };

        let _ = writeln!(out, "{}", title.bold());
        if self.interrupted {
            let _ = writeln!(out, "  {}", "interrupted before completion".yellow());
        }
        let _ = writeln!(out, "  scanned:    {}", self.scanned);
        let _ = writeln!(out, "  too recent: {}", self.too_recent);
        let _ = writeln!(out, "  excluded:   {}", self.excluded);
        let _ = writeln!(out, "  selected:   {}", self.selected);
        if self.dry_run {
            let _ = writeln!(out, "  simulated:  {}", self.simulated.to_string().cyan());
        } else {
            let _ = writeln!(out, "  deleted:    {}", self.deleted.to_string().green());
        }
        let _ = writeln!(out, "  skipped:    {}", self.skipped.to_string().yellow());

        let failed = if self.has_failures() {
            self.failed.to_string().red().bold()
        } else {
            self.failed.to_string().normal()
        };
        let _ = writeln!(out, "  failed:     {}", failed);
        let _ = write!(out, "  elapsed:    {:.2}s", self.elapsed.as_secs_f64());

        out
    }

    pub fn render(&self, format: SummaryFormat) -> String {
        match format {
            SummaryFormat::Text => self.render_text(),
            SummaryFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e)),
        }
    }
}
