//! Deletion outcome types.

use serde::Serialize;

/// Skip reason when the repository says the artifact is already gone
pub const SKIP_ALREADY_ABSENT: &str = "already absent";

/// Skip reason for records never claimed because the run was stopped
pub const SKIP_CANCELLED: &str = "cancelled";

/// Result of the terminal action on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// Remote delete succeeded
    Deleted,
    /// Dry run: nothing was sent
    SimulatedDeleted,
    /// Not attempted or nothing to do
    Skipped(String),
    /// Remote delete failed; other records are unaffected
    Failed(String),
}

impl DeletionOutcome {
    pub fn already_absent() -> Self {
        DeletionOutcome::Skipped(SKIP_ALREADY_ABSENT.to_string())
    }

    pub fn cancelled() -> Self {
        DeletionOutcome::Skipped(SKIP_CANCELLED.to_string())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DeletionOutcome::Failed(_))
    }
}

/// Outcome paired with the path it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub path: String,
    pub outcome: DeletionOutcome,
}

impl ItemOutcome {
    pub fn new(path: impl Into<String>, outcome: DeletionOutcome) -> Self {
        Self {
            path: path.into(),
            outcome,
        }
    }
}
