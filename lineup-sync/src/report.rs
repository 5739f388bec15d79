//! Per-record, per-group and per-run results.
//!
//! Counting convention: `created` is the success bucket for new entities;
//! an existing entity that needed changes is counted under `updated`, one that
//! already matched under `unchanged`. None of those count as failures.

use serde::{Serialize, Serializer};

use crate::engine::RecordOutcome;

/// Exit code of a run stopped before every record was processed.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Outcome counts for a group or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.total += 1;
        match outcome {
            RecordOutcome::Created { .. } => self.created += 1,
            RecordOutcome::Updated { .. } => self.updated += 1,
            RecordOutcome::Unchanged { .. } => self.unchanged += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &SyncSummary) {
        self.total += other.total;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// One record and what happened to it.
#[derive(Debug, Clone)]
pub struct RecordReport {
    pub display_name: String,
    pub external_id: String,
    pub outcome: RecordOutcome,
}

#[derive(Serialize)]
struct RecordJson<'a> {
    display_name: &'a str,
    external_id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for RecordReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (error_kind, error) = match &self.outcome {
            RecordOutcome::Failed(e) => (Some(e.kind()), Some(e.to_string())),
            _ => (None, None),
        };
        RecordJson {
            display_name: &self.display_name,
            external_id: &self.external_id,
            status: self.outcome.label(),
            entity: self.outcome.entity().map(|id| id.0.as_str()),
            error_kind,
            error,
        }
        .serialize(serializer)
    }
}

/// Results of one `(category, group)`.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub category: String,
    pub group: String,
    pub summary: SyncSummary,
    pub records: Vec<RecordReport>,
}

impl GroupReport {
    pub fn new(category: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            group: group.into(),
            summary: SyncSummary::default(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: RecordReport) {
        self.summary.record(&record.outcome);
        self.records.push(record);
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.category, self.group)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordReport> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }
}

/// Results of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub groups: Vec<GroupReport>,
    pub total: SyncSummary,
    /// The run was stopped between records before the catalog was exhausted.
    pub interrupted: bool,
}

impl RunReport {
    pub fn push(&mut self, group: GroupReport) {
        self.total.merge(&group.summary);
        self.groups.push(group);
    }

    /// True when no record failed; skipped records do not count against it.
    pub fn is_success(&self) -> bool {
        self.total.is_success()
    }

    /// Process exit code: 0 when every record succeeded or was skipped, 1
    /// when any record failed, [`EXIT_INTERRUPTED`] when the run stopped
    /// early with no failures.
    pub fn exit_code(&self) -> i32 {
        if !self.is_success() {
            1
        } else if self.interrupted {
            EXIT_INTERRUPTED
        } else {
            0
        }
    }
}
