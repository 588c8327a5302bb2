//! Structured outcomes and the end-of-run summary.
//!
//! Every roster record resolves to exactly one [`RecordOutcome`]; the run
//! aggregates them into a [`RunSummary`].  Keeping outcomes as values
//! (instead of log lines inside the decision logic) is what makes the
//! run's guarantees checkable in tests.

use serde::Serialize;
use std::collections::BTreeMap;

/// Why a roster record was skipped without touching the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Unit code missing from the reference map.
    UnresolvedUnit,
    /// Class code too short or with an unknown prefix.
    UnresolvedClassCode,
    /// No coordination for the (unit, stage) pair.
    UnresolvedCoordination,
    /// Withdrawn student with no remote record: nothing to deactivate.
    AlreadyAbsentInactive,
    /// A later roster occurrence of an enrollment id already processed.
    DuplicateRoster,
}

impl SkipReason {
    /// Stable key used in summaries.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnresolvedUnit => "unresolved_unit",
            SkipReason::UnresolvedClassCode => "unresolved_class_code",
            SkipReason::UnresolvedCoordination => "unresolved_coordination",
            SkipReason::AlreadyAbsentInactive => "already_absent_inactive",
            SkipReason::DuplicateRoster => "duplicate_roster",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remote effects applied for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub created: bool,
    pub updated: bool,
    pub activated: bool,
    pub deactivated: bool,
    pub sections_assigned: usize,
    /// The section key had no remote sections: identity is reconciled but
    /// enrollment stays pending.
    pub section_pending: bool,
}

impl Applied {
    /// Whether nothing had to change remotely.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.created
            && !self.updated
            && !self.activated
            && !self.deactivated
            && self.sections_assigned == 0
    }
}

/// The structured result of reconciling one roster record.
#[derive(Debug, Clone, Serialize)]
pub enum RecordOutcome {
    /// The record was processed; `Applied` says what changed.
    Reconciled(Applied),
    /// The record was skipped before any remote call.
    Skipped(SkipReason),
    /// An operation failed after retries; effects already applied stand.
    Failed {
        operation: &'static str,
        error: String,
        applied: Applied,
    },
}

/// Aggregated counts for a whole reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub records_processed: u64,
    pub created: u64,
    pub updated: u64,
    pub activated: u64,
    pub deactivated: u64,
    pub sections_assigned: u64,
    pub section_pending: u64,
    pub unchanged: u64,
    pub skipped: BTreeMap<String, u64>,
    pub failed: BTreeMap<String, u64>,
    /// False when the roster stream broke before its end.
    pub roster_read_complete: bool,
    /// False when a directory listing was interrupted mid-pagination.
    pub snapshot_complete: bool,
}

impl RunSummary {
    /// Fresh summary; completeness flags start optimistic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roster_read_complete: true,
            snapshot_complete: true,
            ..Self::default()
        }
    }

    /// Fold one record's outcome into the totals.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.records_processed += 1;
        match outcome {
            RecordOutcome::Reconciled(applied) => {
                self.absorb(applied);
                if applied.is_noop() && !applied.section_pending {
                    self.unchanged += 1;
                }
            }
            RecordOutcome::Skipped(reason) => {
                *self.skipped.entry(reason.as_str().to_string()).or_default() += 1;
            }
            RecordOutcome::Failed {
                operation, applied, ..
            } => {
                self.absorb(applied);
                *self.failed.entry((*operation).to_string()).or_default() += 1;
            }
        }
    }

    fn absorb(&mut self, applied: &Applied) {
        self.created += u64::from(applied.created);
        self.updated += u64::from(applied.updated);
        self.activated += u64::from(applied.activated);
        self.deactivated += u64::from(applied.deactivated);
        self.sections_assigned += applied.sections_assigned as u64;
        self.section_pending += u64::from(applied.section_pending);
    }

    /// Total remote mutations issued.
    #[must_use]
    pub fn remote_mutations(&self) -> u64 {
        self.created + self.updated + self.activated + self.deactivated + self.sections_assigned
    }

    /// Total records skipped, across all reasons.
    #[must_use]
    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    /// Total records that hit an operation failure.
    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.failed.values().sum()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed {} record(s): {} created, {} updated, {} activated, {} deactivated, \
             {} section assignment(s), {} unchanged, {} skipped, {} failed",
            self.records_processed,
            self.created,
            self.updated,
            self.activated,
            self.deactivated,
            self.sections_assigned,
            self.unchanged,
            self.total_skipped(),
            self.total_failed(),
        )?;
        if !self.roster_read_complete {
            write!(f, " [roster read incomplete]")?;
        }
        if !self.snapshot_complete {
            write!(f, " [directory snapshot incomplete]")?;
        }
        Ok(())
    }
}
