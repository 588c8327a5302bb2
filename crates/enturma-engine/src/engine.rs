//! Per-record reconciliation and run orchestration.
//!
//! The decision step is pure: given a canonical record, the resolved
//! coordination, and the mirror's view of the student, [`decide`] returns
//! the ordered remote operations needed to converge.  Applying them is
//! the only place that talks to the directory, and every success updates
//! the mirror in place before the next operation, so an aborted run
//! leaves the mirror valid and a repeated run issues nothing.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::mapper;
use crate::reference::{ReferenceMap, Stage};
use crate::report::{Applied, RecordOutcome, RunSummary, SkipReason};
use crate::roster::{RosterRecord, RosterSource};
use crate::sections::SectionProvisioner;
use enturma_db::{BatchPersister, MirrorIndex, MirroredStudent, StudentMirror};
use enturma_directory::types::StudentPayload;
use enturma_directory::{DirectoryClient, DirectoryError, RetryPolicy};
use futures::StreamExt;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of resolving a record against the reference map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub unit_name: String,
    pub stage: Stage,
    pub coordination_id: Uuid,
}

/// Resolve unit, stage, and coordination for a canonical record.
pub fn resolve(record: &RosterRecord, reference: &ReferenceMap) -> Result<Resolution, SkipReason> {
    let unit_name = reference
        .unit_name(&record.unit_code)
        .ok_or(SkipReason::UnresolvedUnit)?
        .to_string();
    let stage =
        Stage::from_class_code(&record.class_code).ok_or(SkipReason::UnresolvedClassCode)?;
    let coordination_id = reference
        .coordination_id(&unit_name, stage)
        .ok_or(SkipReason::UnresolvedCoordination)?;
    Ok(Resolution {
        unit_name,
        stage,
        coordination_id,
    })
}

/// One remote operation the engine may issue for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Deactivate { remote_id: String },
    Activate { remote_id: String },
    Create { name: String, email: String },
    Update { remote_id: String, name: String, email: String },
    AssignSections { section_ids: Vec<String> },
}

/// Ordered operations for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub actions: Vec<Action>,
    /// The section key resolved to nothing: identity is handled but
    /// enrollment stays pending until the section exists.
    pub section_pending: bool,
}

/// What [`decide`] concluded for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Skip(SkipReason),
    Apply(ReconcilePlan),
}

/// Compute the minimal operations that converge the directory to the
/// canonical record.
///
/// `mirrored` is the mirror's entry for the enrollment id, `section_ids`
/// the remote sections under the resolved section key.  Activation is
/// settled first; a student whose desired state is inactive is never
/// created, updated, or enrolled.
#[must_use]
pub fn decide(
    record: &RosterRecord,
    email: &str,
    desired_active: bool,
    mirrored: Option<&MirroredStudent>,
    section_ids: Option<&[String]>,
) -> Plan {
    let mut actions = Vec::new();
    let mut section_pending = false;

    match mirrored {
        None => {
            if !desired_active {
                return Plan::Skip(SkipReason::AlreadyAbsentInactive);
            }
            actions.push(Action::Create {
                name: record.name.clone(),
                email: email.to_string(),
            });
            match section_ids {
                Some(ids) => actions.push(Action::AssignSections {
                    section_ids: ids.to_vec(),
                }),
                None => section_pending = true,
            }
        }
        Some(entry) if !desired_active => {
            if entry.active {
                actions.push(Action::Deactivate {
                    remote_id: entry.remote_id.clone(),
                });
            }
        }
        Some(entry) => {
            if !entry.active {
                actions.push(Action::Activate {
                    remote_id: entry.remote_id.clone(),
                });
            }
            if entry.name != record.name || entry.email.as_deref() != Some(email) {
                actions.push(Action::Update {
                    remote_id: entry.remote_id.clone(),
                    name: record.name.clone(),
                    email: email.to_string(),
                });
            }
            match section_ids {
                Some(ids) => {
                    let missing: Vec<String> = ids
                        .iter()
                        .filter(|id| !entry.class_section_ids.contains(*id))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        actions.push(Action::AssignSections {
                            section_ids: missing,
                        });
                    }
                }
                None => section_pending = true,
            }
        }
    }

    Plan::Apply(ReconcilePlan {
        actions,
        section_pending,
    })
}

/// Drives a full reconciliation run.
pub struct Reconciler {
    client: DirectoryClient,
    pool: PgPool,
    reference: ReferenceMap,
    config: SyncConfig,
    retry: RetryPolicy,
}

impl Reconciler {
    /// Build a reconciler from its collaborators.
    #[must_use]
    pub fn new(
        client: DirectoryClient,
        pool: PgPool,
        reference: ReferenceMap,
        config: SyncConfig,
    ) -> Self {
        let retry = config.retry.policy();
        Self {
            client,
            pool,
            reference,
            config,
            retry,
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// Phases: pull the directory snapshot, persist it into the mirror,
    /// index the mirror, optionally provision missing sections, then
    /// stream the roster and reconcile record by record.  Only rejected
    /// credentials and database loss abort the run; everything else
    /// degrades into the summary.
    pub async fn run(&self) -> SyncResult<RunSummary> {
        let year = self.config.school_year;
        info!(school_year = year, "starting reconciliation run");
        let mut summary = RunSummary::new();

        let outcome = self.client.list_students(year).await;
        let student_snapshot = outcome.items;
        if let Some(e) = outcome.interrupted {
            if e.is_auth() {
                return Err(SyncError::Directory(e));
            }
            warn!(error = %e, fetched = student_snapshot.len(), "student snapshot incomplete");
            summary.snapshot_complete = false;
        }

        let outcome = self.client.list_sections(year).await;
        let section_snapshot = outcome.items;
        if let Some(e) = outcome.interrupted {
            if e.is_auth() {
                return Err(SyncError::Directory(e));
            }
            warn!(error = %e, fetched = section_snapshot.len(), "section snapshot incomplete");
            summary.snapshot_complete = false;
        }

        let persister = BatchPersister::new(self.config.batch.clone());
        let report = persister
            .upsert_students(&self.pool, &mapper::student_rows(&student_snapshot, year))
            .await?;
        info!(
            rows = report.rows_written,
            inactive_skipped = report.rows_skipped,
            failed_chunks = report.chunks_failed,
            "student snapshot persisted"
        );
        let report = persister
            .upsert_sections(&self.pool, &mapper::section_rows(&section_snapshot))
            .await?;
        info!(
            rows = report.rows_written,
            failed_chunks = report.chunks_failed,
            "section snapshot persisted"
        );

        let mut mirror = MirrorIndex::load(&self.pool, year).await?;
        info!(students = mirror.student_count(), "mirror index loaded");

        let roster = RosterSource::new(
            self.pool.clone(),
            &self.config.roster_view,
            self.config.min_class_code,
        );

        if self.config.provision_sections {
            let keys = roster.distinct_section_keys().await?;
            let provisioner = SectionProvisioner::new(
                &self.client,
                &self.retry,
                &self.reference,
                &self.pool,
                year,
            );
            let report = provisioner.provision_missing(&mut mirror, &keys).await?;
            info!(
                created = report.created,
                already_existing = report.already_existing,
                unresolved = report.unresolved,
                failed = report.failed,
                "section provisioning finished"
            );
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut stream = roster.stream();
        while let Some(item) = stream.next().await {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        error = %e,
                        processed = summary.records_processed,
                        "roster stream interrupted; finishing with partial roster"
                    );
                    summary.roster_read_complete = false;
                    break;
                }
            };

            if !seen.insert(record.enrollment_id.clone()) {
                debug!(enrollment_id = %record.enrollment_id, "later roster occurrence skipped");
                summary.record(&RecordOutcome::Skipped(SkipReason::DuplicateRoster));
                continue;
            }

            let outcome = self.reconcile_record(&mut mirror, &record).await?;
            summary.record(&outcome);
        }
        drop(stream);

        info!(%summary, "reconciliation run finished");
        Ok(summary)
    }

    /// Reconcile a single canonical record against the mirror.
    pub async fn reconcile_record(
        &self,
        mirror: &mut MirrorIndex,
        record: &RosterRecord,
    ) -> SyncResult<RecordOutcome> {
        let resolution = match resolve(record, &self.reference) {
            Ok(resolution) => resolution,
            Err(reason) => {
                debug!(
                    enrollment_id = %record.enrollment_id,
                    class_code = %record.class_code,
                    reason = %reason,
                    "record skipped"
                );
                return Ok(RecordOutcome::Skipped(reason));
            }
        };

        let email = self.config.email_for(&record.enrollment_id);
        let desired_active = !self.config.is_withdrawn(record.status_code);
        let section_ids = mirror
            .section_ids(resolution.coordination_id, &record.class_code)
            .map(<[String]>::to_vec);
        let mirrored = mirror.student(&record.enrollment_id).cloned();

        match decide(
            record,
            &email,
            desired_active,
            mirrored.as_ref(),
            section_ids.as_deref(),
        ) {
            Plan::Skip(reason) => Ok(RecordOutcome::Skipped(reason)),
            Plan::Apply(plan) => self.apply(mirror, record, &email, plan).await,
        }
    }

    /// Execute a plan, updating the mirror after each successful
    /// operation.
    async fn apply(
        &self,
        mirror: &mut MirrorIndex,
        record: &RosterRecord,
        email: &str,
        plan: ReconcilePlan,
    ) -> SyncResult<RecordOutcome> {
        let year = self.config.school_year;
        let enrollment = record.enrollment_id.as_str();
        let mut applied = Applied {
            section_pending: plan.section_pending,
            ..Applied::default()
        };
        if plan.section_pending {
            warn!(
                enrollment_id = %enrollment,
                class_code = %record.class_code,
                "no remote section under the resolved key; enrollment pending"
            );
        }

        for action in plan.actions {
            match action {
                Action::Deactivate { remote_id } => {
                    match self
                        .retry
                        .execute("disable_student", || self.client.disable_student(&remote_id))
                        .await
                    {
                        Ok(()) => {
                            StudentMirror::set_active(&self.pool, enrollment, year, false).await?;
                            mirror.note_active(enrollment, false);
                            applied.deactivated = true;
                            info!(enrollment_id = %enrollment, "student deactivated");
                        }
                        Err(e) => return self.operation_failed("disable", e, applied),
                    }
                }
                Action::Activate { remote_id } => {
                    match self
                        .retry
                        .execute("enable_student", || self.client.enable_student(&remote_id))
                        .await
                    {
                        Ok(()) => {
                            StudentMirror::set_active(&self.pool, enrollment, year, true).await?;
                            mirror.note_active(enrollment, true);
                            applied.activated = true;
                            info!(enrollment_id = %enrollment, "student reactivated");
                        }
                        Err(e) => return self.operation_failed("enable", e, applied),
                    }
                }
                Action::Create { name, email: new_email } => {
                    let payload = StudentPayload {
                        name: name.clone(),
                        enrollment_number: enrollment.to_string(),
                        email: new_email.clone(),
                    };
                    match self
                        .retry
                        .execute("create_student", || self.client.create_student(&payload))
                        .await
                    {
                        Ok(created) => {
                            let row = StudentMirror {
                                enrollment_id: enrollment.to_string(),
                                school_year: year,
                                remote_id: created.id.clone(),
                                name: name.clone(),
                                email: Some(new_email.clone()),
                                active: true,
                                class_section_ids: vec![],
                            };
                            StudentMirror::upsert(&self.pool, &row).await?;
                            mirror.note_student(enrollment, row.into());
                            applied.created = true;
                            info!(enrollment_id = %enrollment, remote_id = %created.id, "student created");
                        }
                        Err(e) if e.is_validation() => {
                            match self.recover_duplicate_create(mirror, record, email).await? {
                                Some(extra) => {
                                    applied.updated |= extra.updated;
                                    applied.activated |= extra.activated;
                                }
                                None => return self.operation_failed("create", e, applied),
                            }
                        }
                        Err(e) => return self.operation_failed("create", e, applied),
                    }
                }
                Action::Update {
                    remote_id,
                    name,
                    email: new_email,
                } => {
                    let payload = StudentPayload {
                        name: name.clone(),
                        enrollment_number: enrollment.to_string(),
                        email: new_email.clone(),
                    };
                    match self
                        .retry
                        .execute("update_student", || {
                            self.client.update_student(&remote_id, &payload)
                        })
                        .await
                    {
                        Ok(()) => {
                            StudentMirror::set_identity(
                                &self.pool, enrollment, year, &name, &new_email,
                            )
                            .await?;
                            mirror.note_identity(enrollment, &name, &new_email);
                            applied.updated = true;
                            info!(enrollment_id = %enrollment, "student identity updated");
                        }
                        Err(e) => return self.operation_failed("update", e, applied),
                    }
                }
                Action::AssignSections { section_ids } => {
                    // Re-check against the mirror: a duplicate-create
                    // recovery may have linked a record that already
                    // holds some of these sections.
                    let (remote_id, held) = match mirror.student(enrollment) {
                        Some(entry) => (entry.remote_id.clone(), entry.class_section_ids.clone()),
                        None => continue,
                    };
                    let missing: Vec<String> = section_ids
                        .into_iter()
                        .filter(|id| !held.contains(id))
                        .collect();
                    if missing.is_empty() {
                        continue;
                    }
                    match self
                        .retry
                        .execute("assign_sections", || {
                            self.client.assign_sections(&remote_id, &missing)
                        })
                        .await
                    {
                        Ok(()) => {
                            let mut all = held;
                            all.extend(missing.iter().cloned());
                            StudentMirror::set_sections(&self.pool, enrollment, year, &all).await?;
                            mirror.note_sections_assigned(enrollment, &missing);
                            applied.sections_assigned += missing.len();
                            info!(
                                enrollment_id = %enrollment,
                                sections = missing.len(),
                                "student enrolled into sections"
                            );
                        }
                        Err(e) => return self.operation_failed("assign", e, applied),
                    }
                }
            }
        }

        Ok(RecordOutcome::Reconciled(applied))
    }

    /// Create said the enrollment already exists remotely: re-query the
    /// directory, link the found record into the mirror, and bring its
    /// activation and identity in line.  Returns `None` when the record
    /// cannot be recovered (no match, or a follow-up call failed).
    async fn recover_duplicate_create(
        &self,
        mirror: &mut MirrorIndex,
        record: &RosterRecord,
        email: &str,
    ) -> SyncResult<Option<Applied>> {
        let year = self.config.school_year;
        let enrollment = record.enrollment_id.as_str();
        warn!(
            enrollment_id = %enrollment,
            "create rejected as duplicate, re-querying directory"
        );

        let found = match self
            .retry
            .execute("find_student_by_enrollment", || {
                self.client.find_student_by_enrollment(year, enrollment)
            })
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
            Err(e) => {
                warn!(enrollment_id = %enrollment, error = %e, "duplicate re-query failed");
                return Ok(None);
            }
        };
        let Some(found) = found else {
            warn!(
                enrollment_id = %enrollment,
                "duplicate create but no matching directory record"
            );
            return Ok(None);
        };

        let row = StudentMirror {
            enrollment_id: enrollment.to_string(),
            school_year: year,
            remote_id: found.id.clone(),
            name: found.name.clone(),
            email: found.email.clone(),
            active: found.active,
            class_section_ids: found.section_ids(),
        };
        StudentMirror::upsert(&self.pool, &row).await?;
        mirror.note_student(enrollment, row.into());

        let mut extra = Applied::default();

        if !found.active {
            match self
                .retry
                .execute("enable_student", || self.client.enable_student(&found.id))
                .await
            {
                Ok(()) => {
                    StudentMirror::set_active(&self.pool, enrollment, year, true).await?;
                    mirror.note_active(enrollment, true);
                    extra.activated = true;
                }
                Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
                Err(e) => {
                    warn!(enrollment_id = %enrollment, error = %e, "enable after link failed");
                    return Ok(None);
                }
            }
        }

        if found.name != record.name || found.email.as_deref() != Some(email) {
            let payload = StudentPayload {
                name: record.name.clone(),
                enrollment_number: enrollment.to_string(),
                email: email.to_string(),
            };
            match self
                .retry
                .execute("update_student", || {
                    self.client.update_student(&found.id, &payload)
                })
                .await
            {
                Ok(()) => {
                    StudentMirror::set_identity(&self.pool, enrollment, year, &record.name, email)
                        .await?;
                    mirror.note_identity(enrollment, &record.name, email);
                    extra.updated = true;
                }
                Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
                Err(e) => {
                    warn!(enrollment_id = %enrollment, error = %e, "update after link failed");
                    return Ok(None);
                }
            }
        }

        info!(
            enrollment_id = %enrollment,
            remote_id = %found.id,
            "linked existing directory record"
        );
        Ok(Some(extra))
    }

    fn operation_failed(
        &self,
        operation: &'static str,
        error: DirectoryError,
        applied: Applied,
    ) -> SyncResult<RecordOutcome> {
        if error.is_auth() {
            return Err(SyncError::Directory(error));
        }
        warn!(operation, error = %error, "operation failed, record marked failed");
        Ok(RecordOutcome::Failed {
            operation,
            error: error.to_string(),
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(enrollment_id: &str, status_code: i32, class_code: &str) -> RosterRecord {
        RosterRecord {
            unit_code: "01".to_string(),
            status_code,
            enrollment_id: enrollment_id.to_string(),
            name: "Ana".to_string(),
            class_code: class_code.to_string(),
        }
    }

    fn make_mirrored(remote_id: &str, active: bool, sections: &[&str]) -> MirroredStudent {
        MirroredStudent {
            remote_id: remote_id.to_string(),
            name: "Ana".to_string(),
            email: Some("0001@alunos.smrede.com.br".to_string()),
            active,
            class_section_ids: sections.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn make_reference() -> ReferenceMap {
        let mut reference = ReferenceMap::default();
        reference.insert_unit("01", "Bento Ribeiro");
        reference.insert_coordination(
            "Bento Ribeiro",
            Stage::EarlyYears,
            "f286f842-b8a7-4834-818e-eedea7d5f7c2".parse().unwrap(),
        );
        reference.insert_coordination(
            "Bento Ribeiro",
            Stage::LateYears,
            "972b0161-d403-4b50-ab79-dd3ce20f169a".parse().unwrap(),
        );
        reference
    }

    #[test]
    fn test_new_student_is_created_and_enrolled() {
        // Scenario: record (unit "01", status 1, id "0001", class "1155")
        // with no prior mirror entry.
        let record = make_record("0001", 1, "1155");
        let reference = make_reference();

        let resolution = resolve(&record, &reference).unwrap();
        assert_eq!(resolution.unit_name, "Bento Ribeiro");
        assert_eq!(resolution.stage, Stage::EarlyYears);

        let sections = vec!["c-1".to_string()];
        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            None,
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert_eq!(plan.actions.len(), 2);
                assert!(matches!(plan.actions[0], Action::Create { .. }));
                assert_eq!(
                    plan.actions[1],
                    Action::AssignSections {
                        section_ids: vec!["c-1".to_string()]
                    }
                );
                assert!(!plan.section_pending);
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_withdrawn_student_gets_disable_only() {
        // Scenario: the same student, now withdrawn (status 2).
        let record = make_record("0001", 2, "1155");
        let mirrored = make_mirrored("s-1", true, &["c-1"]);
        let sections = vec!["c-1".to_string()];

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            false,
            Some(&mirrored),
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert_eq!(
                    plan.actions,
                    vec![Action::Deactivate {
                        remote_id: "s-1".to_string()
                    }]
                );
                assert!(!plan.section_pending);
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_short_class_code_is_skipped_before_any_call() {
        // Scenario: class code "99" (shorter than three characters).
        let record = make_record("0001", 1, "99");
        let reference = make_reference();

        assert_eq!(
            resolve(&record, &reference),
            Err(SkipReason::UnresolvedClassCode)
        );
    }

    #[test]
    fn test_withdrawn_and_absent_needs_nothing() {
        let record = make_record("0001", 4, "1155");
        let plan = decide(&record, "0001@alunos.smrede.com.br", false, None, None);
        assert_eq!(plan, Plan::Skip(SkipReason::AlreadyAbsentInactive));
    }

    #[test]
    fn test_converged_student_yields_no_actions() {
        // Idempotence: a second run over unchanged state issues nothing.
        let record = make_record("0001", 1, "1155");
        let mirrored = make_mirrored("s-1", true, &["c-1", "c-2"]);
        let sections = vec!["c-1".to_string(), "c-2".to_string()];

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            Some(&mirrored),
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert!(plan.actions.is_empty());
                assert!(!plan.section_pending);
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_assignment_covers_every_missing_section_id() {
        // Convergence: duplicate sections under one key are all joined.
        let record = make_record("0001", 1, "1155");
        let mirrored = make_mirrored("s-1", true, &["c-1"]);
        let sections = vec!["c-1".to_string(), "c-2".to_string(), "c-3".to_string()];

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            Some(&mirrored),
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert_eq!(
                    plan.actions,
                    vec![Action::AssignSections {
                        section_ids: vec!["c-2".to_string(), "c-3".to_string()]
                    }]
                );
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_identity_drift_triggers_update() {
        let record = RosterRecord {
            name: "Ana Clara".to_string(),
            ..make_record("0001", 1, "1155")
        };
        let mirrored = make_mirrored("s-1", true, &[]);

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            Some(&mirrored),
            None,
        );

        match plan {
            Plan::Apply(plan) => {
                assert_eq!(plan.actions.len(), 1);
                match &plan.actions[0] {
                    Action::Update { remote_id, name, .. } => {
                        assert_eq!(remote_id, "s-1");
                        assert_eq!(name, "Ana Clara");
                    }
                    other => panic!("expected an update, got {other:?}"),
                }
                assert!(plan.section_pending);
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_reactivation_precedes_update_and_enrollment() {
        let record = RosterRecord {
            name: "Ana Clara".to_string(),
            ..make_record("0001", 1, "1155")
        };
        let mirrored = make_mirrored("s-1", false, &[]);
        let sections = vec!["c-1".to_string()];

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            Some(&mirrored),
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert!(matches!(plan.actions[0], Action::Activate { .. }));
                assert!(matches!(plan.actions[1], Action::Update { .. }));
                assert!(matches!(plan.actions[2], Action::AssignSections { .. }));
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_missing_section_key_leaves_enrollment_pending() {
        let record = make_record("0001", 1, "1155");
        let plan = decide(&record, "0001@alunos.smrede.com.br", true, None, None);

        match plan {
            Plan::Apply(plan) => {
                assert_eq!(plan.actions.len(), 1);
                assert!(matches!(plan.actions[0], Action::Create { .. }));
                assert!(plan.section_pending);
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_linked_duplicate_takes_the_update_path() {
        // After a duplicate create is recovered by linking the existing
        // directory record, the next pass sees a mirrored entry and
        // converges through update/assign instead of create.
        let record = make_record("0001", 1, "1155");
        let linked = MirroredStudent {
            name: "Ana Sousa".to_string(),
            ..make_mirrored("s-9", true, &[])
        };
        let sections = vec!["c-1".to_string()];

        let plan = decide(
            &record,
            "0001@alunos.smrede.com.br",
            true,
            Some(&linked),
            Some(&sections),
        );

        match plan {
            Plan::Apply(plan) => {
                assert!(matches!(plan.actions[0], Action::Update { .. }));
                assert!(matches!(plan.actions[1], Action::AssignSections { .. }));
            }
            Plan::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_unresolved_unit_and_coordination() {
        let reference = make_reference();

        let unknown_unit = RosterRecord {
            unit_code: "99".to_string(),
            ..make_record("0001", 1, "1155")
        };
        assert_eq!(
            resolve(&unknown_unit, &reference),
            Err(SkipReason::UnresolvedUnit)
        );

        // Secondary stage has no coordination configured for this unit.
        let secondary = make_record("0001", 1, "2101");
        assert_eq!(
            resolve(&secondary, &reference),
            Err(SkipReason::UnresolvedCoordination)
        );
    }
}
