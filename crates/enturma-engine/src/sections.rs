//! Provisioning of missing remote class sections.
//!
//! The roster can reference sections that nobody created on the directory
//! yet.  Before reconciling students, the distinct class codes seen in
//! the roster are resolved and any section key absent from the mirror is
//! created remotely.  The directory enforces uniqueness on (name,
//! school_year, coordination), which makes the create idempotent.

use crate::error::{SyncError, SyncResult};
use crate::reference::{ReferenceMap, Stage};
use enturma_db::{MirrorIndex, SectionMirror};
use enturma_directory::types::SectionPayload;
use enturma_directory::{DirectoryClient, RetryPolicy, SectionCreated};
use sqlx::PgPool;
use tracing::{debug, info, warn};

/// Counts from one provisioning pass.
#[derive(Debug, Default, Clone)]
pub struct SectionReport {
    pub created: u64,
    pub already_existing: u64,
    pub unresolved: u64,
    pub failed: u64,
}

/// Creates remote sections for roster class codes with no mirror entry.
pub struct SectionProvisioner<'a> {
    client: &'a DirectoryClient,
    retry: &'a RetryPolicy,
    reference: &'a ReferenceMap,
    pool: &'a PgPool,
    school_year: i32,
}

impl<'a> SectionProvisioner<'a> {
    #[must_use]
    pub fn new(
        client: &'a DirectoryClient,
        retry: &'a RetryPolicy,
        reference: &'a ReferenceMap,
        pool: &'a PgPool,
        school_year: i32,
    ) -> Self {
        Self {
            client,
            retry,
            reference,
            pool,
            school_year,
        }
    }

    /// Create every section the roster references that the mirror does
    /// not know.  `section_keys` is the distinct `(class_code, unit_code)`
    /// pairs from the roster; newly created sections are persisted and
    /// added to the index so the same run can enroll into them.
    pub async fn provision_missing(
        &self,
        mirror: &mut MirrorIndex,
        section_keys: &[(String, String)],
    ) -> SyncResult<SectionReport> {
        let mut report = SectionReport::default();

        for (class_code, unit_code) in section_keys {
            let class_code = class_code.trim();

            let resolved = self.resolve_section(class_code, unit_code.trim());
            let Some((coordination_id, grade_id)) = resolved else {
                debug!(class_code, unit_code, "section key unresolved, not provisioned");
                report.unresolved += 1;
                continue;
            };

            if mirror.section_ids(coordination_id, class_code).is_some() {
                continue;
            }

            let payload = SectionPayload {
                name: class_code.to_string(),
                grade: grade_id,
                coordination: coordination_id,
                school_year: self.school_year,
            };
            match self
                .retry
                .execute("create_section", || self.client.create_section(&payload))
                .await
            {
                Ok(SectionCreated::Created(section)) => {
                    let row = SectionMirror {
                        remote_id: section.id.clone(),
                        name: section.name.trim().to_string(),
                        coordination_id: section.coordination,
                        school_year: section.school_year,
                    };
                    SectionMirror::upsert(self.pool, &row)
                        .await
                        .map_err(SyncError::Database)?;
                    mirror.note_section(&row);
                    info!(class_code, remote_id = %row.remote_id, "section created");
                    report.created += 1;
                }
                Ok(SectionCreated::AlreadyExists) => {
                    // Exists remotely but was missing from the snapshot;
                    // the next refresh will index it.
                    debug!(class_code, "section already exists on directory");
                    report.already_existing += 1;
                }
                Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
                Err(e) => {
                    warn!(class_code, error = %e, "section create failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Resolve a `(class_code, unit_code)` pair to the coordination and
    /// grade a new section needs; `None` if any mapping is missing.
    fn resolve_section(&self, class_code: &str, unit_code: &str) -> Option<(uuid::Uuid, uuid::Uuid)> {
        let unit_name = self.reference.unit_name(unit_code)?;
        let stage = Stage::from_class_code(class_code)?;
        let coordination_id = self.reference.coordination_id(unit_name, stage)?;
        let grade_digit = class_code.chars().nth(2)?;
        let grade_id = self.reference.grade_id(grade_digit)?;
        Some((coordination_id, grade_id))
    }
}
