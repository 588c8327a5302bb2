//! Maintenance sweeps over the remote directory.
//!
//! Run outside the regular reconciliation pass: one sweep retires
//! duplicate remote records for the same enrollment id, the other retires
//! records whose enrollment id is malformed.

use crate::error::{SyncError, SyncResult};
use enturma_db::{MirrorIndex, StudentMirror};
use enturma_directory::types::RemoteStudent;
use enturma_directory::{DirectoryClient, RetryPolicy};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{info, warn};

/// Counts from one maintenance sweep.
#[derive(Debug, Default, Clone)]
pub struct MaintenanceReport {
    pub examined: u64,
    pub deactivated: u64,
    pub failed: u64,
}

/// Pick the duplicate directory records that are safe to retire.
///
/// Groups the snapshot by enrollment number; in a group with more than
/// one record, every active record holding no section membership is a
/// candidate.  A record that is enrolled somewhere is never touched, so
/// the copy students actually use survives.
#[must_use]
pub fn duplicate_candidates(snapshot: &[RemoteStudent]) -> Vec<&RemoteStudent> {
    let mut by_enrollment: HashMap<&str, Vec<&RemoteStudent>> = HashMap::new();
    for student in snapshot {
        by_enrollment
            .entry(student.enrollment_number.trim())
            .or_default()
            .push(student);
    }

    let mut candidates: Vec<&RemoteStudent> = by_enrollment
        .into_values()
        .filter(|group| group.len() > 1)
        .flatten()
        .filter(|s| s.active && s.classes.is_empty())
        .collect();
    candidates.sort_by(|a, b| {
        (a.enrollment_number.as_str(), a.id.as_str())
            .cmp(&(b.enrollment_number.as_str(), b.id.as_str()))
    });
    candidates
}

/// Disable duplicate remote records that hold no section membership.
pub async fn deactivate_duplicate_students(
    client: &DirectoryClient,
    retry: &RetryPolicy,
    snapshot: &[RemoteStudent],
) -> SyncResult<MaintenanceReport> {
    let candidates = duplicate_candidates(snapshot);
    let mut report = MaintenanceReport {
        examined: candidates.len() as u64,
        ..MaintenanceReport::default()
    };

    for student in candidates {
        match retry
            .execute("disable_student", || client.disable_student(&student.id))
            .await
        {
            Ok(()) => {
                info!(
                    enrollment_number = %student.enrollment_number,
                    remote_id = %student.id,
                    "duplicate record deactivated"
                );
                report.deactivated += 1;
            }
            Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
            Err(e) => {
                warn!(remote_id = %student.id, error = %e, "duplicate deactivation failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Disable mirrored students whose enrollment id is shorter than
/// `min_len`, writing the mirror through on each success.
pub async fn deactivate_malformed_enrollments(
    client: &DirectoryClient,
    retry: &RetryPolicy,
    pool: &PgPool,
    mirror: &mut MirrorIndex,
    min_len: usize,
) -> SyncResult<MaintenanceReport> {
    let targets: Vec<(String, String)> = mirror
        .students()
        .filter(|(enrollment, entry)| entry.active && enrollment.chars().count() < min_len)
        .map(|(enrollment, entry)| (enrollment.clone(), entry.remote_id.clone()))
        .collect();

    let mut report = MaintenanceReport {
        examined: targets.len() as u64,
        ..MaintenanceReport::default()
    };
    let school_year = mirror.school_year();

    for (enrollment_id, remote_id) in targets {
        match retry
            .execute("disable_student", || client.disable_student(&remote_id))
            .await
        {
            Ok(()) => {
                StudentMirror::set_active(pool, &enrollment_id, school_year, false).await?;
                mirror.note_active(&enrollment_id, false);
                info!(
                    enrollment_id = %enrollment_id,
                    remote_id = %remote_id,
                    "malformed enrollment deactivated"
                );
                report.deactivated += 1;
            }
            Err(e) if e.is_auth() => return Err(SyncError::Directory(e)),
            Err(e) => {
                warn!(enrollment_id = %enrollment_id, error = %e, "deactivation failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
