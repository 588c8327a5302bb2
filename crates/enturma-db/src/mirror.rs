//! In-memory index over the mirror tables.
//!
//! Built once per run and kept current by the engine as its own remote
//! writes succeed (`note_*` methods), so lookups never hit the directory
//! mid-run.  Persistence of those same updates goes through the models;
//! the index itself is plain data.

use crate::error::DbError;
use crate::models::{SectionMirror, StudentMirror};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Mirror entry for one student, keyed externally by enrollment id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredStudent {
    pub remote_id: String,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
    pub class_section_ids: Vec<String>,
}

impl From<StudentMirror> for MirroredStudent {
    fn from(row: StudentMirror) -> Self {
        Self {
            remote_id: row.remote_id,
            name: row.name,
            email: row.email,
            active: row.active,
            class_section_ids: row.class_section_ids,
        }
    }
}

/// The two lookups reconciliation needs: student by enrollment id, and
/// remote section ids by `(coordination_id, section name)`.
#[derive(Debug)]
pub struct MirrorIndex {
    school_year: i32,
    by_enrollment: HashMap<String, MirroredStudent>,
    by_section_key: HashMap<(Uuid, String), Vec<String>>,
}

impl MirrorIndex {
    /// Build the index from already-loaded mirror rows.
    #[must_use]
    pub fn from_rows(
        school_year: i32,
        students: Vec<StudentMirror>,
        sections: Vec<SectionMirror>,
    ) -> Self {
        let mut by_enrollment = HashMap::with_capacity(students.len());
        for row in students {
            by_enrollment.insert(row.enrollment_id.trim().to_string(), row.into());
        }

        let mut by_section_key: HashMap<(Uuid, String), Vec<String>> = HashMap::new();
        for section in sections {
            by_section_key
                .entry((section.coordination_id, section.name.trim().to_string()))
                .or_default()
                .push(section.remote_id);
        }

        Self {
            school_year,
            by_enrollment,
            by_section_key,
        }
    }

    /// Load and index the mirror for a school year.
    pub async fn load(pool: &PgPool, school_year: i32) -> Result<Self, DbError> {
        let students = StudentMirror::list_by_year(pool, school_year)
            .await
            .map_err(DbError::QueryFailed)?;
        let sections = SectionMirror::list_by_year(pool, school_year)
            .await
            .map_err(DbError::QueryFailed)?;
        Ok(Self::from_rows(school_year, students, sections))
    }

    /// School year this index was built for.
    #[must_use]
    pub fn school_year(&self) -> i32 {
        self.school_year
    }

    /// Look up a student by enrollment id.
    #[must_use]
    pub fn student(&self, enrollment_id: &str) -> Option<&MirroredStudent> {
        self.by_enrollment.get(enrollment_id)
    }

    /// Remote section ids under a section key, if any are known.
    #[must_use]
    pub fn section_ids(&self, coordination_id: Uuid, name: &str) -> Option<&[String]> {
        self.by_section_key
            .get(&(coordination_id, name.to_string()))
            .map(Vec::as_slice)
    }

    /// Iterate all mirrored students.
    pub fn students(&self) -> impl Iterator<Item = (&String, &MirroredStudent)> {
        self.by_enrollment.iter()
    }

    /// Number of students indexed.
    #[must_use]
    pub fn student_count(&self) -> usize {
        self.by_enrollment.len()
    }

    // ── In-place updates (the engine's own writes) ────────────────────

    /// Record a newly created student.
    pub fn note_student(&mut self, enrollment_id: &str, entry: MirroredStudent) {
        self.by_enrollment.insert(enrollment_id.to_string(), entry);
    }

    /// Record a successful remote identity update.
    pub fn note_identity(&mut self, enrollment_id: &str, name: &str, email: &str) {
        if let Some(entry) = self.by_enrollment.get_mut(enrollment_id) {
            entry.name = name.to_string();
            entry.email = Some(email.to_string());
        }
    }

    /// Record a successful remote enable/disable.
    pub fn note_active(&mut self, enrollment_id: &str, active: bool) {
        if let Some(entry) = self.by_enrollment.get_mut(enrollment_id) {
            entry.active = active;
        }
    }

    /// Record successful section enrollment.
    pub fn note_sections_assigned(&mut self, enrollment_id: &str, section_ids: &[String]) {
        if let Some(entry) = self.by_enrollment.get_mut(enrollment_id) {
            for id in section_ids {
                if !entry.class_section_ids.contains(id) {
                    entry.class_section_ids.push(id.clone());
                }
            }
        }
    }

    /// Record a section created remotely during this run.
    pub fn note_section(&mut self, section: &SectionMirror) {
        self.by_section_key
            .entry((section.coordination_id, section.name.trim().to_string()))
            .or_default()
            .push(section.remote_id.clone());
    }
}
