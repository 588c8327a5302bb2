//! Maps directory snapshot records onto mirror rows.

use enturma_db::{SectionMirror, StudentMirror};
use enturma_directory::types::{RemoteSection, RemoteStudent};

/// Shape a student snapshot into mirror rows for the given school year.
#[must_use]
pub fn student_rows(snapshot: &[RemoteStudent], school_year: i32) -> Vec<StudentMirror> {
    snapshot
        .iter()
        .map(|s| StudentMirror {
            enrollment_id: s.enrollment_number.trim().to_string(),
            school_year,
            remote_id: s.id.clone(),
            name: s.name.clone(),
            email: s.email.clone(),
            active: s.active,
            class_section_ids: s.section_ids(),
        })
        .collect()
}

/// Shape a section snapshot into mirror rows.
#[must_use]
pub fn section_rows(snapshot: &[RemoteSection]) -> Vec<SectionMirror> {
    snapshot
        .iter()
        .map(|s| SectionMirror {
            remote_id: s.id.clone(),
            name: s.name.trim().to_string(),
            coordination_id: s.coordination,
            school_year: s.school_year,
        })
        .collect()
}
