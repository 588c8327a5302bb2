//! Mirrored student model.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// A student as last seen on (or written to) the remote directory.
///
/// Rows are keyed by `(enrollment_id, school_year)`, so the same student
/// can exist across school years without colliding.  Rows are never
/// deleted; deactivation flips `active` instead.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentMirror {
    /// Canonical enrollment identifier.
    pub enrollment_id: String,

    /// School-year partition the row belongs to.
    pub school_year: i32,

    /// Identifier assigned by the remote directory.
    pub remote_id: String,

    /// Display name as held remotely.
    pub name: String,

    /// Email as held remotely (always derived from the enrollment id on
    /// our writes, but snapshot rows may carry none).
    pub email: Option<String>,

    /// Remote activation flag.
    pub active: bool,

    /// Remote class sections the student is enrolled in.
    pub class_section_ids: Vec<String>,
}

impl StudentMirror {
    /// Load every mirrored student for a school year.
    pub async fn list_by_year(pool: &PgPool, school_year: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT enrollment_id, school_year, remote_id, name, email, active, class_section_ids
            FROM students_mirror
            WHERE school_year = $1
            ",
        )
        .bind(school_year)
        .fetch_all(pool)
        .await
    }

    /// Insert the row, or overwrite all non-key columns if it exists.
    pub async fn upsert(pool: &PgPool, row: &Self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO students_mirror
                (enrollment_id, school_year, remote_id, name, email, active, class_section_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (enrollment_id, school_year) DO UPDATE SET
                remote_id = EXCLUDED.remote_id,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                active = EXCLUDED.active,
                class_section_ids = EXCLUDED.class_section_ids
            ",
        )
        .bind(&row.enrollment_id)
        .bind(row.school_year)
        .bind(&row.remote_id)
        .bind(&row.name)
        .bind(&row.email)
        .bind(row.active)
        .bind(&row.class_section_ids)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Flip the activation flag.
    pub async fn set_active(
        pool: &PgPool,
        enrollment_id: &str,
        school_year: i32,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE students_mirror SET active = $3
            WHERE enrollment_id = $1 AND school_year = $2
            ",
        )
        .bind(enrollment_id)
        .bind(school_year)
        .bind(active)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Replace the identity fields after a remote update succeeded.
    pub async fn set_identity(
        pool: &PgPool,
        enrollment_id: &str,
        school_year: i32,
        name: &str,
        email: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE students_mirror SET name = $3, email = $4
            WHERE enrollment_id = $1 AND school_year = $2
            ",
        )
        .bind(enrollment_id)
        .bind(school_year)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Replace the section membership after remote enrollment succeeded.
    pub async fn set_sections(
        pool: &PgPool,
        enrollment_id: &str,
        school_year: i32,
        class_section_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE students_mirror SET class_section_ids = $3
            WHERE enrollment_id = $1 AND school_year = $2
            ",
        )
        .bind(enrollment_id)
        .bind(school_year)
        .bind(class_section_ids)
        .execute(pool)
        .await?;
        Ok(())
    }
}
