//! Mirrored class-section model.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A class section as last seen on the remote directory.
///
/// More than one remote section may share the same `(coordination_id,
/// name)` pair; duplicates are kept as they are, never merged.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SectionMirror {
    /// Identifier assigned by the remote directory.
    pub remote_id: String,

    /// Section name (the canonical class code).
    pub name: String,

    /// Coordination the section belongs to.
    pub coordination_id: Uuid,

    /// School year the section was created for.
    pub school_year: i32,
}

impl SectionMirror {
    /// Load every mirrored section for a school year.
    pub async fn list_by_year(pool: &PgPool, school_year: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT remote_id, name, coordination_id, school_year
            FROM sections_mirror
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
            INSERT INTO sections_mirror (remote_id, name, coordination_id, school_year)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (remote_id) DO UPDATE SET
                name = EXCLUDED.name,
                coordination_id = EXCLUDED.coordination_id,
                school_year = EXCLUDED.school_year
            ",
        )
        .bind(&row.remote_id)
        .bind(&row.name)
        .bind(row.coordination_id)
        .bind(row.school_year)
        .execute(pool)
        .await?;
        Ok(())
    }
}
