//! Chunked bulk upserts into the mirror tables.
//!
//! Directory snapshots can run to tens of thousands of rows, so writes are
//! partitioned into chunks, each committed as one transaction.  Chunk size
//! follows host memory pressure: under pressure the persister writes
//! smaller chunks, re-sampling every few chunks.  A failed chunk rolls
//! back alone; chunks already committed stay durable and later chunks
//! still run.

use crate::error::DbError;
use crate::models::{SectionMirror, StudentMirror};
use sqlx::PgPool;
use sysinfo::System;
use tracing::{debug, warn};

/// Sizing knobs for chunked persistence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Chunk size when memory pressure is low.
    pub large_chunk: usize,
    /// Chunk size under memory pressure.
    pub small_chunk: usize,
    /// Used-memory percentage above which the small chunk is used.
    pub memory_pressure_pct: f32,
    /// How many chunks to write before re-sampling memory pressure.
    pub resample_every: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            large_chunk: 1000,
            small_chunk: 500,
            memory_pressure_pct: 70.0,
            resample_every: 5,
        }
    }
}

/// What a bulk upsert actually did.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub rows_written: usize,
    /// Rows dropped by shaping (inactive snapshot students).
    pub rows_skipped: usize,
    pub chunks_committed: usize,
    pub chunks_failed: usize,
    pub last_error: Option<String>,
}

impl BatchReport {
    /// Whether every chunk committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0
    }
}

/// Writes directory snapshots into the mirror in memory-bounded chunks.
pub struct BatchPersister {
    settings: BatchSettings,
}

impl BatchPersister {
    /// Create a persister with the given sizing knobs.
    #[must_use]
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    /// Chunk size for a given memory pressure reading.
    #[must_use]
    pub fn chunk_for_pressure(pressure_pct: f32, settings: &BatchSettings) -> usize {
        if pressure_pct >= settings.memory_pressure_pct {
            settings.small_chunk
        } else {
            settings.large_chunk
        }
    }

    fn sample_chunk_size(&self, sys: &mut System) -> usize {
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return self.settings.large_chunk;
        }
        let pressure = (sys.used_memory() as f32 / total as f32) * 100.0;
        let chunk = Self::chunk_for_pressure(pressure, &self.settings);
        debug!(pressure_pct = pressure, chunk, "sampled memory pressure");
        chunk
    }

    /// Upsert a student snapshot.
    ///
    /// Only rows with `active == true` are persisted: inactive directory
    /// entries carry no state a later run needs, and leaving them out
    /// keeps "absent from the mirror" equivalent to "nothing to
    /// deactivate".
    pub async fn upsert_students(
        &self,
        pool: &PgPool,
        rows: &[StudentMirror],
    ) -> Result<BatchReport, DbError> {
        let shaped: Vec<&StudentMirror> = rows.iter().filter(|r| r.active).collect();
        let mut report = BatchReport {
            rows_skipped: rows.len() - shaped.len(),
            ..BatchReport::default()
        };

        let mut sys = System::new();
        let mut chunk_size = self.sample_chunk_size(&mut sys);
        let mut start = 0;

        while start < shaped.len() {
            if report.chunks_committed + report.chunks_failed > 0
                && (report.chunks_committed + report.chunks_failed) % self.settings.resample_every
                    == 0
            {
                chunk_size = self.sample_chunk_size(&mut sys);
            }

            let end = (start + chunk_size).min(shaped.len());
            let chunk = &shaped[start..end];

            match write_student_chunk(pool, chunk).await {
                Ok(()) => {
                    report.chunks_committed += 1;
                    report.rows_written += chunk.len();
                }
                Err(e) => {
                    warn!(
                        chunk_start = start,
                        chunk_len = chunk.len(),
                        error = %e,
                        "student chunk rolled back"
                    );
                    report.chunks_failed += 1;
                    report.last_error = Some(e.to_string());
                }
            }
            start = end;
        }

        Ok(report)
    }

    /// Upsert a section snapshot (every fetched section, unconditionally).
    pub async fn upsert_sections(
        &self,
        pool: &PgPool,
        rows: &[SectionMirror],
    ) -> Result<BatchReport, DbError> {
        let mut report = BatchReport::default();

        let mut sys = System::new();
        let mut chunk_size = self.sample_chunk_size(&mut sys);
        let mut start = 0;

        while start < rows.len() {
            if report.chunks_committed + report.chunks_failed > 0
                && (report.chunks_committed + report.chunks_failed) % self.settings.resample_every
                    == 0
            {
                chunk_size = self.sample_chunk_size(&mut sys);
            }

            let end = (start + chunk_size).min(rows.len());
            let chunk = &rows[start..end];

            match write_section_chunk(pool, chunk).await {
                Ok(()) => {
                    report.chunks_committed += 1;
                    report.rows_written += chunk.len();
                }
                Err(e) => {
                    warn!(
                        chunk_start = start,
                        chunk_len = chunk.len(),
                        error = %e,
                        "section chunk rolled back"
                    );
                    report.chunks_failed += 1;
                    report.last_error = Some(e.to_string());
                }
            }
            start = end;
        }

        Ok(report)
    }
}

/// Write one chunk of students inside a single transaction.
async fn write_student_chunk(pool: &PgPool, chunk: &[&StudentMirror]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for row in chunk {
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
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Write one chunk of sections inside a single transaction.
async fn write_section_chunk(pool: &PgPool, chunk: &[SectionMirror]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for row in chunk {
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
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}
