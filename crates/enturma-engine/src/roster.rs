//! Canonical roster reader.
//!
//! Streams enrollment records from the source-of-record view without
//! materializing the whole roster: rows come through a server-side cursor
//! and are trimmed as they arrive.  Ordering by enrollment id is part of
//! the contract — the engine's duplicate handling is deterministic only
//! because records arrive sorted.

use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::{FromRow, PgPool};

/// One canonical enrollment record, fields already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub unit_code: String,
    pub status_code: i32,
    pub enrollment_id: String,
    pub name: String,
    pub class_code: String,
}

#[derive(Debug, FromRow)]
struct RosterRow {
    unit_code: String,
    status_code: i32,
    enrollment_id: String,
    name: String,
    class_code: String,
}

impl From<RosterRow> for RosterRecord {
    fn from(row: RosterRow) -> Self {
        Self {
            unit_code: row.unit_code.trim().to_string(),
            status_code: row.status_code,
            enrollment_id: row.enrollment_id.trim().to_string(),
            name: row.name.trim().to_string(),
            class_code: row.class_code.trim().to_string(),
        }
    }
}

/// Reads the canonical roster from the source-of-record view.
pub struct RosterSource {
    pool: PgPool,
    min_class_code: i64,
    stream_query: String,
    distinct_query: String,
}

impl RosterSource {
    /// Create a reader over the given view, restricted to class codes at
    /// or above `min_class_code`.
    #[must_use]
    pub fn new(pool: PgPool, roster_view: &str, min_class_code: i64) -> Self {
        // The view name comes from configuration, not user input; it is
        // interpolated because identifiers cannot be bound.
        let stream_query = format!(
            "SELECT unidade AS unit_code, sit::INT AS status_code, \
             matricula AS enrollment_id, nome AS name, turma AS class_code \
             FROM {roster_view} \
             WHERE turma::NUMERIC >= $1 \
             ORDER BY matricula"
        );
        let distinct_query = format!(
            "SELECT DISTINCT turma AS class_code, unidade AS unit_code \
             FROM {roster_view} \
             WHERE turma::NUMERIC >= $1"
        );
        Self {
            pool,
            min_class_code,
            stream_query,
            distinct_query,
        }
    }

    /// Stream the roster in enrollment-id order.
    ///
    /// The stream is finite and restartable (each call opens a fresh
    /// cursor).  On a read error the caller sees the `Err` item and the
    /// stream ends; the run degrades to a partial roster instead of
    /// crashing.
    pub fn stream(&self) -> BoxStream<'_, Result<RosterRecord, sqlx::Error>> {
        sqlx::query_as::<_, RosterRow>(&self.stream_query)
            .bind(self.min_class_code)
            .fetch(&self.pool)
            .map(|item| item.map(RosterRecord::from))
            .boxed()
    }

    /// Distinct `(class_code, unit_code)` pairs present in the roster,
    /// used to provision missing remote sections.
    pub async fn distinct_section_keys(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(&self.distinct_query)
            .bind(self.min_class_code)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(class_code, unit_code)| {
                (
                    class_code.trim().to_string(),
                    unit_code.trim().to_string(),
                )
            })
            .collect())
    }
}
