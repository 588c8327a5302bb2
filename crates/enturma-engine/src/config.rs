//! Reconciliation run configuration.

use chrono::Datelike;
use enturma_db::BatchSettings;
use enturma_directory::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Retry knobs for remote operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetrySettings {
    /// Build the retry policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}

/// Configuration for one reconciliation run.
///
/// A plain value the caller constructs or deserializes; where credentials
/// come from is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// School year being reconciled.
    pub school_year: i32,

    /// Source-of-record view holding the canonical roster.
    pub roster_view: String,

    /// Minimum numeric class code the roster query includes.
    pub min_class_code: i64,

    /// Status codes that mean a student has withdrawn.
    pub withdrawn_status_codes: Vec<i32>,

    /// Domain for derived student emails (`<enrollment>@<domain>`).
    pub email_domain: String,

    /// Enrollment ids shorter than this are considered malformed.
    pub min_enrollment_len: usize,

    /// Create missing remote sections before reconciling students.
    pub provision_sections: bool,

    /// Per-request timeout against the directory, in seconds.
    pub request_timeout_secs: u64,

    pub retry: RetrySettings,
    pub batch: BatchSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let school_year = chrono::Utc::now().year();
        Self {
            school_year,
            roster_view: roster_view_for(school_year),
            min_class_code: 11_500,
            withdrawn_status_codes: vec![2, 4],
            email_domain: "alunos.smrede.com.br".to_string(),
            min_enrollment_len: 9,
            provision_sections: false,
            request_timeout_secs: 30,
            retry: RetrySettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Derived email for an enrollment id.
    #[must_use]
    pub fn email_for(&self, enrollment_id: &str) -> String {
        format!("{enrollment_id}@{}", self.email_domain)
    }

    /// Whether a status code means the student has withdrawn.
    #[must_use]
    pub fn is_withdrawn(&self, status_code: i32) -> bool {
        self.withdrawn_status_codes.contains(&status_code)
    }
}

/// Conventional name of the roster view for a school year
/// (`alunos_26_geral` for 2026).
#[must_use]
pub fn roster_view_for(school_year: i32) -> String {
    format!("alunos_{:02}_geral", school_year.rem_euclid(100))
}
