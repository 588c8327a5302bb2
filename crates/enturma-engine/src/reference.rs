//! Immutable lookup tables resolving canonical codes to directory entities.
//!
//! Loaded once (usually from an operator-maintained JSON document) and
//! injected into the engine; nothing mutates these tables during a run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Education stage, derived from the class code's numeric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    EarlyYears,
    LateYears,
    Secondary,
}

impl Stage {
    /// Derive the stage from a canonical class code.
    ///
    /// Codes starting `"11"` are primary: third character `'5'` means
    /// early years, anything else late years.  Codes starting `"2"` are
    /// secondary.  Codes shorter than three characters or with any other
    /// prefix resolve to nothing.
    #[must_use]
    pub fn from_class_code(class_code: &str) -> Option<Stage> {
        let third = class_code.chars().nth(2)?;
        if class_code.starts_with("11") {
            Some(if third == '5' {
                Stage::EarlyYears
            } else {
                Stage::LateYears
            })
        } else if class_code.starts_with('2') {
            Some(Stage::Secondary)
        } else {
            None
        }
    }

    /// String form used in configuration and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::EarlyYears => "early_years",
            Stage::LateYears => "late_years",
            Stage::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordination identifiers of one administrative unit, per stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinationIds {
    #[serde(default)]
    pub early_years: Option<Uuid>,
    #[serde(default)]
    pub late_years: Option<Uuid>,
    #[serde(default)]
    pub secondary: Option<Uuid>,
}

impl CoordinationIds {
    fn get(&self, stage: Stage) -> Option<Uuid> {
        match stage {
            Stage::EarlyYears => self.early_years,
            Stage::LateYears => self.late_years,
            Stage::Secondary => self.secondary,
        }
    }

    fn set(&mut self, stage: Stage, id: Uuid) {
        match stage {
            Stage::EarlyYears => self.early_years = Some(id),
            Stage::LateYears => self.late_years = Some(id),
            Stage::Secondary => self.secondary = Some(id),
        }
    }
}

/// The three lookup tables reconciliation resolves against:
/// unit code → unit name, (unit name, stage) → coordination, and
/// grade digit → grade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceMap {
    #[serde(default)]
    units: HashMap<String, String>,
    #[serde(default)]
    coordinations: HashMap<String, CoordinationIds>,
    #[serde(default)]
    grades: HashMap<char, Uuid>,
}

impl ReferenceMap {
    /// Parse a reference map from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Name of an administrative unit.
    #[must_use]
    pub fn unit_name(&self, unit_code: &str) -> Option<&str> {
        self.units.get(unit_code).map(String::as_str)
    }

    /// Coordination of a unit at a given stage.
    #[must_use]
    pub fn coordination_id(&self, unit_name: &str, stage: Stage) -> Option<Uuid> {
        self.coordinations.get(unit_name)?.get(stage)
    }

    /// Grade identifier for a class code's grade digit.
    #[must_use]
    pub fn grade_id(&self, grade_digit: char) -> Option<Uuid> {
        self.grades.get(&grade_digit).copied()
    }

    // Load-time builders.

    pub fn insert_unit(&mut self, unit_code: impl Into<String>, name: impl Into<String>) {
        self.units.insert(unit_code.into(), name.into());
    }

    pub fn insert_coordination(&mut self, unit_name: impl Into<String>, stage: Stage, id: Uuid) {
        self.coordinations
            .entry(unit_name.into())
            .or_default()
            .set(stage, id);
    }

    pub fn insert_grade(&mut self, grade_digit: char, id: Uuid) {
        self.grades.insert(grade_digit, id);
    }
}
