//! Wire types for the directory's REST API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of a paginated listing.  `next` is the absolute URL of the
/// following page, or `null` on the last one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Reference to a class section held by a student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRef {
    pub id: String,
}

/// A student record as the directory returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStudent {
    pub id: String,
    pub name: String,
    pub enrollment_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "is_active", default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub classes: Vec<SectionRef>,
}

impl RemoteStudent {
    /// IDs of the class sections this student is enrolled in.
    #[must_use]
    pub fn section_ids(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.id.clone()).collect()
    }
}

/// A class section record as the directory returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    pub id: String,
    pub name: String,
    pub coordination: Uuid,
    pub school_year: i32,
}

/// Payload for creating or replacing a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentPayload {
    pub name: String,
    pub enrollment_number: String,
    pub email: String,
}

/// Payload for creating a class section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPayload {
    pub name: String,
    pub grade: Uuid,
    pub coordination: Uuid,
    pub school_year: i32,
}

fn default_true() -> bool {
    true
}
