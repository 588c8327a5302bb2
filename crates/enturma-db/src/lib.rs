//! Local mirror of the remote student directory.
//!
//! The mirror is a relational cache of the directory's last known state
//! (students and class sections), refreshed once per reconciliation run
//! and updated in place as remote operations succeed.  It exists so the
//! engine never has to re-query the directory to learn the effect of its
//! own writes.

pub mod batch;
pub mod error;
pub mod mirror;
pub mod models;

pub use batch::{BatchPersister, BatchReport, BatchSettings};
pub use error::DbError;
pub use mirror::{MirrorIndex, MirroredStudent};
pub use models::{SectionMirror, StudentMirror};
