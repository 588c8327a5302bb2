//! Mirror table models.

pub mod section_mirror;
pub mod student_mirror;

pub use section_mirror::SectionMirror;
pub use student_mirror::StudentMirror;
