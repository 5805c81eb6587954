//! Persistence module split across logical submodules. Every function takes a
//! plain `&Connection`, so callers can pass either a connection or an open
//! transaction; the facade always does the latter.

mod connection;
mod courses;
mod enrollments;
mod instructors;
mod students;
mod transfer;

use rusqlite::{ffi, Error as SqlError};

use crate::error::{EntityKind, SchoolError};

pub use connection::{ensure_schema, open_in_memory, open_store};
pub use courses::{create_course, delete_course, fetch_course, fetch_courses, update_course};
pub use enrollments::{enroll, set_course_instructor, unenroll};
pub use instructors::{
    create_instructor, delete_instructor, fetch_instructor, fetch_instructors, update_instructor,
};
pub use students::{create_student, delete_student, fetch_student, fetch_students, update_student};
pub use transfer::{backup_to, export_csv, replace_all, snapshot, Snapshot, TransferSummary};

/// Lower-cased needle for free-text filters, `None` when blank. Matching is
/// done in Rust because SQLite's `LIKE` only folds ASCII case.
pub(crate) struct TextFilter(Option<String>);

impl TextFilter {
    pub(crate) fn new(filter: Option<&str>) -> Self {
        let needle = filter
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);
        Self(needle)
    }

    /// True when no filter is set or any field contains the needle,
    /// ignoring case.
    pub(crate) fn matches(&self, fields: &[&str]) -> bool {
        match &self.0 {
            None => true,
            Some(needle) => fields
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Coerce primary-key collisions into `DuplicateKey`. Foreign-key and check
/// violations fall through untouched so they are not misreported.
pub(crate) fn map_insert_error(err: SqlError, entity: EntityKind, id: &str) -> SchoolError {
    if let SqlError::SqliteFailure(failure, _) = &err {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            return SchoolError::duplicate(entity, id);
        }
    }
    err.into()
}

/// Fail with `NotFound` unless the row exists. Each entity module provides
/// its own `*_exists` check to pair with this.
pub(crate) fn require(exists: bool, entity: EntityKind, id: &str) -> crate::Result<()> {
    if exists {
        Ok(())
    } else {
        Err(SchoolError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_filter_ignores_case_beyond_ascii() {
        assert!(TextFilter::new(None).matches(&["anything"]));
        assert!(TextFilter::new(Some("  ")).matches(&["anything"]));

        let filter = TextFilter::new(Some("ángela"));
        assert!(filter.matches(&["S7", "Ángela Ruiz"]));
        assert!(TextFilter::new(Some("ÁNGELA")).matches(&["S7", "ángela ruiz"]));
        assert!(!filter.matches(&["S1", "Angela"]));

        // Wildcard characters are plain text.
        assert!(!TextFilter::new(Some("50%")).matches(&["C1", "5000 words"]));
        assert!(TextFilter::new(Some("50%")).matches(&["C1", "50% off"]));
    }
}
