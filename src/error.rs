//! Error type shared by the persistence layer and the facade. Front-ends only
//! ever see these variants (usually wrapped in `anyhow` at the binary edge),
//! so each message is written to be shown to a user as-is.

use std::fmt;

use rusqlite::{Error as SqlError, ErrorCode};
use thiserror::Error;

use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, SchoolError>;

/// Which table an identifier belongs to. Carried by `NotFound` and
/// `DuplicateKey` so messages can name the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Instructor,
    Course,
    Enrollment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Student => "Student",
            EntityKind::Instructor => "Instructor",
            EntityKind::Course => "Course",
            EntityKind::Enrollment => "Enrollment",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum SchoolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} already exists.")]
    DuplicateKey { entity: EntityKind, id: String },

    #[error("{entity} {id} not found.")]
    NotFound { entity: EntityKind, id: String },

    #[error("Database is unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Database error: {0}")]
    Storage(SqlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SchoolError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        SchoolError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate(entity: EntityKind, id: impl Into<String>) -> Self {
        SchoolError::DuplicateKey {
            entity,
            id: id.into(),
        }
    }

    /// Busy and locked errors are the only ones the facade retries.
    pub fn is_busy(&self) -> bool {
        match self {
            SchoolError::StoreUnavailable { .. } => true,
            SchoolError::Storage(err) => is_busy_code(err),
            _ => false,
        }
    }
}

impl From<SqlError> for SchoolError {
    /// Busy/locked/unopenable databases become `StoreUnavailable`; everything
    /// else stays a raw storage error.
    fn from(err: SqlError) -> Self {
        if is_busy_code(&err)
            || matches!(err.sqlite_error_code(), Some(ErrorCode::CannotOpen))
        {
            SchoolError::StoreUnavailable {
                reason: err.to_string(),
            }
        } else {
            SchoolError::Storage(err)
        }
    }
}

fn is_busy_code(err: &SqlError) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> SqlError {
        SqlError::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn busy_errors_map_to_store_unavailable() {
        let err = SchoolError::from(sqlite_failure(ffi::SQLITE_BUSY));
        assert!(matches!(err, SchoolError::StoreUnavailable { .. }));
        assert!(err.is_busy());

        let err = SchoolError::from(sqlite_failure(ffi::SQLITE_LOCKED));
        assert!(err.is_busy());
    }

    #[test]
    fn other_errors_stay_storage_errors() {
        let err = SchoolError::from(sqlite_failure(ffi::SQLITE_CONSTRAINT));
        assert!(matches!(err, SchoolError::Storage(_)));
        assert!(!err.is_busy());
    }

    #[test]
    fn messages_name_the_entity() {
        let err = SchoolError::not_found(EntityKind::Course, "C9");
        assert_eq!(err.to_string(), "Course C9 not found.");
        let err = SchoolError::duplicate(EntityKind::Student, "S1");
        assert_eq!(err.to_string(), "Student S1 already exists.");
    }
}
