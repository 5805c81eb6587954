use rusqlite::{params, Connection};

use super::courses::require_course;
use super::instructors::require_instructor;
use super::students::require_student;
use crate::error::{EntityKind, Result, SchoolError};

/// Link a student to a course. `INSERT OR IGNORE` makes repeated requests
/// idempotent; the returned flag tells whether a new link was created.
pub fn enroll(conn: &Connection, student_id: &str, course_id: &str) -> Result<bool> {
    require_student(conn, student_id)?;
    require_course(conn, course_id)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO registrations (student_id, course_id) VALUES (?1, ?2)",
        params![student_id, course_id],
    )?;
    Ok(inserted > 0)
}

/// Remove a student-course link, surfacing `NotFound` if it never existed.
pub fn unenroll(conn: &Connection, student_id: &str, course_id: &str) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM registrations WHERE student_id = ?1 AND course_id = ?2",
        params![student_id, course_id],
    )?;

    if deleted == 0 {
        Err(SchoolError::not_found(
            EntityKind::Enrollment,
            format!("{student_id} in {course_id}"),
        ))
    } else {
        Ok(())
    }
}

/// Overwrite the single instructor slot of a course. `None` clears it.
pub fn set_course_instructor(
    conn: &Connection,
    course_id: &str,
    instructor_id: Option<&str>,
) -> Result<()> {
    if let Some(instructor_id) = instructor_id {
        require_instructor(conn, instructor_id)?;
    }

    let updated = conn.execute(
        "UPDATE courses SET instructor_id = ?1 WHERE course_id = ?2",
        params![instructor_id, course_id],
    )?;

    if updated == 0 {
        Err(SchoolError::not_found(EntityKind::Course, course_id))
    } else {
        Ok(())
    }
}
