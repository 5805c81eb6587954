use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::instructors::require_instructor;
use super::{map_insert_error, require, TextFilter};
use crate::error::{EntityKind, Result, SchoolError};
use crate::models::{Course, CourseChanges};

pub(crate) fn course_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM courses WHERE course_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn require_course(conn: &Connection, id: &str) -> Result<()> {
    require(course_exists(conn, id)?, EntityKind::Course, id)
}

/// Insert a course. When an instructor is named up front it must already
/// exist; we check first so the caller gets `NotFound` instead of a raw
/// foreign-key failure.
pub fn create_course(conn: &Connection, course: &Course) -> Result<Course> {
    if let Some(instructor_id) = &course.instructor_id {
        require_instructor(conn, instructor_id)?;
    }

    conn.execute(
        "INSERT INTO courses (course_id, course_name, instructor_id) VALUES (?1, ?2, ?3)",
        params![course.id(), course.title.trim(), course.instructor_id],
    )
    .map_err(|err| map_insert_error(err, EntityKind::Course, course.id()))?;

    fetch_course(conn, course.id())
}

pub fn fetch_course(conn: &Connection, id: &str) -> Result<Course> {
    let course = conn
        .query_row(
            "SELECT course_id, course_name, instructor_id FROM courses WHERE course_id = ?1",
            [id],
            |row| {
                let mut course = Course::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
                course.instructor_id = row.get(2)?;
                Ok(course)
            },
        )
        .optional()?;

    let mut course = course.ok_or_else(|| SchoolError::not_found(EntityKind::Course, id))?;

    let mut stmt = conn.prepare(
        "SELECT student_id FROM registrations WHERE course_id = ?1 ORDER BY student_id",
    )?;
    course.student_ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(course)
}

/// Courses sorted by id; `filter` matches the id or the title.
pub fn fetch_courses(conn: &Connection, filter: Option<&str>) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT course_id, course_name, instructor_id
         FROM courses
         ORDER BY course_id",
    )?;

    let mut courses = stmt
        .query_map([], |row| {
            let mut course = Course::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
            course.instructor_id = row.get(2)?;
            Ok(course)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let filter = TextFilter::new(filter);
    courses.retain(|record| filter.matches(&[record.id(), record.title.as_str()]));

    let mut rosters = rosters_by_course(conn)?;
    for course in &mut courses {
        course.student_ids = rosters.remove(course.id()).unwrap_or_default();
    }
    Ok(courses)
}

pub fn update_course(conn: &Connection, id: &str, changes: &CourseChanges) -> Result<Course> {
    let updated = conn.execute(
        "UPDATE courses SET course_name = COALESCE(?1, course_name) WHERE course_id = ?2",
        params![changes.title.as_deref().map(str::trim), id],
    )?;

    if updated == 0 {
        return Err(SchoolError::not_found(EntityKind::Course, id));
    }
    fetch_course(conn, id)
}

/// Remove a course along with its enrollments (cascade).
pub fn delete_course(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM courses WHERE course_id = ?1", [id])?;

    if deleted == 0 {
        Err(SchoolError::not_found(EntityKind::Course, id))
    } else {
        Ok(())
    }
}

fn rosters_by_course(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>> {
    let mut stmt =
        conn.prepare("SELECT course_id, student_id FROM registrations ORDER BY student_id")?;
    let mut rows = stmt.query([])?;

    let mut by_course: BTreeMap<String, Vec<String>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let course_id: String = row.get(0)?;
        let student_id: String = row.get(1)?;
        by_course.entry(course_id).or_default().push(student_id);
    }
    Ok(by_course)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_student, enroll, fetch_student, open_in_memory};
    use crate::models::Student;

    #[test]
    fn create_with_unknown_instructor_is_not_found() {
        let conn = open_in_memory().unwrap();
        let err = create_course(&conn, &Course::new("C1", "Algebra").with_instructor("I9"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchoolError::NotFound {
                entity: EntityKind::Instructor,
                ..
            }
        ));
        assert!(fetch_courses(&conn, None).unwrap().is_empty());
    }

    #[test]
    fn update_title() {
        let conn = open_in_memory().unwrap();
        create_course(&conn, &Course::new("C1", "Algebra")).unwrap();
        let changes = CourseChanges {
            title: Some("  Linear Algebra ".into()),
        };
        assert_eq!(
            update_course(&conn, "C1", &changes).unwrap().title,
            "Linear Algebra"
        );
    }

    #[test]
    fn delete_cascades_to_enrollments() {
        let conn = open_in_memory().unwrap();
        create_course(&conn, &Course::new("C1", "Algebra")).unwrap();
        create_student(&conn, &Student::new("S1", "Ana", 20, "ana@example.com")).unwrap();
        enroll(&conn, "S1", "C1").unwrap();
        assert_eq!(fetch_course(&conn, "C1").unwrap().student_ids, vec!["S1"]);

        delete_course(&conn, "C1").unwrap();
        assert!(fetch_student(&conn, "S1").unwrap().course_ids.is_empty());
        assert!(matches!(
            fetch_course(&conn, "C1"),
            Err(SchoolError::NotFound { .. })
        ));
    }

    #[test]
    fn list_matches_title() {
        let conn = open_in_memory().unwrap();
        create_course(&conn, &Course::new("C1", "Algebra")).unwrap();
        create_course(&conn, &Course::new("C2", "Biology")).unwrap();
        let found = fetch_courses(&conn, Some("bio")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "C2");
    }
}
