use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{map_insert_error, require, TextFilter};
use crate::error::{EntityKind, Result, SchoolError};
use crate::models::{Instructor, PersonChanges};

pub(crate) fn instructor_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM instructors WHERE instructor_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn require_instructor(conn: &Connection, id: &str) -> Result<()> {
    require(instructor_exists(conn, id)?, EntityKind::Instructor, id)
}

pub fn create_instructor(conn: &Connection, instructor: &Instructor) -> Result<Instructor> {
    conn.execute(
        "INSERT INTO instructors (instructor_id, name, age, email) VALUES (?1, ?2, ?3, ?4)",
        params![
            instructor.id(),
            instructor.name.trim(),
            instructor.age,
            instructor.email.trim()
        ],
    )
    .map_err(|err| map_insert_error(err, EntityKind::Instructor, instructor.id()))?;

    fetch_instructor(conn, instructor.id())
}

/// Load one instructor plus the courses whose slot points at them.
pub fn fetch_instructor(conn: &Connection, id: &str) -> Result<Instructor> {
    let instructor = conn
        .query_row(
            "SELECT instructor_id, name, age, email FROM instructors WHERE instructor_id = ?1",
            [id],
            |row| {
                Ok(Instructor::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let mut instructor =
        instructor.ok_or_else(|| SchoolError::not_found(EntityKind::Instructor, id))?;

    let mut stmt = conn
        .prepare("SELECT course_id FROM courses WHERE instructor_id = ?1 ORDER BY course_id")?;
    instructor.course_ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(instructor)
}

pub fn fetch_instructors(conn: &Connection, filter: Option<&str>) -> Result<Vec<Instructor>> {
    let mut stmt = conn.prepare(
        "SELECT instructor_id, name, age, email
         FROM instructors
         ORDER BY instructor_id",
    )?;

    let mut instructors = stmt
        .query_map([], |row| {
            Ok(Instructor::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let filter = TextFilter::new(filter);
    instructors.retain(|record| filter.matches(&[record.id(), record.name.as_str()]));

    let mut assignments = assignments_by_instructor(conn)?;
    for instructor in &mut instructors {
        instructor.course_ids = assignments.remove(instructor.id()).unwrap_or_default();
    }
    Ok(instructors)
}

pub fn update_instructor(
    conn: &Connection,
    id: &str,
    changes: &PersonChanges,
) -> Result<Instructor> {
    let updated = conn.execute(
        "UPDATE instructors
         SET name = COALESCE(?1, name),
             age = COALESCE(?2, age),
             email = COALESCE(?3, email)
         WHERE instructor_id = ?4",
        params![
            changes.name.as_deref().map(str::trim),
            changes.age,
            changes.email.as_deref().map(str::trim),
            id
        ],
    )?;

    if updated == 0 {
        return Err(SchoolError::not_found(EntityKind::Instructor, id));
    }
    fetch_instructor(conn, id)
}

/// Remove an instructor. Courses they taught keep existing with an empty
/// instructor slot (`ON DELETE SET NULL`).
pub fn delete_instructor(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM instructors WHERE instructor_id = ?1", [id])?;

    if deleted == 0 {
        Err(SchoolError::not_found(EntityKind::Instructor, id))
    } else {
        Ok(())
    }
}

fn assignments_by_instructor(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT instructor_id, course_id FROM courses
         WHERE instructor_id IS NOT NULL
         ORDER BY course_id",
    )?;
    let mut rows = stmt.query([])?;

    let mut by_instructor: BTreeMap<String, Vec<String>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let instructor_id: String = row.get(0)?;
        let course_id: String = row.get(1)?;
        by_instructor.entry(instructor_id).or_default().push(course_id);
    }
    Ok(by_instructor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_course, fetch_course, open_in_memory};
    use crate::models::Course;

    #[test]
    fn create_fetch_and_duplicate() {
        let conn = open_in_memory().unwrap();
        let ines = Instructor::new("I1", "Ines", 45, "ines@school.edu");
        create_instructor(&conn, &ines).unwrap();

        assert_eq!(fetch_instructor(&conn, "I1").unwrap().name, "Ines");
        assert!(matches!(
            create_instructor(&conn, &ines),
            Err(SchoolError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn course_list_follows_instructor_slot() {
        let conn = open_in_memory().unwrap();
        create_instructor(&conn, &Instructor::new("I1", "Ines", 45, "ines@school.edu")).unwrap();
        create_course(&conn, &Course::new("C2", "Biology").with_instructor("I1")).unwrap();
        create_course(&conn, &Course::new("C1", "Algebra").with_instructor("I1")).unwrap();

        assert_eq!(fetch_instructor(&conn, "I1").unwrap().course_ids, vec!["C1", "C2"]);
        let listed = fetch_instructors(&conn, Some("ines")).unwrap();
        assert_eq!(listed[0].course_ids, vec!["C1", "C2"]);
    }

    #[test]
    fn delete_clears_course_slot() {
        let conn = open_in_memory().unwrap();
        create_instructor(&conn, &Instructor::new("I1", "Ines", 45, "ines@school.edu")).unwrap();
        create_course(&conn, &Course::new("C1", "Algebra").with_instructor("I1")).unwrap();

        delete_instructor(&conn, "I1").unwrap();
        assert_eq!(fetch_course(&conn, "C1").unwrap().instructor_id, None);
        assert!(matches!(
            delete_instructor(&conn, "I1"),
            Err(SchoolError::NotFound { .. })
        ));
    }
}
