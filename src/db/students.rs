use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{map_insert_error, require, TextFilter};
use crate::error::{EntityKind, Result, SchoolError};
use crate::models::{PersonChanges, Student};

pub(crate) fn student_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE student_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn require_student(conn: &Connection, id: &str) -> Result<()> {
    require(student_exists(conn, id)?, EntityKind::Student, id)
}

/// Insert a new student row and return it re-read from the store. Enrollments
/// listed on the input are ignored; they go through `enroll`.
pub fn create_student(conn: &Connection, student: &Student) -> Result<Student> {
    conn.execute(
        "INSERT INTO students (student_id, name, age, email) VALUES (?1, ?2, ?3, ?4)",
        params![
            student.id(),
            student.name.trim(),
            student.age,
            student.email.trim()
        ],
    )
    .map_err(|err| map_insert_error(err, EntityKind::Student, student.id()))?;

    fetch_student(conn, student.id())
}

/// Load one student together with the courses they are enrolled in.
pub fn fetch_student(conn: &Connection, id: &str) -> Result<Student> {
    let student = conn
        .query_row(
            "SELECT student_id, name, age, email FROM students WHERE student_id = ?1",
            [id],
            |row| {
                Ok(Student::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let mut student = student.ok_or_else(|| SchoolError::not_found(EntityKind::Student, id))?;
    student.course_ids = course_ids_for_student(conn, id)?;
    Ok(student)
}

/// Every student sorted by id, optionally narrowed to those whose id or name
/// contains `filter` (case-insensitive).
pub fn fetch_students(conn: &Connection, filter: Option<&str>) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, name, age, email
         FROM students
         ORDER BY student_id",
    )?;

    let mut students = stmt
        .query_map([], |row| {
            Ok(Student::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let filter = TextFilter::new(filter);
    students.retain(|record| filter.matches(&[record.id(), record.name.as_str()]));

    let mut enrollments = all_enrollments_by_student(conn)?;
    for student in &mut students {
        student.course_ids = enrollments.remove(student.id()).unwrap_or_default();
    }
    Ok(students)
}

/// Apply the present fields of `changes`. The id itself never changes.
pub fn update_student(conn: &Connection, id: &str, changes: &PersonChanges) -> Result<Student> {
    let updated = conn.execute(
        "UPDATE students
         SET name = COALESCE(?1, name),
             age = COALESCE(?2, age),
             email = COALESCE(?3, email)
         WHERE student_id = ?4",
        params![
            changes.name.as_deref().map(str::trim),
            changes.age,
            changes.email.as_deref().map(str::trim),
            id
        ],
    )?;

    if updated == 0 {
        return Err(SchoolError::not_found(EntityKind::Student, id));
    }
    fetch_student(conn, id)
}

/// Remove a student. The schema cascades to `registrations`, so enrollments
/// disappear with the row.
pub fn delete_student(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM students WHERE student_id = ?1", [id])?;

    if deleted == 0 {
        Err(SchoolError::not_found(EntityKind::Student, id))
    } else {
        Ok(())
    }
}

fn course_ids_for_student(conn: &Connection, id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT course_id FROM registrations WHERE student_id = ?1 ORDER BY course_id",
    )?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn all_enrollments_by_student(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>> {
    let mut stmt =
        conn.prepare("SELECT student_id, course_id FROM registrations ORDER BY course_id")?;
    let mut rows = stmt.query([])?;

    let mut by_student: BTreeMap<String, Vec<String>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let student_id: String = row.get(0)?;
        let course_id: String = row.get(1)?;
        by_student.entry(student_id).or_default().push(course_id);
    }
    Ok(by_student)
}
