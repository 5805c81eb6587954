//! Bulk data movement: whole-store JSON snapshots, CSV exports and file
//! backups. The JSON layout is the one earlier releases wrote, so existing
//! export files can be imported directly.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    create_course, create_instructor, create_student, fetch_courses, fetch_instructors,
    fetch_students,
};
use crate::error::Result;
use crate::models::{Course, Instructor, Student};

/// Everything in the store at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub instructors: Vec<Instructor>,
    pub courses: Vec<Course>,
}

/// Record counts reported after an import or export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub students: usize,
    pub instructors: usize,
    pub courses: usize,
    pub enrollments: usize,
}

pub fn snapshot(conn: &Connection) -> Result<Snapshot> {
    Ok(Snapshot {
        students: fetch_students(conn, None)?,
        instructors: fetch_instructors(conn, None)?,
        courses: fetch_courses(conn, None)?,
    })
}

impl Snapshot {
    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            students: self.students.len(),
            instructors: self.instructors.len(),
            courses: self.courses.len(),
            enrollments: self.courses.iter().map(|c| c.student_ids.len()).sum(),
        }
    }
}

/// Replace the whole store with `snapshot`. Must run inside a transaction so a
/// failure halfway leaves the previous content intact.
///
/// Dangling references, common in older export files, are dropped: a course
/// naming an unknown instructor gets an empty slot, and enrollments naming an
/// unknown student or course are skipped. Enrollments may be listed on either
/// side (course rosters or student course lists); both are merged.
pub fn replace_all(conn: &Connection, snapshot: &Snapshot) -> Result<TransferSummary> {
    conn.execute("DELETE FROM registrations", [])?;
    conn.execute("DELETE FROM courses", [])?;
    conn.execute("DELETE FROM students", [])?;
    conn.execute("DELETE FROM instructors", [])?;

    for student in &snapshot.students {
        create_student(conn, student)?;
    }
    for instructor in &snapshot.instructors {
        create_instructor(conn, instructor)?;
    }

    let instructor_ids: HashSet<&str> = snapshot.instructors.iter().map(|i| i.id()).collect();
    for course in &snapshot.courses {
        let mut course = course.clone();
        if let Some(instructor_id) = &course.instructor_id {
            if !instructor_ids.contains(instructor_id.as_str()) {
                debug!(course = course.id(), instructor_id = %instructor_id, "dropping unknown instructor");
                course.instructor_id = None;
            }
        }
        create_course(conn, &course)?;
    }

    let student_ids: HashSet<&str> = snapshot.students.iter().map(|s| s.id()).collect();
    let course_ids: HashSet<&str> = snapshot.courses.iter().map(|c| c.id()).collect();
    let pairs = snapshot
        .courses
        .iter()
        .flat_map(|c| c.student_ids.iter().map(move |s| (s.as_str(), c.id())))
        .chain(
            snapshot
                .students
                .iter()
                .flat_map(|s| s.course_ids.iter().map(move |c| (s.id(), c.as_str()))),
        );

    let mut enrollments = 0;
    for (student_id, course_id) in pairs {
        if !student_ids.contains(student_id) || !course_ids.contains(course_id) {
            debug!(student_id, course_id, "skipping dangling enrollment");
            continue;
        }
        enrollments += conn.execute(
            "INSERT OR IGNORE INTO registrations (student_id, course_id) VALUES (?1, ?2)",
            params![student_id, course_id],
        )?;
    }

    Ok(TransferSummary {
        students: snapshot.students.len(),
        instructors: snapshot.instructors.len(),
        courses: snapshot.courses.len(),
        enrollments,
    })
}

#[derive(Serialize)]
struct PersonRow<'a> {
    id: &'a str,
    name: &'a str,
    age: u32,
    email: &'a str,
}

#[derive(Serialize)]
struct CourseRow<'a> {
    course_id: &'a str,
    course_name: &'a str,
    instructor_id: Option<&'a str>,
}

#[derive(Serialize)]
struct EnrollmentRow<'a> {
    student_id: &'a str,
    course_id: &'a str,
}

/// Write one CSV per table into `dir`: `<prefix>_students.csv`,
/// `<prefix>_instructors.csv`, `<prefix>_courses.csv` and
/// `<prefix>_enrollments.csv`. Returns the created paths in that order.
pub fn export_csv(conn: &Connection, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let snapshot = snapshot(conn)?;
    let path_for = |table: &str| dir.join(format!("{prefix}_{table}.csv"));

    let students_path = path_for("students");
    write_table(
        &students_path,
        &["id", "name", "age", "email"],
        snapshot.students.iter().map(|s| PersonRow {
            id: s.id(),
            name: &s.name,
            age: s.age,
            email: &s.email,
        }),
    )?;

    let instructors_path = path_for("instructors");
    write_table(
        &instructors_path,
        &["id", "name", "age", "email"],
        snapshot.instructors.iter().map(|i| PersonRow {
            id: i.id(),
            name: &i.name,
            age: i.age,
            email: &i.email,
        }),
    )?;

    let courses_path = path_for("courses");
    write_table(
        &courses_path,
        &["course_id", "course_name", "instructor_id"],
        snapshot.courses.iter().map(|c| CourseRow {
            course_id: c.id(),
            course_name: &c.title,
            instructor_id: c.instructor_id.as_deref(),
        }),
    )?;

    let enrollments_path = path_for("enrollments");
    write_table(
        &enrollments_path,
        &["student_id", "course_id"],
        snapshot.courses.iter().flat_map(|c| {
            c.student_ids.iter().map(move |student_id| EnrollmentRow {
                student_id,
                course_id: c.id(),
            })
        }),
    )?;

    Ok(vec![
        students_path,
        instructors_path,
        courses_path,
        enrollments_path,
    ])
}

/// Headers are written by hand so empty tables still get a header row.
fn write_table<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a consistent copy of the database to `dest` with `VACUUM INTO`.
/// The copy is staged next to `dest` and renamed over it, so an existing
/// backup is only replaced once the new one is complete. Cannot run inside a
/// transaction.
pub fn backup_to(conn: &Connection, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = staging_path(dest);
    if staging.exists() {
        fs::remove_file(&staging)?;
    }
    if let Err(err) = conn.execute("VACUUM INTO ?1", [staging.to_string_lossy()]) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }
    fs::rename(&staging, dest)?;
    debug!(dest = %dest.display(), "backup written");
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());
    dest.with_file_name(format!(".{name}.partial"))
}
