//! The single API surface both front-ends call. Every task-level operation
//! validates its input first, then runs its persistence calls inside one
//! SQLite transaction that commits only on success, so a rejected request
//! never leaves anything written.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::db::{self, Snapshot, TransferSummary};
use crate::error::Result;
use crate::models::{
    Course, CourseChanges, Instructor, PersonChanges, SearchResults, Student,
};
use crate::validation::{ValidationError, ValidationRules};

/// Handle to an open school database. Opened once at process start; dropping
/// it closes the connection.
pub struct School {
    conn: Connection,
    rules: ValidationRules,
    retry_delay: Duration,
    db_path: Option<PathBuf>,
}

impl School {
    /// Open (or create) the database the configuration points at.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let path = config.resolve_db_path()?;
        let conn = db::open_store(&path, config.busy_timeout())?;
        info!(path = %path.display(), "school database ready");
        Ok(Self {
            conn,
            rules: config.validation,
            retry_delay: config.retry_delay(),
            db_path: Some(path),
        })
    }

    /// Throwaway in-memory school, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let config = AppConfig::default();
        Ok(Self {
            conn: db::open_in_memory()?,
            rules: config.validation,
            retry_delay: config.retry_delay(),
            db_path: None,
        })
    }

    /// File backing this school, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Rules applied to every write; front-ends reuse them to parse form input.
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    // --- students -------------------------------------------------------

    pub fn register_student(&mut self, student: Student) -> Result<Student> {
        self.rules.student(&student)?;
        let created = self.write("register_student", |conn| db::create_student(conn, &student))?;
        info!(student_id = created.id(), "registered student");
        Ok(created)
    }

    pub fn update_student(&mut self, id: &str, changes: PersonChanges) -> Result<Student> {
        self.rules.person_changes(&changes)?;
        let updated = self.write("update_student", |conn| db::update_student(conn, id, &changes))?;
        info!(student_id = id, "updated student");
        Ok(updated)
    }

    /// Delete a student and all of their enrollments.
    pub fn withdraw_student(&mut self, id: &str) -> Result<()> {
        self.write("withdraw_student", |conn| db::delete_student(conn, id))?;
        info!(student_id = id, "withdrew student");
        Ok(())
    }

    pub fn student(&mut self, id: &str) -> Result<Student> {
        self.read("student", |conn| db::fetch_student(conn, id))
    }

    pub fn students(&mut self, filter: Option<&str>) -> Result<Vec<Student>> {
        self.read("students", |conn| db::fetch_students(conn, filter))
    }

    // --- instructors ----------------------------------------------------

    pub fn add_instructor(&mut self, instructor: Instructor) -> Result<Instructor> {
        self.rules.instructor(&instructor)?;
        let created = self.write("add_instructor", |conn| {
            db::create_instructor(conn, &instructor)
        })?;
        info!(instructor_id = created.id(), "added instructor");
        Ok(created)
    }

    pub fn update_instructor(&mut self, id: &str, changes: PersonChanges) -> Result<Instructor> {
        self.rules.person_changes(&changes)?;
        let updated = self.write("update_instructor", |conn| {
            db::update_instructor(conn, id, &changes)
        })?;
        info!(instructor_id = id, "updated instructor");
        Ok(updated)
    }

    /// Delete an instructor; their courses stay, with an empty instructor slot.
    pub fn remove_instructor(&mut self, id: &str) -> Result<()> {
        self.write("remove_instructor", |conn| db::delete_instructor(conn, id))?;
        info!(instructor_id = id, "removed instructor");
        Ok(())
    }

    pub fn instructor(&mut self, id: &str) -> Result<Instructor> {
        self.read("instructor", |conn| db::fetch_instructor(conn, id))
    }

    pub fn instructors(&mut self, filter: Option<&str>) -> Result<Vec<Instructor>> {
        self.read("instructors", |conn| db::fetch_instructors(conn, filter))
    }

    // --- courses --------------------------------------------------------

    pub fn add_course(&mut self, course: Course) -> Result<Course> {
        self.rules.course(&course)?;
        let created = self.write("add_course", |conn| db::create_course(conn, &course))?;
        info!(course_id = created.id(), "added course");
        Ok(created)
    }

    pub fn update_course(&mut self, id: &str, changes: CourseChanges) -> Result<Course> {
        self.rules.course_changes(&changes)?;
        let updated = self.write("update_course", |conn| db::update_course(conn, id, &changes))?;
        info!(course_id = id, "updated course");
        Ok(updated)
    }

    /// Delete a course and every enrollment in it.
    pub fn remove_course(&mut self, id: &str) -> Result<()> {
        self.write("remove_course", |conn| db::delete_course(conn, id))?;
        info!(course_id = id, "removed course");
        Ok(())
    }

    pub fn course(&mut self, id: &str) -> Result<Course> {
        self.read("course", |conn| db::fetch_course(conn, id))
    }

    pub fn courses(&mut self, filter: Option<&str>) -> Result<Vec<Course>> {
        self.read("courses", |conn| db::fetch_courses(conn, filter))
    }

    // --- relations ------------------------------------------------------

    /// Enroll a student in a course. Enrolling twice is not an error; the
    /// returned course shows the (single) enrollment either way.
    pub fn enroll_student(&mut self, student_id: &str, course_id: &str) -> Result<Course> {
        self.rules.identifier("student id", student_id)?;
        self.rules.identifier("course id", course_id)?;
        let (created, course) = self.write("enroll_student", |conn| {
            let created = db::enroll(conn, student_id, course_id)?;
            Ok((created, db::fetch_course(conn, course_id)?))
        })?;
        if created {
            info!(student_id, course_id, "enrolled student");
        } else {
            debug!(student_id, course_id, "student already enrolled");
        }
        Ok(course)
    }

    pub fn unenroll_student(&mut self, student_id: &str, course_id: &str) -> Result<Course> {
        let course = self.write("unenroll_student", |conn| {
            db::unenroll(conn, student_id, course_id)?;
            db::fetch_course(conn, course_id)
        })?;
        info!(student_id, course_id, "unenrolled student");
        Ok(course)
    }

    /// Put an instructor in the course's single slot, replacing whoever held
    /// it before.
    pub fn assign_instructor(&mut self, instructor_id: &str, course_id: &str) -> Result<Course> {
        self.rules.identifier("instructor id", instructor_id)?;
        self.rules.identifier("course id", course_id)?;
        let course = self.write("assign_instructor", |conn| {
            db::set_course_instructor(conn, course_id, Some(instructor_id))?;
            db::fetch_course(conn, course_id)
        })?;
        info!(instructor_id, course_id, "assigned instructor");
        Ok(course)
    }

    pub fn unassign_instructor(&mut self, course_id: &str) -> Result<Course> {
        let course = self.write("unassign_instructor", |conn| {
            db::set_course_instructor(conn, course_id, None)?;
            db::fetch_course(conn, course_id)
        })?;
        info!(course_id, "cleared instructor");
        Ok(course)
    }

    /// Case-insensitive substring search over ids and names of every entity.
    pub fn search(&mut self, text: &str) -> Result<SearchResults> {
        let filter = Some(text);
        self.read("search", |conn| {
            Ok(SearchResults {
                students: db::fetch_students(conn, filter)?,
                instructors: db::fetch_instructors(conn, filter)?,
                courses: db::fetch_courses(conn, filter)?,
            })
        })
    }

    // --- data transfer --------------------------------------------------

    pub fn snapshot(&mut self) -> Result<Snapshot> {
        self.read("snapshot", db::snapshot)
    }

    /// Write the whole store as pretty-printed JSON.
    pub fn export_json(&mut self, path: &Path) -> Result<TransferSummary> {
        let snapshot = self.snapshot()?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        info!(path = %path.display(), "exported JSON");
        Ok(snapshot.summary())
    }

    /// Replace the entire store with the contents of a JSON export. Every
    /// record is validated before anything is deleted.
    pub fn import_json(&mut self, path: &Path) -> Result<TransferSummary> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        self.import_snapshot(&snapshot)
    }

    pub fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<TransferSummary> {
        for student in &snapshot.students {
            self.rules.student(student)?;
        }
        for instructor in &snapshot.instructors {
            self.rules.instructor(instructor)?;
        }
        for course in &snapshot.courses {
            self.rules.course(course)?;
        }
        let summary = self.write("import_snapshot", |conn| db::replace_all(conn, snapshot))?;
        info!(?summary, "imported snapshot");
        Ok(summary)
    }

    pub fn export_csv(&mut self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let paths = self.read("export_csv", |conn| db::export_csv(conn, dir, prefix))?;
        info!(dir = %dir.display(), files = paths.len(), "exported CSV");
        Ok(paths)
    }

    /// Copy the database to `dest`. Writing over the open database file
    /// itself is refused.
    pub fn backup(&mut self, dest: &Path) -> Result<()> {
        if self.is_live_file(dest) {
            let err = ValidationError::new("backup path", "cannot overwrite the open database");
            return Err(err.into());
        }
        self.with_retry("backup", |conn| db::backup_to(conn, dest))?;
        info!(dest = %dest.display(), "database backed up");
        Ok(())
    }

    fn is_live_file(&self, path: &Path) -> bool {
        let Some(live) = &self.db_path else {
            return false;
        };
        match (live.canonicalize(), path.canonicalize()) {
            (Ok(live), Ok(path)) => live == path,
            _ => false,
        }
    }

    // --- transaction plumbing -------------------------------------------

    /// Writes take the write lock up front (`BEGIN IMMEDIATE`) so a busy
    /// store is detected before any statement runs.
    fn write<T>(&mut self, op: &str, f: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        self.in_transaction(op, TransactionBehavior::Immediate, f)
    }

    fn read<T>(&mut self, op: &str, f: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        self.in_transaction(op, TransactionBehavior::Deferred, f)
    }

    fn in_transaction<T>(
        &mut self,
        op: &str,
        behavior: TransactionBehavior,
        mut f: impl FnMut(&Connection) -> Result<T>,
    ) -> Result<T> {
        self.with_retry(op, |conn| {
            let tx = conn.transaction_with_behavior(behavior)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run `attempt`, and if the store reports busy/locked, wait once and run
    /// it again. A second busy failure is returned to the caller.
    fn with_retry<T>(
        &mut self,
        op: &str,
        mut attempt: impl FnMut(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        match attempt(&mut self.conn) {
            Err(err) if err.is_busy() => {
                warn!(op, error = %err, "database busy, retrying once");
                thread::sleep(self.retry_delay);
                attempt(&mut self.conn)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EntityKind, SchoolError};

    fn school() -> School {
        School::open_in_memory().unwrap()
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let mut school = school();
        let err = school
            .register_student(Student::new("S1", "", 20, "ana@example.com"))
            .unwrap_err();
        match err {
            SchoolError::Validation(v) => assert_eq!(v.reason, "name must be non-empty"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(school.students(None).unwrap().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_first_record() {
        let mut school = school();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        let err = school
            .register_student(Student::new("S1", "Bea", 22, "bea@example.com"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchoolError::DuplicateKey {
                entity: EntityKind::Student,
                ..
            }
        ));
        assert_eq!(school.student("S1").unwrap().name, "Ana");
    }

    #[test]
    fn reassigning_instructor_overwrites_slot() {
        let mut school = school();
        school
            .add_instructor(Instructor::new("I1", "Ines", 45, "ines@school.edu"))
            .unwrap();
        school
            .add_instructor(Instructor::new("I2", "Igor", 50, "igor@school.edu"))
            .unwrap();
        school.add_course(Course::new("C1", "Algebra")).unwrap();

        school.assign_instructor("I1", "C1").unwrap();
        let course = school.assign_instructor("I2", "C1").unwrap();
        assert_eq!(course.instructor_id.as_deref(), Some("I2"));
        assert!(school.instructor("I1").unwrap().course_ids.is_empty());
        assert_eq!(school.instructor("I2").unwrap().course_ids, vec!["C1"]);
    }

    #[test]
    fn double_enrollment_yields_one_link() {
        let mut school = school();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        school.add_course(Course::new("C1", "Algebra")).unwrap();

        school.enroll_student("S1", "C1").unwrap();
        let course = school.enroll_student("S1", "C1").unwrap();
        assert_eq!(course.student_ids, vec!["S1"]);
    }

    #[test]
    fn failed_step_rolls_back_whole_operation() {
        let mut school = school();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        school.add_course(Course::new("C1", "Algebra")).unwrap();
        school.enroll_student("S1", "C1").unwrap();

        let snapshot = Snapshot {
            students: vec![
                Student::new("S2", "Bea", 22, "bea@example.com"),
                Student::new("S2", "Bea again", 22, "bea@example.com"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            school.import_snapshot(&snapshot),
            Err(SchoolError::DuplicateKey { .. })
        ));
        assert_eq!(school.course("C1").unwrap().student_ids, vec!["S1"]);
    }

    #[test]
    fn invalid_import_is_rejected_before_deleting() {
        let mut school = school();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        let snapshot = Snapshot {
            students: vec![Student::new("S2", "Bea", 22, "not-an-email")],
            ..Default::default()
        };
        assert!(matches!(
            school.import_snapshot(&snapshot),
            Err(SchoolError::Validation(_))
        ));
        assert_eq!(school.students(None).unwrap().len(), 1);
    }

    #[test]
    fn search_spans_all_entities() {
        let mut school = school();
        school
            .register_student(Student::new("S1", "Alma", 20, "alma@example.com"))
            .unwrap();
        school
            .add_instructor(Instructor::new("I1", "Malcolm", 45, "mal@school.edu"))
            .unwrap();
        school.add_course(Course::new("C1", "Algebra")).unwrap();
        school.add_course(Course::new("C2", "Biology")).unwrap();

        let results = school.search("al").unwrap();
        assert_eq!(results.students.len(), 1);
        assert_eq!(results.instructors.len(), 1);
        assert_eq!(results.courses.len(), 1);
        assert_eq!(results.total(), 3);
    }
}
