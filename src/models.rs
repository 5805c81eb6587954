//! Domain models that mirror the SQLite schema and get passed between the
//! facade and both front-ends. These types stay light-weight data holders: the
//! store owns durable state and every value here is a snapshot built for a
//! single call.
//!
//! Field names on the serde side follow the JSON files produced by earlier
//! versions of the school database so old exports load without conversion.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A registered student. The identifier is assigned on registration and never
/// changes afterwards; all other fields are editable through
/// [`PersonChanges`].
pub struct Student {
    #[serde(rename = "student_id")]
    id: String,
    pub name: String,
    pub age: u32,
    pub email: String,
    /// Courses the student is enrolled in, sorted by course id.
    #[serde(rename = "registered_course_ids", default)]
    pub course_ids: Vec<String>,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        age: u32,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            email: email.into(),
            course_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Student {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Student {}

impl Hash for Student {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// An instructor. Shares the person fields with [`Student`]; the course list
/// is derived from the instructor slot of each course rather than stored on
/// the instructor row.
pub struct Instructor {
    #[serde(rename = "instructor_id")]
    id: String,
    pub name: String,
    pub age: u32,
    pub email: String,
    /// Courses whose instructor slot points at this instructor.
    #[serde(rename = "assigned_course_ids", default)]
    pub course_ids: Vec<String>,
}

impl Instructor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        age: u32,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            email: email.into(),
            course_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Instructor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Instructor {}

impl Hash for Instructor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Instructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A course with a single optional instructor slot and any number of enrolled
/// students.
pub struct Course {
    #[serde(rename = "course_id")]
    id: String,
    #[serde(rename = "course_name")]
    pub title: String,
    #[serde(default)]
    pub instructor_id: Option<String>,
    /// Enrolled students, sorted by student id.
    #[serde(rename = "enrolled_student_ids", default)]
    pub student_ids: Vec<String>,
}

impl Course {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            instructor_id: None,
            student_ids: Vec::new(),
        }
    }

    /// Builder-style helper used when a course is created with an instructor
    /// already chosen.
    pub fn with_instructor(mut self, instructor_id: impl Into<String>) -> Self {
        self.instructor_id = Some(instructor_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Course {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Course {}

impl Hash for Course {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Course {
    /// `C1 - Algebra (Instructor: I1)`, omitting the suffix when the slot is
    /// empty. Lists in both front-ends rely on this formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.title)?;
        if let Some(instructor_id) = &self.instructor_id {
            write!(f, " (Instructor: {instructor_id})")?;
        }
        Ok(())
    }
}

/// Partial update for the person fields shared by students and instructors.
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonChanges {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
}

impl PersonChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.email.is_none()
    }
}

/// Partial update for a course. Instructor changes go through the dedicated
/// assign/unassign operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseChanges {
    pub title: Option<String>,
}

impl CourseChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }
}

/// Matches for a free-text search across every entity type.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub students: Vec<Student>,
    pub instructors: Vec<Instructor>,
    pub courses: Vec<Course>,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.students.len() + self.instructors.len() + self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_identifier() {
        let a = Student::new("S1", "Ana", 20, "ana@example.com");
        let b = Student::new("S1", "Bea", 31, "bea@example.com");
        let c = Student::new("S2", "Ana", 20, "ana@example.com");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn course_display_includes_instructor_when_assigned() {
        let course = Course::new("C1", "Algebra");
        assert_eq!(course.to_string(), "C1 - Algebra");
        let course = course.with_instructor("I1");
        assert_eq!(course.to_string(), "C1 - Algebra (Instructor: I1)");
    }

    #[test]
    fn serde_uses_legacy_field_names() {
        let json = serde_json::to_value(Course::new("C1", "Algebra")).unwrap();
        assert_eq!(json["course_id"], "C1");
        assert_eq!(json["course_name"], "Algebra");
        assert!(json["instructor_id"].is_null());

        let student: Student = serde_json::from_str(
            r#"{"student_id":"S1","name":"Ana","age":20,"email":"ana@example.com"}"#,
        )
        .unwrap();
        assert_eq!(student.id(), "S1");
        assert!(student.course_ids.is_empty());
    }
}
