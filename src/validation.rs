//! Field validators run before anything is written. Every check is a pure
//! function of its input and the active [`ValidationRules`]; failures carry a
//! message that front-ends display verbatim.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Course, CourseChanges, Instructor, PersonChanges, Student};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// A rejected field value together with the reason it was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Limits applied by the validators. Loaded from the `[validation]` table of
/// the config file so deployments with legacy data can loosen them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub max_identifier_len: usize,
    pub max_name_len: usize,
    pub max_age: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_identifier_len: 32,
            max_name_len: 100,
            max_age: 150,
        }
    }
}

impl ValidationRules {
    /// Identifiers are short ASCII tokens (`S1`, `math-101`) so they can be
    /// typed on a command line and used in CSV exports unquoted.
    pub fn identifier(&self, field: &str, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "identifier must be non-empty"));
        }
        if value.chars().count() > self.max_identifier_len {
            return Err(ValidationError::new(
                field,
                format!(
                    "identifier must be at most {} characters",
                    self.max_identifier_len
                ),
            ));
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(ValidationError::new(
                field,
                "identifier may only contain letters, digits, '-' or '_'",
            ));
        }
        Ok(())
    }

    /// Used for person names and course titles alike.
    pub fn name(&self, field: &str, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(field, format!("{field} must be non-empty")));
        }
        if trimmed.chars().count() > self.max_name_len {
            return Err(ValidationError::new(
                field,
                format!("{field} must be at most {} characters", self.max_name_len),
            ));
        }
        Ok(())
    }

    pub fn age(&self, value: u32) -> ValidationResult {
        if value > self.max_age {
            return Err(ValidationError::new(
                "age",
                format!("age must be between 0 and {}", self.max_age),
            ));
        }
        Ok(())
    }

    /// Parse a raw age from a form or command line, then range-check it.
    pub fn parse_age(&self, raw: &str) -> std::result::Result<u32, ValidationError> {
        let trimmed = raw.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| ValidationError::new("age", "age must be an integer"))?;
        if value < 0 {
            return Err(ValidationError::new("age", "age must be non-negative"));
        }
        let value = u32::try_from(value).map_err(|_| {
            ValidationError::new("age", format!("age must be between 0 and {}", self.max_age))
        })?;
        self.age(value)?;
        Ok(value)
    }

    pub fn email(&self, value: &str) -> ValidationResult {
        if email_regex().is_match(value.trim()) {
            Ok(())
        } else {
            Err(ValidationError::new("email", "invalid email format"))
        }
    }

    pub fn student(&self, student: &Student) -> ValidationResult {
        self.identifier("student id", student.id())?;
        self.person(&student.name, student.age, &student.email)
    }

    pub fn instructor(&self, instructor: &Instructor) -> ValidationResult {
        self.identifier("instructor id", instructor.id())?;
        self.person(&instructor.name, instructor.age, &instructor.email)
    }

    pub fn course(&self, course: &Course) -> ValidationResult {
        self.identifier("course id", course.id())?;
        self.name("title", &course.title)?;
        if let Some(instructor_id) = &course.instructor_id {
            self.identifier("instructor id", instructor_id)?;
        }
        Ok(())
    }

    /// Only the fields present in the change set are checked.
    pub fn person_changes(&self, changes: &PersonChanges) -> ValidationResult {
        if let Some(name) = &changes.name {
            self.name("name", name)?;
        }
        if let Some(age) = changes.age {
            self.age(age)?;
        }
        if let Some(email) = &changes.email {
            self.email(email)?;
        }
        Ok(())
    }

    pub fn course_changes(&self, changes: &CourseChanges) -> ValidationResult {
        if let Some(title) = &changes.title {
            self.name("title", title)?;
        }
        Ok(())
    }

    fn person(&self, name: &str, age: u32, email: &str) -> ValidationResult {
        self.name("name", name)?;
        self.age(age)?;
        self.email(email)
    }
}
