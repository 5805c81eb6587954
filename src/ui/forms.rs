use std::path::{Path, PathBuf};

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Course, CourseChanges, Instructor, PersonChanges, Student};
use crate::validation::{ValidationError, ValidationRules};

/// Which record a form edits. Also decides the field layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FormKind {
    Student,
    Instructor,
    Course,
}

impl FormKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            FormKind::Student => "Student",
            FormKind::Instructor => "Instructor",
            FormKind::Course => "Course",
        }
    }
}

/// A single text input inside a modal form.
#[derive(Clone, Debug)]
pub(crate) struct FormField {
    pub(crate) label: &'static str,
    pub(crate) value: String,
    pub(crate) required: bool,
    /// Locked fields are shown but cannot be focused (the id while editing).
    pub(crate) locked: bool,
    pub(crate) digits_only: bool,
}

impl FormField {
    fn text(label: &'static str, required: bool) -> Self {
        Self {
            label,
            value: String::new(),
            required,
            locked: false,
            digits_only: false,
        }
    }

    fn digits(label: &'static str) -> Self {
        Self {
            digits_only: true,
            ..Self::text(label, true)
        }
    }
}

/// Form state for creating or editing any of the three record types.
#[derive(Clone, Debug)]
pub(crate) struct RecordForm {
    pub(crate) kind: FormKind,
    pub(crate) fields: Vec<FormField>,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

const ID: usize = 0;
const NAME: usize = 1;
const AGE: usize = 2;
const EMAIL: usize = 3;

impl RecordForm {
    /// Empty form for a new record.
    pub(crate) fn new(kind: FormKind) -> Self {
        let fields = match kind {
            FormKind::Student | FormKind::Instructor => vec![
                FormField::text("ID", true),
                FormField::text("Name", true),
                FormField::digits("Age"),
                FormField::text("Email", true),
            ],
            FormKind::Course => vec![FormField::text("ID", true), FormField::text("Title", true)],
        };
        Self {
            kind,
            fields,
            active: ID,
            error: None,
        }
    }

    pub(crate) fn from_student(student: &Student) -> Self {
        Self::for_person(FormKind::Student, student.id(), &student.name, student.age, &student.email)
    }

    pub(crate) fn from_instructor(instructor: &Instructor) -> Self {
        Self::for_person(
            FormKind::Instructor,
            instructor.id(),
            &instructor.name,
            instructor.age,
            &instructor.email,
        )
    }

    pub(crate) fn from_course(course: &Course) -> Self {
        let mut form = Self::new(FormKind::Course);
        form.fields[ID].value = course.id().to_string();
        form.fields[NAME].value = course.title.clone();
        form.lock_id();
        form
    }

    fn for_person(kind: FormKind, id: &str, name: &str, age: u32, email: &str) -> Self {
        let mut form = Self::new(kind);
        form.fields[ID].value = id.to_string();
        form.fields[NAME].value = name.to_string();
        form.fields[AGE].value = age.to_string();
        form.fields[EMAIL].value = email.to_string();
        form.lock_id();
        form
    }

    /// Identifiers are immutable once assigned, so edit forms skip them.
    fn lock_id(&mut self) {
        self.fields[ID].locked = true;
        self.active = NAME;
    }

    /// Move focus to the next unlocked field, wrapping around.
    pub(crate) fn toggle_field(&mut self) {
        self.step(1);
    }

    pub(crate) fn previous_field(&mut self) {
        self.step(self.fields.len() - 1);
    }

    fn step(&mut self, by: usize) {
        let len = self.fields.len();
        for _ in 0..len {
            self.active = (self.active + by) % len;
            if !self.fields[self.active].locked {
                return;
            }
        }
    }

    /// Append a character to the active field, rejecting control characters
    /// and non-digits in numeric fields.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let field = &mut self.fields[self.active];
        if ch.is_control() || (field.digits_only && !ch.is_ascii_digit()) {
            return false;
        }
        field.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.fields[self.active].value.pop();
    }

    fn value(&self, index: usize) -> &str {
        self.fields[index].value.trim()
    }

    /// The (trimmed) identifier typed into or carried by the form.
    pub(crate) fn id(&self) -> &str {
        self.value(ID)
    }

    pub(crate) fn is_edit(&self) -> bool {
        self.fields[ID].locked
    }

    pub(crate) fn to_student(&self, rules: &ValidationRules) -> Result<Student, ValidationError> {
        let age = rules.parse_age(self.value(AGE))?;
        Ok(Student::new(self.id(), self.value(NAME), age, self.value(EMAIL)))
    }

    pub(crate) fn to_instructor(
        &self,
        rules: &ValidationRules,
    ) -> Result<Instructor, ValidationError> {
        let age = rules.parse_age(self.value(AGE))?;
        Ok(Instructor::new(self.id(), self.value(NAME), age, self.value(EMAIL)))
    }

    pub(crate) fn to_course(&self) -> Course {
        Course::new(self.id(), self.value(NAME))
    }

    /// Edit forms always submit every field; the store ignores unchanged
    /// values naturally.
    pub(crate) fn to_person_changes(
        &self,
        rules: &ValidationRules,
    ) -> Result<PersonChanges, ValidationError> {
        Ok(PersonChanges {
            name: Some(self.value(NAME).to_string()),
            age: Some(rules.parse_age(self.value(AGE))?),
            email: Some(self.value(EMAIL).to_string()),
        })
    }

    pub(crate) fn to_course_changes(&self) -> CourseChanges {
        CourseChanges {
            title: Some(self.value(NAME).to_string()),
        }
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, index: usize) -> Line<'static> {
        let field = &self.fields[index];
        let is_active = index == self.active;

        let display = if field.value.is_empty() {
            if field.required {
                "<required>".to_string()
            } else {
                "<optional>".to_string()
            }
        } else {
            field.value.clone()
        };

        let style = if field.locked {
            Style::default().fg(Color::DarkGray)
        } else if is_active {
            Style::default().fg(Color::Yellow)
        } else if field.value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label)),
            Span::styled(display, style),
        ])
    }

    /// Column where the cursor sits for the active field.
    pub(crate) fn cursor_offset(&self) -> usize {
        let field = &self.fields[self.active];
        field.label.chars().count() + 2 + field.value.chars().count()
    }
}

/// Pending deletion awaiting a yes/no answer.
#[derive(Clone, Debug)]
pub(crate) struct ConfirmDelete {
    pub(crate) kind: FormKind,
    pub(crate) id: String,
    pub(crate) label: String,
}

impl ConfirmDelete {
    /// Extra warning describing what the delete takes with it.
    pub(crate) fn consequence(&self) -> &'static str {
        match self.kind {
            FormKind::Student => "Their enrollments will be removed as well.",
            FormKind::Instructor => "Their courses will be left without an instructor.",
            FormKind::Course => "All enrollments in this course will be removed.",
        }
    }
}

/// Whole-database operations started from the main screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FileAction {
    Backup,
    ExportJson,
    ImportJson,
    ExportCsv,
}

impl FileAction {
    pub(crate) fn title(self) -> &'static str {
        match self {
            FileAction::Backup => "Backup Database",
            FileAction::ExportJson => "Export JSON",
            FileAction::ImportJson => "Import JSON",
            FileAction::ExportCsv => "Export CSV",
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            FileAction::Backup => "A copy of the database is written to this file.",
            FileAction::ExportJson => "Every record is written to this file.",
            FileAction::ImportJson => "Replaces ALL records with the file's contents.",
            FileAction::ExportCsv => "One CSV file per table is written to this directory.",
        }
    }

    /// Suggested target inside `dir`; CSV export targets the directory itself.
    fn default_target(self, dir: &Path) -> PathBuf {
        match self {
            FileAction::Backup => dir.join("school-backup.db"),
            FileAction::ExportJson | FileAction::ImportJson => dir.join("school_export.json"),
            FileAction::ExportCsv => dir.to_path_buf(),
        }
    }
}

/// Single-line path input for a [`FileAction`].
#[derive(Clone, Debug)]
pub(crate) struct PathPrompt {
    pub(crate) action: FileAction,
    pub(crate) input: String,
    pub(crate) error: Option<String>,
}

impl PathPrompt {
    pub(crate) fn new(action: FileAction, dir: &Path) -> Self {
        Self {
            action,
            input: action.default_target(dir).display().to_string(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if !ch.is_control() {
            self.input.push(ch);
            self.error = None;
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.input.pop();
        self.error = None;
    }

    /// The typed path, `None` while the input is blank.
    pub(crate) fn path(&self) -> Option<PathBuf> {
        let trimmed = self.input.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(form: &mut RecordForm, text: &str) {
        for ch in text.chars() {
            form.push_char(ch);
        }
    }

    #[test]
    fn new_student_form_builds_record() {
        let rules = ValidationRules::default();
        let mut form = RecordForm::new(FormKind::Student);
        type_str(&mut form, "S1");
        form.toggle_field();
        type_str(&mut form, "Ana");
        form.toggle_field();
        type_str(&mut form, "2x0");
        form.toggle_field();
        type_str(&mut form, "ana@example.com");

        let student = form.to_student(&rules).unwrap();
        assert_eq!(student.id(), "S1");
        assert_eq!(student.name, "Ana");
        assert_eq!(student.age, 20);
        assert_eq!(student.email, "ana@example.com");
    }

    #[test]
    fn empty_age_is_rejected() {
        let rules = ValidationRules::default();
        let form = RecordForm::new(FormKind::Instructor);
        assert_eq!(
            form.to_instructor(&rules).unwrap_err().reason,
            "age must be an integer"
        );
    }

    #[test]
    fn edit_form_skips_locked_id() {
        let course = Course::new("C1", "Algebra");
        let mut form = RecordForm::from_course(&course);
        assert!(form.is_edit());
        assert_eq!(form.active, NAME);
        form.toggle_field();
        assert_eq!(form.active, NAME);
        form.previous_field();
        assert_eq!(form.active, NAME);

        form.backspace();
        assert_eq!(form.to_course_changes().title.as_deref(), Some("Algebr"));
        assert_eq!(form.id(), "C1");
    }

    #[test]
    fn cursor_tracks_active_value() {
        let mut form = RecordForm::new(FormKind::Course);
        type_str(&mut form, "C12");
        assert_eq!(form.cursor_offset(), "ID: C12".len());
    }

    #[test]
    fn path_prompt_suggests_target_next_to_database() {
        let dir = Path::new("/data/school");
        let prompt = PathPrompt::new(FileAction::Backup, dir);
        assert_eq!(prompt.path(), Some(dir.join("school-backup.db")));

        let mut prompt = PathPrompt::new(FileAction::ExportCsv, dir);
        assert_eq!(prompt.path().as_deref(), Some(dir));
        while !prompt.input.is_empty() {
            prompt.backspace();
        }
        assert_eq!(prompt.path(), None);
        prompt.push_char(' ');
        assert_eq!(prompt.path(), None);
    }
}
