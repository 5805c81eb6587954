use std::mem;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use tracing::{debug, warn};

use crate::facade::School;
use crate::models::{Course, Instructor, Student};

use super::forms::{ConfirmDelete, FileAction, FormKind, PathPrompt, RecordForm};
use super::helpers::{centered_rect, id_list, key_hint, surface_error};
use super::screens::{
    Listed, PickAction, PickOption, Picker, RecordList, SearchState, Tab,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 4;
/// Height of the tab bar at the top of the screen.
const TABS_HEIGHT: u16 = 3;
/// Rows skipped by PageUp / PageDown.
const PAGE: isize = 10;
/// File name prefix for CSV exports started from the TUI.
const CSV_PREFIX: &str = "school_export";

/// Fine-grained modes layered over the current tab.
enum Mode {
    Normal,
    Form(RecordForm),
    ConfirmDelete(ConfirmDelete),
    Picking(Picker),
    Searching(SearchState),
    FilePrompt(PathPrompt),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    school: School,
    tab: Tab,
    students: RecordList<Student>,
    instructors: RecordList<Instructor>,
    courses: RecordList<Course>,
    /// Store-side filter applied to all three tabs.
    filter: Option<String>,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(school: School) -> Result<Self> {
        let mut app = Self {
            school,
            tab: Tab::Students,
            students: RecordList::new(Vec::new()),
            instructors: RecordList::new(Vec::new()),
            courses: RecordList::new(Vec::new()),
            filter: None,
            mode: Mode::Normal,
            status: None,
        };
        app.reload()?;
        Ok(app)
    }

    /// Process one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Form(form) => self.handle_form(code, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Picking(picker) => self.handle_picker(code, picker)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::FilePrompt(prompt) => self.handle_file_prompt(code, prompt)?,
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if self.filter.is_some() {
                    self.filter = None;
                    if self.refresh() {
                        self.set_status("Filter cleared.", StatusKind::Info);
                    }
                } else {
                    *exit = true;
                }
            }
            KeyCode::Tab | KeyCode::Right => self.switch_tab(self.tab.next()),
            KeyCode::BackTab | KeyCode::Left => self.switch_tab(self.tab.previous()),
            KeyCode::Char('1') => self.switch_tab(Tab::Students),
            KeyCode::Char('2') => self.switch_tab(Tab::Instructors),
            KeyCode::Char('3') => self.switch_tab(Tab::Courses),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-PAGE),
            KeyCode::PageDown => self.move_selection(PAGE),
            KeyCode::Home => self.select_edge(true),
            KeyCode::End => self.select_edge(false),
            KeyCode::Char('+') | KeyCode::Char('a') => {
                self.clear_status();
                return Ok(Mode::Form(RecordForm::new(self.form_kind())));
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(form) = self.edit_form() {
                    self.clear_status();
                    return Ok(Mode::Form(form));
                }
                self.set_status("Nothing selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Char('d') => {
                if let Some(confirm) = self.confirm_delete() {
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("Nothing selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('r') => return self.open_picker(PickerKind::Enroll),
            KeyCode::Char('u') => return self.open_picker(PickerKind::Unenroll),
            KeyCode::Char('i') => return self.open_picker(PickerKind::Instructor),
            KeyCode::Char('f') | KeyCode::Char('/') => {
                self.clear_status();
                return Ok(Mode::Searching(SearchState::new(self.filter.clone())));
            }
            KeyCode::Char('g') => {
                if self.refresh() {
                    self.set_status("Reloaded.", StatusKind::Info);
                }
            }
            KeyCode::Char('b') => return Ok(self.open_prompt(FileAction::Backup)),
            KeyCode::Char('x') => return Ok(self.open_prompt(FileAction::ExportJson)),
            KeyCode::Char('o') => return Ok(self.open_prompt(FileAction::ImportJson)),
            KeyCode::Char('c') => return Ok(self.open_prompt(FileAction::ExportCsv)),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_form(&mut self, code: KeyCode, mut form: RecordForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                let action = if form.is_edit() { "Edit" } else { "Add" };
                self.set_status(
                    format!("{action} {} cancelled.", form.kind.label().to_lowercase()),
                    StatusKind::Info,
                );
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.toggle_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_form(&form) {
                Ok(message) => {
                    self.set_status(message, StatusKind::Info);
                    keep_open = false;
                }
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::Form(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmDelete) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_delete(&confirm) {
                    Ok(()) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_picker(&mut self, code: KeyCode, mut picker: Picker) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Selection cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Up | KeyCode::Char('k') => picker.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => picker.move_selection(1),
            KeyCode::PageUp => picker.move_selection(-PAGE),
            KeyCode::PageDown => picker.move_selection(PAGE),
            KeyCode::Home => picker.select_first(),
            KeyCode::End => picker.select_last(),
            KeyCode::Enter => {
                let Some(option) = picker.current().cloned() else {
                    return Ok(Mode::Picking(picker));
                };
                match self.apply_pick(&picker.action, option.value.as_deref()) {
                    Ok(message) => {
                        self.set_status(message, StatusKind::Info);
                        return Ok(Mode::Normal);
                    }
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
            }
            _ => {}
        }
        Ok(Mode::Picking(picker))
    }

    /// Typing filters every tab live; Enter keeps the filter, Esc restores
    /// whatever was active before the search opened.
    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.filter = state.previous.take();
                self.refresh();
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                let total = self.students.len() + self.instructors.len() + self.courses.len();
                match &self.filter {
                    Some(filter) => self.set_status(
                        format!("{total} matches for \"{filter}\". Esc clears the filter."),
                        StatusKind::Info,
                    ),
                    None => self.clear_status(),
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        self.filter = state.as_filter();
        if self.refresh() {
            self.clear_status();
        }
        Ok(Mode::Searching(state))
    }

    fn handle_file_prompt(&mut self, code: KeyCode, mut prompt: PathPrompt) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(
                    format!("{} cancelled.", prompt.action.title()),
                    StatusKind::Info,
                );
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => prompt.backspace(),
            KeyCode::Char(ch) => prompt.push_char(ch),
            KeyCode::Enter => match self.run_file_action(&prompt) {
                Ok(message) => {
                    self.set_status(message, StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                Err(err) => {
                    warn!(action = ?prompt.action, error = %err, "file action failed");
                    let message = surface_error(&err);
                    prompt.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            _ => {}
        }
        Ok(Mode::FilePrompt(prompt))
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.clear_status();
    }

    fn move_selection(&mut self, offset: isize) {
        match self.tab {
            Tab::Students => self.students.move_selection(offset),
            Tab::Instructors => self.instructors.move_selection(offset),
            Tab::Courses => self.courses.move_selection(offset),
        }
    }

    fn select_edge(&mut self, first: bool) {
        match (self.tab, first) {
            (Tab::Students, true) => self.students.select_first(),
            (Tab::Students, false) => self.students.select_last(),
            (Tab::Instructors, true) => self.instructors.select_first(),
            (Tab::Instructors, false) => self.instructors.select_last(),
            (Tab::Courses, true) => self.courses.select_first(),
            (Tab::Courses, false) => self.courses.select_last(),
        }
    }

    fn form_kind(&self) -> FormKind {
        match self.tab {
            Tab::Students => FormKind::Student,
            Tab::Instructors => FormKind::Instructor,
            Tab::Courses => FormKind::Course,
        }
    }

    fn edit_form(&self) -> Option<RecordForm> {
        match self.tab {
            Tab::Students => self.students.current().map(RecordForm::from_student),
            Tab::Instructors => self.instructors.current().map(RecordForm::from_instructor),
            Tab::Courses => self.courses.current().map(RecordForm::from_course),
        }
    }

    fn confirm_delete(&self) -> Option<ConfirmDelete> {
        let (id, label) = match self.tab {
            Tab::Students => self
                .students
                .current()
                .map(|s| (s.id().to_string(), s.name.clone()))?,
            Tab::Instructors => self
                .instructors
                .current()
                .map(|i| (i.id().to_string(), i.name.clone()))?,
            Tab::Courses => self
                .courses
                .current()
                .map(|c| (c.id().to_string(), c.title.clone()))?,
        };
        Some(ConfirmDelete {
            kind: self.form_kind(),
            id,
            label,
        })
    }

    /// Refresh every tab from the store with the active filter.
    fn reload(&mut self) -> Result<()> {
        let filter = self.filter.as_deref();
        let students = self.school.students(filter)?;
        let instructors = self.school.instructors(filter)?;
        let courses = self.school.courses(filter)?;
        debug!(
            students = students.len(),
            instructors = instructors.len(),
            courses = courses.len(),
            filter,
            "reloaded lists"
        );
        self.students.set_items(students);
        self.instructors.set_items(instructors);
        self.courses.set_items(courses);
        Ok(())
    }

    /// Reload after an interactive action. A store error is shown on the
    /// status line instead of ending the session; returns whether the lists
    /// are current.
    fn refresh(&mut self) -> bool {
        match self.reload() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not reload lists");
                self.set_status(surface_error(&err), StatusKind::Error);
                false
            }
        }
    }

    /// Reload after a change that already committed. The change is reported
    /// even when the lists could not be refreshed.
    fn after_change(&mut self, message: String) -> String {
        match self.reload() {
            Ok(()) => message,
            Err(err) => {
                warn!(error = %err, "could not reload lists after change");
                format!("{message} Lists not refreshed: {}", surface_error(&err))
            }
        }
    }

    /// Prompts start next to the open database file.
    fn open_prompt(&mut self, action: FileAction) -> Mode {
        let dir = self
            .school
            .db_path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.clear_status();
        Mode::FilePrompt(PathPrompt::new(action, &dir))
    }

    fn run_file_action(&mut self, prompt: &PathPrompt) -> Result<String> {
        let Some(path) = prompt.path() else {
            anyhow::bail!("Enter a path first.");
        };
        let message = match prompt.action {
            FileAction::Backup => {
                self.school.backup(&path)?;
                format!("Database copied to {}.", path.display())
            }
            FileAction::ExportJson => {
                let summary = self.school.export_json(&path)?;
                format!(
                    "Exported {} students, {} instructors, {} courses to {}.",
                    summary.students,
                    summary.instructors,
                    summary.courses,
                    path.display()
                )
            }
            FileAction::ImportJson => {
                let summary = self.school.import_json(&path)?;
                self.after_change(format!(
                    "Imported {} students, {} instructors, {} courses, {} enrollments.",
                    summary.students, summary.instructors, summary.courses, summary.enrollments
                ))
            }
            FileAction::ExportCsv => {
                let paths = self.school.export_csv(&path, CSV_PREFIX)?;
                format!("Wrote {} CSV files to {}.", paths.len(), path.display())
            }
        };
        Ok(message)
    }

    fn save_form(&mut self, form: &RecordForm) -> Result<String> {
        let rules = *self.school.rules();
        let (id, message) = match (form.kind, form.is_edit()) {
            (FormKind::Student, false) => {
                let student = self.school.register_student(form.to_student(&rules)?)?;
                (student.id().to_string(), format!("Registered {student}."))
            }
            (FormKind::Student, true) => {
                let student = self
                    .school
                    .update_student(form.id(), form.to_person_changes(&rules)?)?;
                (student.id().to_string(), format!("Updated {student}."))
            }
            (FormKind::Instructor, false) => {
                let instructor = self.school.add_instructor(form.to_instructor(&rules)?)?;
                (instructor.id().to_string(), format!("Added {instructor}."))
            }
            (FormKind::Instructor, true) => {
                let instructor = self
                    .school
                    .update_instructor(form.id(), form.to_person_changes(&rules)?)?;
                (instructor.id().to_string(), format!("Updated {instructor}."))
            }
            (FormKind::Course, false) => {
                let course = self.school.add_course(form.to_course())?;
                (course.id().to_string(), format!("Added {course}."))
            }
            (FormKind::Course, true) => {
                let course = self
                    .school
                    .update_course(form.id(), form.to_course_changes())?;
                (course.id().to_string(), format!("Updated {course}."))
            }
        };

        let message = self.after_change(message);
        match form.kind {
            FormKind::Student => self.students.select_id(&id),
            FormKind::Instructor => self.instructors.select_id(&id),
            FormKind::Course => self.courses.select_id(&id),
        };
        Ok(message)
    }

    fn perform_delete(&mut self, confirm: &ConfirmDelete) -> Result<()> {
        match confirm.kind {
            FormKind::Student => self.school.withdraw_student(&confirm.id)?,
            FormKind::Instructor => self.school.remove_instructor(&confirm.id)?,
            FormKind::Course => self.school.remove_course(&confirm.id)?,
        }
        let message = self.after_change(format!(
            "{} {} ({}) removed.",
            confirm.kind.label(),
            confirm.id,
            confirm.label
        ));
        self.set_status(message, StatusKind::Info);
        Ok(())
    }

    fn open_picker(&mut self, kind: PickerKind) -> Result<Mode> {
        match self.build_picker(kind) {
            Ok(Some(picker)) if picker.options.is_empty() => {
                self.set_status(kind.empty_message(self.tab), StatusKind::Info);
                Ok(Mode::Normal)
            }
            Ok(Some(picker)) => {
                self.clear_status();
                Ok(Mode::Picking(picker))
            }
            Ok(None) => {
                self.set_status(kind.unavailable_message(), StatusKind::Error);
                Ok(Mode::Normal)
            }
            Err(err) => {
                self.set_status(surface_error(&err), StatusKind::Error);
                Ok(Mode::Normal)
            }
        }
    }

    /// Build the option list for `kind` on the current tab. `None` means the
    /// action does not apply here (wrong tab or nothing selected).
    fn build_picker(&mut self, kind: PickerKind) -> Result<Option<Picker>> {
        let picker = match (kind, self.tab) {
            (PickerKind::Enroll, Tab::Students) => {
                let Some(student) = self.students.current().cloned() else {
                    return Ok(None);
                };
                let options = self
                    .school
                    .courses(None)?
                    .iter()
                    .filter(|c| !student.course_ids.iter().any(|id| id == c.id()))
                    .map(|c| PickOption::record(c.id(), c.to_string()))
                    .collect();
                Picker::new(
                    format!("Enroll {} in", student.id()),
                    PickAction::EnrollInCourse {
                        student_id: student.id().to_string(),
                    },
                    options,
                )
            }
            (PickerKind::Enroll, Tab::Courses) => {
                let Some(course) = self.courses.current().cloned() else {
                    return Ok(None);
                };
                let options = self
                    .school
                    .students(None)?
                    .iter()
                    .filter(|s| !course.student_ids.iter().any(|id| id == s.id()))
                    .map(|s| PickOption::record(s.id(), s.to_string()))
                    .collect();
                Picker::new(
                    format!("Enroll in {}", course.id()),
                    PickAction::EnrollStudent {
                        course_id: course.id().to_string(),
                    },
                    options,
                )
            }
            (PickerKind::Unenroll, Tab::Students) => {
                let Some(student) = self.students.current().cloned() else {
                    return Ok(None);
                };
                let options = self
                    .school
                    .courses(None)?
                    .iter()
                    .filter(|c| student.course_ids.iter().any(|id| id == c.id()))
                    .map(|c| PickOption::record(c.id(), c.to_string()))
                    .collect();
                Picker::new(
                    format!("Remove {} from", student.id()),
                    PickAction::DropCourse {
                        student_id: student.id().to_string(),
                    },
                    options,
                )
            }
            (PickerKind::Unenroll, Tab::Courses) => {
                let Some(course) = self.courses.current().cloned() else {
                    return Ok(None);
                };
                let options = self
                    .school
                    .students(None)?
                    .iter()
                    .filter(|s| course.student_ids.iter().any(|id| id == s.id()))
                    .map(|s| PickOption::record(s.id(), s.to_string()))
                    .collect();
                Picker::new(
                    format!("Remove from {}", course.id()),
                    PickAction::DropStudent {
                        course_id: course.id().to_string(),
                    },
                    options,
                )
            }
            (PickerKind::Instructor, Tab::Courses) => {
                let Some(course) = self.courses.current().cloned() else {
                    return Ok(None);
                };
                let mut options = vec![PickOption {
                    value: None,
                    label: "(no instructor)".to_string(),
                }];
                options.extend(
                    self.school
                        .instructors(None)?
                        .iter()
                        .map(|i| PickOption::record(i.id(), i.to_string())),
                );
                Picker::new(
                    format!("Instructor for {}", course.id()),
                    PickAction::AssignInstructor {
                        course_id: course.id().to_string(),
                    },
                    options,
                )
                .preselect(course.instructor_id.as_deref())
            }
            _ => return Ok(None),
        };
        Ok(Some(picker))
    }

    fn apply_pick(&mut self, action: &PickAction, value: Option<&str>) -> Result<String> {
        let message = match (action, value) {
            (PickAction::EnrollInCourse { student_id }, Some(course_id)) => {
                self.enroll(student_id, course_id)?
            }
            (PickAction::EnrollStudent { course_id }, Some(student_id)) => {
                self.enroll(student_id, course_id)?
            }
            (PickAction::DropCourse { student_id }, Some(course_id)) => {
                self.unenroll(student_id, course_id)?
            }
            (PickAction::DropStudent { course_id }, Some(student_id)) => {
                self.unenroll(student_id, course_id)?
            }
            (PickAction::AssignInstructor { course_id }, Some(instructor_id)) => {
                let course = self.school.assign_instructor(instructor_id, course_id)?;
                format!("{course}.")
            }
            (PickAction::AssignInstructor { course_id }, None) => {
                self.school.unassign_instructor(course_id)?;
                format!("{course_id} no longer has an instructor.")
            }
            _ => return Ok(String::new()),
        };
        Ok(self.after_change(message))
    }

    fn enroll(&mut self, student_id: &str, course_id: &str) -> Result<String> {
        let course = self.school.enroll_student(student_id, course_id)?;
        Ok(format!("{student_id} enrolled in {course}."))
    }

    fn unenroll(&mut self, student_id: &str, course_id: &str) -> Result<String> {
        self.school.unenroll_student(student_id, course_id)?;
        Ok(format!("{student_id} removed from {course_id}."))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);
        let tabs_height = TABS_HEIGHT.min(area.height.saturating_sub(footer_height));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(tabs_height),
                Constraint::Min(0),
                Constraint::Length(footer_height),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);
        match self.tab {
            Tab::Students => self.draw_records(frame, chunks[1], &self.students, |s| {
                self.student_details(s)
            }),
            Tab::Instructors => self.draw_records(frame, chunks[1], &self.instructors, |i| {
                self.instructor_details(i)
            }),
            Tab::Courses => self.draw_records(frame, chunks[1], &self.courses, |c| {
                self.course_details(c)
            }),
        }
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::Form(form) => self.draw_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Picking(picker) => self.draw_picker(frame, area, picker),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::FilePrompt(prompt) => self.draw_prompt(frame, area, prompt),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let counts = [
            self.students.len(),
            self.instructors.len(),
            self.courses.len(),
        ];
        let titles = Tab::ALL
            .iter()
            .zip(counts)
            .map(|(tab, count)| Line::from(format!(" {} ({count}) ", tab.title())));

        let mut title = String::from("School Manager");
        if let Some(filter) = &self.filter {
            title.push_str(&format!(" [filter: {filter}]"));
        }

        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title(title))
            .select(self.tab.index())
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    /// List on the left, details of the highlighted record on the right.
    fn draw_records<T, F>(&self, frame: &mut Frame, area: Rect, list: &RecordList<T>, details: F)
    where
        T: Listed + std::fmt::Display,
        F: Fn(&T) -> Vec<Line<'static>>,
    {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.tab.title());

        if list.is_empty() {
            let text = if self.filter.is_some() {
                "No matches. Press Esc to clear the filter."
            } else {
                "Nothing here yet. Press + to add one."
            };
            let paragraph = Paragraph::new(Span::styled(text, Style::default().fg(Color::Gray)))
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, columns[0]);
        } else {
            let items: Vec<ListItem> = list
                .items
                .iter()
                .map(|item| ListItem::new(item.to_string()))
                .collect();
            let widget = List::new(items)
                .block(block)
                .highlight_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            let mut state = ListState::default();
            state.select(Some(list.selected));
            frame.render_stateful_widget(widget, columns[0], &mut state);
        }

        let lines = list.current().map(details).unwrap_or_default();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, columns[1]);
    }

    fn student_details(&self, student: &Student) -> Vec<Line<'static>> {
        let mut lines = person_lines(student.id(), &student.name, student.age, &student.email);
        lines.push(detail_line("Courses", id_list(&student.course_ids)));
        lines
    }

    fn instructor_details(&self, instructor: &Instructor) -> Vec<Line<'static>> {
        let mut lines = person_lines(
            instructor.id(),
            &instructor.name,
            instructor.age,
            &instructor.email,
        );
        lines.push(detail_line("Teaches", id_list(&instructor.course_ids)));
        lines
    }

    fn course_details(&self, course: &Course) -> Vec<Line<'static>> {
        let instructor = match &course.instructor_id {
            Some(id) => match self.instructors.items.iter().find(|i| i.id() == id) {
                Some(instructor) => instructor.to_string(),
                None => id.clone(),
            },
            None => "-".to_string(),
        };
        vec![
            detail_line("ID", course.id().to_string()),
            detail_line("Title", course.title.clone()),
            detail_line("Instructor", instructor),
            detail_line(
                "Students",
                format!("{} ({})", id_list(&course.student_ids), course.student_ids.len()),
            ),
        ]
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let hints: Vec<(&str, &str)> = match (&self.mode, self.tab) {
            (Mode::Form(_), _) => vec![("Tab", "Next field"), ("Enter", "Save"), ("Esc", "Cancel")],
            (Mode::ConfirmDelete(_), _) => vec![("Y", "Confirm"), ("N", "Cancel")],
            (Mode::Picking(_), _) => vec![("↑↓", "Navigate"), ("Enter", "Choose"), ("Esc", "Cancel")],
            (Mode::Searching(_), _) => vec![("Enter", "Keep filter"), ("Esc", "Cancel")],
            (Mode::FilePrompt(_), _) => vec![("Enter", "Run"), ("Esc", "Cancel")],
            (Mode::Normal, Tab::Instructors) => vec![
                ("Tab", "Switch"),
                ("+", "Add"),
                ("e", "Edit"),
                ("-", "Delete"),
                ("f", "Search"),
                ("b", "Backup"),
                ("x/o", "Export/Import JSON"),
                ("c", "CSV"),
                ("q", "Quit"),
            ],
            (Mode::Normal, Tab::Students) => vec![
                ("Tab", "Switch"),
                ("+", "Add"),
                ("e", "Edit"),
                ("-", "Delete"),
                ("r", "Enroll"),
                ("u", "Unenroll"),
                ("f", "Search"),
                ("b", "Backup"),
                ("x/o", "Export/Import JSON"),
                ("c", "CSV"),
                ("q", "Quit"),
            ],
            (Mode::Normal, Tab::Courses) => vec![
                ("Tab", "Switch"),
                ("+", "Add"),
                ("e", "Edit"),
                ("-", "Delete"),
                ("r", "Enroll"),
                ("u", "Unenroll"),
                ("i", "Instructor"),
                ("f", "Search"),
                ("b", "Backup"),
                ("x/o", "Export/Import JSON"),
                ("c", "CSV"),
                ("q", "Quit"),
            ],
        };
        Line::from(
            hints
                .into_iter()
                .flat_map(|(key, label)| key_hint(key, label))
                .collect::<Vec<_>>(),
        )
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, prompt: &PathPrompt) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(prompt.action.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let footer = match &prompt.error {
            Some(error) => Span::styled(error.clone(), Style::default().fg(Color::Red)),
            None => Span::styled(
                format!("{} Enter to run • Esc to cancel", prompt.action.hint()),
                Style::default().fg(Color::Gray),
            ),
        };
        let lines = vec![
            Line::from(vec![
                Span::raw("Path: "),
                Span::styled(prompt.input.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
            Line::from(footer),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let cursor_x = inner.x + "Path: ".len() as u16 + prompt.input.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, form: &RecordForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let action = if form.is_edit() { "Edit" } else { "Add" };
        let title = format!("{action} {}", form.kind.label());
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.fields.len()).map(|i| form.build_line(i)).collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + form.cursor_offset() as u16;
        let cursor_y = inner.y + form.active as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Removal")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Remove {} {} ({})?",
                confirm.kind.label(),
                confirm.id,
                confirm.label
            )),
            Line::from(confirm.consequence()),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, picker: &Picker) {
        let popup_area = centered_rect(60, 60, area);
        frame.render_widget(Clear, popup_area);

        let items: Vec<ListItem> = picker
            .options
            .iter()
            .map(|option| ListItem::new(option.label.clone()))
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .title(picker.title.clone())
                    .borders(Borders::ALL),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(picker.selected));
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

/// Which picker a key opened; resolved against the current tab.
#[derive(Copy, Clone, Debug)]
enum PickerKind {
    Enroll,
    Unenroll,
    Instructor,
}

impl PickerKind {
    fn empty_message(self, tab: Tab) -> &'static str {
        match (self, tab) {
            (PickerKind::Enroll, Tab::Students) => "Already enrolled in every course.",
            (PickerKind::Enroll, _) => "Every student is already enrolled.",
            (PickerKind::Unenroll, Tab::Students) => "Not enrolled in any course.",
            (PickerKind::Unenroll, _) => "No students enrolled.",
            (PickerKind::Instructor, _) => "No instructors available.",
        }
    }

    fn unavailable_message(self) -> &'static str {
        match self {
            PickerKind::Enroll | PickerKind::Unenroll => {
                "Select a student or course to manage enrollment."
            }
            PickerKind::Instructor => "Select a course to assign an instructor.",
        }
    }
}

fn detail_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label:<11}"),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(value),
    ])
}

fn person_lines(id: &str, name: &str, age: u32, email: &str) -> Vec<Line<'static>> {
    vec![
        detail_line("ID", id.to_string()),
        detail_line("Name", name.to_string()),
        detail_line("Age", age.to_string()),
        detail_line("Email", email.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use rusqlite::Connection;
    use tempfile::TempDir;

    use crate::config::AppConfig;

    fn app() -> App {
        let mut school = School::open_in_memory().unwrap();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        school
            .add_instructor(Instructor::new("I1", "Ines", 45, "ines@school.edu"))
            .unwrap();
        school.add_course(Course::new("C1", "Algebra")).unwrap();
        App::new(school).unwrap()
    }

    fn press(app: &mut App, keys: &[KeyCode]) {
        for key in keys {
            assert!(!app.handle_key(*key).unwrap());
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    fn status_is_error(app: &App) -> bool {
        matches!(
            app.status,
            Some(StatusMessage {
                kind: StatusKind::Error,
                ..
            })
        )
    }

    /// Open the prompt for `key` and replace its suggested path.
    fn prompt_path(app: &mut App, key: char, path: &Path) {
        press(app, &[KeyCode::Char(key)]);
        match &mut app.mode {
            Mode::FilePrompt(prompt) => prompt.input.clear(),
            _ => panic!("prompt should be open"),
        }
        type_text(app, &path.display().to_string());
    }

    #[test]
    fn adds_student_through_form() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('+')]);
        type_text(&mut app, "S2");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "Bea");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "21");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "bea@example.com");
        press(&mut app, &[KeyCode::Enter]);

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Registered S2 - Bea.");
        assert_eq!(app.students.len(), 2);
        assert_eq!(app.students.current_id().as_deref(), Some("S2"));
    }

    #[test]
    fn invalid_form_stays_open_with_error() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('+')]);
        type_text(&mut app, "S1");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "Dup");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "30");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "dup@example.com");
        press(&mut app, &[KeyCode::Enter]);

        match &app.mode {
            Mode::Form(form) => assert_eq!(form.error.as_deref(), Some("Student S1 already exists.")),
            _ => panic!("form should stay open"),
        }
        press(&mut app, &[KeyCode::Esc]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.students.len(), 1);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('-'), KeyCode::Char('n')]);
        assert_eq!(app.students.len(), 1);

        press(&mut app, &[KeyCode::Char('-'), KeyCode::Char('y')]);
        assert!(app.students.is_empty());
        assert_eq!(status_text(&app), "Student S1 (Ana) removed.");
    }

    #[test]
    fn enrolls_and_assigns_through_pickers() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('r'), KeyCode::Enter]);
        assert_eq!(status_text(&app), "S1 enrolled in C1 - Algebra.");
        assert_eq!(app.students.current().unwrap().course_ids, vec!["C1"]);

        // Already enrolled everywhere, so the picker does not open.
        press(&mut app, &[KeyCode::Char('r')]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Already enrolled in every course.");

        press(&mut app, &[KeyCode::Char('3'), KeyCode::Char('i'), KeyCode::Down, KeyCode::Enter]);
        let course = app.courses.current().unwrap();
        assert_eq!(course.instructor_id.as_deref(), Some("I1"));
        assert_eq!(course.student_ids, vec!["S1"]);

        press(&mut app, &[KeyCode::Char('u'), KeyCode::Enter]);
        assert!(app.courses.current().unwrap().student_ids.is_empty());
    }

    #[test]
    fn instructor_picker_needs_course_tab() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('i')]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Select a course to assign an instructor.");
    }

    #[test]
    fn search_filters_and_escape_restores() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('f')]);
        type_text(&mut app, "zzz");
        assert!(app.students.is_empty());
        assert!(app.courses.is_empty());

        press(&mut app, &[KeyCode::Esc]);
        assert_eq!(app.filter, None);
        assert_eq!(app.students.len(), 1);

        press(&mut app, &[KeyCode::Char('f')]);
        type_text(&mut app, "alg");
        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(app.filter.as_deref(), Some("alg"));
        assert_eq!(app.courses.len(), 1);
        assert!(app.students.is_empty());

        // First Esc clears the filter, the second quits.
        press(&mut app, &[KeyCode::Esc]);
        assert_eq!(app.students.len(), 1);
        assert!(app.handle_key(KeyCode::Esc).unwrap());
    }

    #[test]
    fn draws_tabs_and_details() {
        let app = app();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Students (1)"));
        assert!(screen.contains("S1 - Ana"));
        assert!(screen.contains("ana@example.com"));
    }

    #[test]
    fn locked_store_error_keeps_session_and_search() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            busy_timeout_ms: 0,
            retry_delay_ms: 1,
            ..AppConfig::for_path(dir.path().join("school.db"))
        };
        let mut school = School::open(&config).unwrap();
        school
            .register_student(Student::new("S1", "Ana", 20, "ana@example.com"))
            .unwrap();
        let mut app = App::new(school).unwrap();

        let other = Connection::open(dir.path().join("school.db")).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        assert!(!app.handle_key(KeyCode::Char('g')).unwrap());
        assert!(status_is_error(&app));
        assert!(status_text(&app).contains("unavailable"), "{}", status_text(&app));
        assert_eq!(app.students.len(), 1);

        press(&mut app, &[KeyCode::Char('f'), KeyCode::Char('a')]);
        assert!(matches!(app.mode, Mode::Searching(ref state) if state.query == "a"));
        assert!(status_is_error(&app));

        other.execute_batch("ROLLBACK;").unwrap();
        press(&mut app, &[KeyCode::Char('n')]);
        assert!(app.status.is_none());
        assert!(matches!(app.mode, Mode::Searching(ref state) if state.query == "an"));
        assert_eq!(app.students.len(), 1);

        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(app.filter.as_deref(), Some("an"));
    }

    #[test]
    fn exports_and_imports_json_from_prompt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let mut app = app();
        press(&mut app, &[KeyCode::Char('r'), KeyCode::Enter]);

        prompt_path(&mut app, 'x', &path);
        press(&mut app, &[KeyCode::Enter]);
        assert!(matches!(app.mode, Mode::Normal));
        assert!(status_text(&app).starts_with("Exported 1 students, 1 instructors, 1 courses"));
        assert!(path.exists());

        press(&mut app, &[KeyCode::Char('-'), KeyCode::Char('y')]);
        assert!(app.students.is_empty());

        prompt_path(&mut app, 'o', &path);
        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(
            status_text(&app),
            "Imported 1 students, 1 instructors, 1 courses, 1 enrollments."
        );
        assert_eq!(app.students.current().unwrap().course_ids, vec!["C1"]);
    }

    #[test]
    fn backup_and_csv_export_from_prompt() {
        let dir = TempDir::new().unwrap();
        let mut app = app();

        let backup = dir.path().join("copy.db");
        prompt_path(&mut app, 'b', &backup);
        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(
            status_text(&app),
            format!("Database copied to {}.", backup.display())
        );
        let copy = Connection::open(&backup).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let csv_dir = dir.path().join("csv");
        prompt_path(&mut app, 'c', &csv_dir);
        press(&mut app, &[KeyCode::Enter]);
        assert!(status_text(&app).starts_with("Wrote 4 CSV files"));
        assert!(csv_dir.join("school_export_students.csv").exists());
    }

    #[test]
    fn failed_file_action_keeps_prompt_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app();

        prompt_path(&mut app, 'o', &dir.path().join("missing.json"));
        press(&mut app, &[KeyCode::Enter]);
        match &app.mode {
            Mode::FilePrompt(prompt) => assert!(prompt.error.is_some()),
            _ => panic!("prompt should stay open"),
        }
        assert!(status_is_error(&app));
        assert_eq!(app.students.len(), 1);

        if let Mode::FilePrompt(prompt) = &mut app.mode {
            prompt.input.clear();
        }
        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(status_text(&app), "Enter a path first.");

        press(&mut app, &[KeyCode::Esc]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Import JSON cancelled.");
    }
}
