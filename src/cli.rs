//! Command-line front-end. Argument parsing lives here rather than in the
//! binary so the commands can be driven from tests against an in-memory
//! [`School`].

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::error::SchoolError;
use crate::facade::School;
use crate::models::{Course, CourseChanges, Instructor, PersonChanges, Student};

#[derive(Parser, Debug)]
#[command(name = "school-cli")]
#[command(about = "Manage students, instructors and courses from the command line")]
pub struct CliArgs {
    /// Database file (defaults to ~/.school-manager/school.db)
    #[arg(long, env = "SCHOOL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Log facade activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register, inspect, edit or withdraw students
    Student {
        #[command(subcommand)]
        action: PersonAction,
    },
    /// Manage instructors
    Instructor {
        #[command(subcommand)]
        action: PersonAction,
    },
    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Enroll a student in a course (no-op if already enrolled)
    Enroll {
        student_id: String,
        course_id: String,
    },
    /// Remove a student from a course
    Unenroll {
        student_id: String,
        course_id: String,
    },
    /// Assign an instructor to a course, replacing any previous one
    Assign {
        instructor_id: String,
        course_id: String,
    },
    /// Clear the instructor slot of a course
    Unassign { course_id: String },
    /// Search ids and names across every record type
    Search { text: String },
    /// Write the whole database to a JSON file
    ExportJson { path: PathBuf },
    /// Replace the whole database with a JSON export
    ImportJson { path: PathBuf },
    /// Write one CSV file per table
    ExportCsv {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = "school_export")]
        prefix: String,
    },
    /// Copy the database file to another location
    Backup { dest: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum PersonAction {
    Add {
        id: String,
        name: String,
        age: String,
        email: String,
    },
    Show {
        id: String,
    },
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseAction {
    Add {
        id: String,
        title: String,
        #[arg(long)]
        instructor: Option<String>,
    },
    Show {
        id: String,
    },
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
    },
    Remove {
        id: String,
    },
}

/// Execute one command, printing results to `out`.
pub fn run(school: &mut School, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Student { action } => run_student(school, action, out),
        Command::Instructor { action } => run_instructor(school, action, out),
        Command::Course { action } => run_course(school, action, out),
        Command::Enroll {
            student_id,
            course_id,
        } => {
            let course = school.enroll_student(&student_id, &course_id)?;
            writeln!(
                out,
                "{student_id} enrolled in {course} ({} students).",
                course.student_ids.len()
            )?;
            Ok(())
        }
        Command::Unenroll {
            student_id,
            course_id,
        } => {
            school.unenroll_student(&student_id, &course_id)?;
            writeln!(out, "{student_id} removed from {course_id}.")?;
            Ok(())
        }
        Command::Assign {
            instructor_id,
            course_id,
        } => {
            let course = school.assign_instructor(&instructor_id, &course_id)?;
            writeln!(out, "{course}")?;
            Ok(())
        }
        Command::Unassign { course_id } => {
            let course = school.unassign_instructor(&course_id)?;
            writeln!(out, "{course}")?;
            Ok(())
        }
        Command::Search { text } => {
            let results = school.search(&text)?;
            if results.is_empty() {
                writeln!(out, "No matches for \"{text}\".")?;
                return Ok(());
            }
            for student in &results.students {
                writeln!(out, "Student     {student}")?;
            }
            for instructor in &results.instructors {
                writeln!(out, "Instructor  {instructor}")?;
            }
            for course in &results.courses {
                writeln!(out, "Course      {course}")?;
            }
            Ok(())
        }
        Command::ExportJson { path } => {
            let summary = school
                .export_json(&path)
                .with_context(|| format!("failed to export to {}", path.display()))?;
            writeln!(
                out,
                "Exported {} students, {} instructors, {} courses to {}.",
                summary.students,
                summary.instructors,
                summary.courses,
                path.display()
            )?;
            Ok(())
        }
        Command::ImportJson { path } => {
            let summary = school
                .import_json(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            writeln!(
                out,
                "Imported {} students, {} instructors, {} courses, {} enrollments.",
                summary.students, summary.instructors, summary.courses, summary.enrollments
            )?;
            Ok(())
        }
        Command::ExportCsv { dir, prefix } => {
            let paths = school.export_csv(&dir, &prefix)?;
            for path in paths {
                writeln!(out, "{}", path.display())?;
            }
            Ok(())
        }
        Command::Backup { dest } => {
            school.backup(&dest)?;
            writeln!(out, "Database copied to {}.", dest.display())?;
            Ok(())
        }
    }
}

fn person_changes(
    school: &School,
    name: Option<String>,
    age: Option<String>,
    email: Option<String>,
) -> Result<PersonChanges> {
    let age = age
        .map(|raw| school.rules().parse_age(&raw))
        .transpose()
        .map_err(SchoolError::from)?;
    Ok(PersonChanges { name, age, email })
}

fn run_student(school: &mut School, action: PersonAction, out: &mut impl Write) -> Result<()> {
    match action {
        PersonAction::Add {
            id,
            name,
            age,
            email,
        } => {
            let age = school.rules().parse_age(&age).map_err(SchoolError::from)?;
            let student = school.register_student(Student::new(id, name, age, email))?;
            writeln!(out, "Registered {student}.")?;
        }
        PersonAction::Show { id } => {
            let student = school.student(&id)?;
            write_person(out, &student.to_string(), student.age, &student.email)?;
            writeln!(out, "  courses: {}", join_or_dash(&student.course_ids))?;
        }
        PersonAction::List { filter } => {
            for student in school.students(filter.as_deref())? {
                writeln!(out, "{student}")?;
            }
        }
        PersonAction::Update {
            id,
            name,
            age,
            email,
        } => {
            let changes = person_changes(school, name, age, email)?;
            let student = school.update_student(&id, changes)?;
            writeln!(out, "Updated {student}.")?;
        }
        PersonAction::Remove { id } => {
            school.withdraw_student(&id)?;
            writeln!(out, "Student {id} withdrawn.")?;
        }
    }
    Ok(())
}

fn run_instructor(school: &mut School, action: PersonAction, out: &mut impl Write) -> Result<()> {
    match action {
        PersonAction::Add {
            id,
            name,
            age,
            email,
        } => {
            let age = school.rules().parse_age(&age).map_err(SchoolError::from)?;
            let instructor = school.add_instructor(Instructor::new(id, name, age, email))?;
            writeln!(out, "Added {instructor}.")?;
        }
        PersonAction::Show { id } => {
            let instructor = school.instructor(&id)?;
            write_person(out, &instructor.to_string(), instructor.age, &instructor.email)?;
            writeln!(out, "  courses: {}", join_or_dash(&instructor.course_ids))?;
        }
        PersonAction::List { filter } => {
            for instructor in school.instructors(filter.as_deref())? {
                writeln!(out, "{instructor}")?;
            }
        }
        PersonAction::Update {
            id,
            name,
            age,
            email,
        } => {
            let changes = person_changes(school, name, age, email)?;
            let instructor = school.update_instructor(&id, changes)?;
            writeln!(out, "Updated {instructor}.")?;
        }
        PersonAction::Remove { id } => {
            school.remove_instructor(&id)?;
            writeln!(out, "Instructor {id} removed.")?;
        }
    }
    Ok(())
}

fn run_course(school: &mut School, action: CourseAction, out: &mut impl Write) -> Result<()> {
    match action {
        CourseAction::Add {
            id,
            title,
            instructor,
        } => {
            let mut course = Course::new(id, title);
            course.instructor_id = instructor;
            let course = school.add_course(course)?;
            writeln!(out, "Added {course}.")?;
        }
        CourseAction::Show { id } => {
            let course = school.course(&id)?;
            writeln!(out, "{course}")?;
            writeln!(out, "  students: {}", join_or_dash(&course.student_ids))?;
        }
        CourseAction::List { filter } => {
            for course in school.courses(filter.as_deref())? {
                writeln!(out, "{course}")?;
            }
        }
        CourseAction::Update { id, title } => {
            let course = school.update_course(&id, CourseChanges { title })?;
            writeln!(out, "Updated {course}.")?;
        }
        CourseAction::Remove { id } => {
            school.remove_course(&id)?;
            writeln!(out, "Course {id} removed.")?;
        }
    }
    Ok(())
}

fn write_person(out: &mut impl Write, header: &str, age: u32, email: &str) -> Result<()> {
    writeln!(out, "{header}")?;
    writeln!(out, "  age:     {age}")?;
    writeln!(out, "  email:   {email}")?;
    Ok(())
}

fn join_or_dash(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(", ")
    }
}

/// Exit status for a failed command: 2 for rejected input or missing records,
/// 3 when the database could not be reached, 1 for anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SchoolError>() {
        Some(
            SchoolError::Validation(_)
            | SchoolError::DuplicateKey { .. }
            | SchoolError::NotFound { .. },
        ) => 2,
        Some(SchoolError::StoreUnavailable { .. }) => 3,
        _ => 1,
    }
}
