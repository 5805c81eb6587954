use clap::Parser;
use school_manager::cli::{self, CliArgs};
use school_manager::School;
use tempfile::TempDir;

/// Run one command line against `school`, returning stdout or the error.
fn run(school: &mut School, line: &str) -> anyhow::Result<String> {
    let args = CliArgs::try_parse_from(line.split_whitespace())?;
    let mut out = Vec::new();
    cli::run(school, args.command, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn school_with_data() -> School {
    let mut school = School::open_in_memory().unwrap();
    for line in [
        "school-cli student add S1 Ana 20 ana@example.com",
        "school-cli student add S2 Bea 21 bea@example.com",
        "school-cli instructor add I1 Ines 45 ines@school.edu",
        "school-cli course add C1 Algebra --instructor I1",
        "school-cli course add C2 Biology",
    ] {
        run(&mut school, line).unwrap();
    }
    school
}

#[test]
fn add_commands_confirm_the_record() {
    let mut school = School::open_in_memory().unwrap();
    let out = run(&mut school, "school-cli student add S1 Ana 20 ana@example.com").unwrap();
    assert_eq!(out, "Registered S1 - Ana.\n");

    let out = run(&mut school, "school-cli course add C1 Algebra").unwrap();
    assert_eq!(out, "Added C1 - Algebra.\n");
}

#[test]
fn enroll_and_show_student() {
    let mut school = school_with_data();
    let out = run(&mut school, "school-cli enroll S1 C1").unwrap();
    assert_eq!(out, "S1 enrolled in C1 - Algebra (Instructor: I1) (1 students).\n");

    let out = run(&mut school, "school-cli student show S1").unwrap();
    assert_eq!(
        out,
        "S1 - Ana\n  age:     20\n  email:   ana@example.com\n  courses: C1\n"
    );

    let out = run(&mut school, "school-cli course show C2").unwrap();
    assert_eq!(out, "C2 - Biology\n  students: -\n");
}

#[test]
fn update_and_list_with_filter() {
    let mut school = school_with_data();
    run(&mut school, "school-cli student update S2 --name Beatriz --age 22").unwrap();

    let out = run(&mut school, "school-cli student list --filter bea").unwrap();
    assert_eq!(out, "S2 - Beatriz\n");
    assert_eq!(school.student("S2").unwrap().email, "bea@example.com");
}

#[test]
fn assign_unassign_and_search() {
    let mut school = school_with_data();
    let out = run(&mut school, "school-cli assign I1 C2").unwrap();
    assert_eq!(out, "C2 - Biology (Instructor: I1)\n");
    let out = run(&mut school, "school-cli unassign C1").unwrap();
    assert_eq!(out, "C1 - Algebra\n");

    let out = run(&mut school, "school-cli search bio").unwrap();
    assert_eq!(out, "Course      C2 - Biology (Instructor: I1)\n");
    let out = run(&mut school, "school-cli search nobody").unwrap();
    assert_eq!(out, "No matches for \"nobody\".\n");
}

#[test]
fn failures_map_to_exit_codes() {
    let mut school = school_with_data();

    let err = run(&mut school, "school-cli student add S3 Cy abc cy@example.com").unwrap_err();
    assert_eq!(err.to_string(), "Invalid age: age must be an integer");
    assert_eq!(cli::exit_code(&err), 2);

    let err = run(&mut school, "school-cli student add S1 Ana 20 ana@example.com").unwrap_err();
    assert_eq!(err.to_string(), "Student S1 already exists.");
    assert_eq!(cli::exit_code(&err), 2);

    let err = run(&mut school, "school-cli unenroll S2 C2").unwrap_err();
    assert_eq!(cli::exit_code(&err), 2);

    let err = run(&mut school, "school-cli course show C404").unwrap_err();
    assert_eq!(err.to_string(), "Course C404 not found.");

    let missing = TempDir::new().unwrap().path().join("missing.json");
    let err = run(
        &mut school,
        &format!("school-cli import-json {}", missing.display()),
    )
    .unwrap_err();
    assert_eq!(cli::exit_code(&err), 1);
    // Nothing was replaced.
    assert_eq!(school.students(None).unwrap().len(), 2);
}

#[test]
fn export_and_import_json_round_trip() {
    let mut school = school_with_data();
    run(&mut school, "school-cli enroll S2 C2").unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("school.json");

    let out = run(&mut school, &format!("school-cli export-json {}", path.display())).unwrap();
    assert!(out.starts_with("Exported 2 students, 1 instructors, 2 courses"));

    let mut fresh = School::open_in_memory().unwrap();
    let out = run(&mut fresh, &format!("school-cli import-json {}", path.display())).unwrap();
    assert_eq!(
        out,
        "Imported 2 students, 1 instructors, 2 courses, 1 enrollments.\n"
    );
    assert_eq!(fresh.student("S2").unwrap().course_ids, vec!["C2"]);
}

#[test]
fn db_flag_is_global() {
    let args = CliArgs::try_parse_from([
        "school-cli",
        "course",
        "list",
        "--db",
        "/tmp/other.db",
        "--verbose",
    ])
    .unwrap();
    assert_eq!(args.db.unwrap().to_str(), Some("/tmp/other.db"));
    assert!(args.verbose);
}
