//! Binary entry point for the terminal UI: resolve configuration, open the
//! store through the facade, and drive the Ratatui event loop until the user
//! exits.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use school_manager::logging::init_tui_logger;
use school_manager::{run_app, App, AppConfig, School};

#[derive(Parser, Debug)]
#[command(name = "school-tui")]
#[command(about = "Interactive manager for students, instructors and courses")]
struct Args {
    /// Database file (defaults to ~/.school-manager/school.db)
    #[arg(long, env = "SCHOOL_DB")]
    db: Option<PathBuf>,
}

/// Fatal start-up problems (an unreadable config, a database that cannot be
/// created) are reported on the terminal before the alternate screen opens.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load()?.with_db_override(args.db);

    let db_path = config.resolve_db_path()?;
    init_tui_logger(&db_path.with_file_name("school-tui.log"))?;
    tracing::info!(db = %db_path.display(), "starting school-tui");

    let school = School::open(&config)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let mut app = App::new(school)?;
    run_app(&mut app)
}
