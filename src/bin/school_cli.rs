//! Scriptable front-end: one facade call per invocation.
use std::io;

use clap::Parser;
use school_manager::cli::{self, CliArgs};
use school_manager::logging::init_cli_logger;
use school_manager::{AppConfig, School};

fn main() {
    let args = CliArgs::parse();
    init_cli_logger(args.verbose);

    if let Err(err) = run(args) {
        tracing::error!("command failed: {err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(cli::exit_code(&err));
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = AppConfig::load()?.with_db_override(args.db);
    let mut school = School::open(&config)?;
    let stdout = io::stdout();
    cli::run(&mut school, args.command, &mut stdout.lock())
}
