//! Core library surface for the School Manager.
//!
//! Both binaries (`school-tui` and `school-cli`) are thin shells over the
//! [`School`] facade exported here. The persistence functions in [`db`] stay
//! public so tooling can run them against a bare connection, but front-ends
//! are expected to go through the facade.
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod facade;
pub mod logging;
pub mod models;
pub mod ui;
pub mod validation;

pub use config::AppConfig;
pub use error::{EntityKind, Result, SchoolError};
pub use facade::School;

/// The domain types both front-ends manipulate.
pub use models::{Course, CourseChanges, Instructor, PersonChanges, SearchResults, Student};

pub use validation::{ValidationError, ValidationRules};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
