//! Ratatui front-end. Three tabs (students, instructors, courses) share one
//! [`App`]; every change goes through the [`crate::School`] facade and the
//! lists are reloaded from the store afterwards.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
