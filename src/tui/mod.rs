//! Full-screen document view using Ratatui.

pub mod app;
pub mod events;
pub mod handler;
pub mod ui;

pub use handler::run_tui;
