//! sdemon-tui - Terminal frontend for Server Demon
//!
//! Creates an Engine from sdemon-app and connects it to the terminal: server
//! output and build reports are printed in order, with the status line and
//! the interactive menu drawn below them.

pub mod event;
pub mod menu;
pub mod render;
pub mod report;
pub mod runner;
pub mod screen;
pub mod status_line;
pub mod terminal;

// Re-export main entry points
pub use runner::{run_with_project, RunOptions};
