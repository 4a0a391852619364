//! Text for build reports and server notices

use crossterm::style::Stylize;

use sdemon_core::CompilationReport;

pub const COMPILING: &str = "Compiling...";

/// Headline plus body of a finished build
pub fn compilation_text(report: &CompilationReport, colored: bool) -> String {
    let headline = report.headline();
    let headline = match (report, colored) {
        (_, false) => headline.to_string(),
        (CompilationReport::Success, true) => headline.green().to_string(),
        (CompilationReport::Failed { .. }, true) => headline.red().to_string(),
        (CompilationReport::Warnings { .. }, true) => headline.yellow().to_string(),
    };

    match report.body() {
        Some(body) => format!("{}\n\n{}", headline, body),
        None => headline,
    }
}

pub fn compiling_text(colored: bool) -> String {
    if colored {
        COMPILING.dim().to_string()
    } else {
        COMPILING.to_string()
    }
}

/// Notice for a server that exited on its own
pub fn server_exit_text(code: Option<i32>) -> String {
    match code {
        Some(0) => "Server exited cleanly".to_string(),
        Some(code) => format!("Server exited with code {}", code),
        None => "Server exited (terminated by signal)".to_string(),
    }
}

pub fn server_error_text(reason: &str) -> String {
    format!("Server error: {}", reason)
}

pub fn restart_rejected_text(reason: &str) -> String {
    format!("Restart ignored: {}", reason)
}

pub const RESTARTING: &str = "Restarting server...";
