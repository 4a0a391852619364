//! Application state (Model in TEA pattern)

use std::path::PathBuf;

use sdemon_core::{CompilationReport, Generation};
use sdemon_daemon::LogGate;

use crate::config::Settings;
use crate::controller::InteractiveController;

/// Overall phase of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppPhase {
    /// Waiting for the first build
    #[default]
    Starting,
    /// First build done; normal operation
    Running,
    Quitting,
}

/// Outcome of the most recent build
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildStatus {
    #[default]
    Idle,
    Compiling,
    Finished(CompilationReport),
}

impl BuildStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, BuildStatus::Finished(CompilationReport::Failed { .. }))
    }
}

/// What the parent last heard about the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerInfo {
    pub pid: Option<u32>,
    pub generation: Generation,
    pub running: bool,
    /// Exit code of the last exit, `None` inside means "killed by a signal"
    pub last_exit: Option<Option<i32>>,
}

/// Complete application state (the Model in TEA)
#[derive(Debug)]
pub struct AppState {
    pub phase: AppPhase,
    pub build: BuildStatus,
    pub server: ServerInfo,
    pub controller: InteractiveController,
    /// Shared with the log pipeline of every child
    pub gate: LogGate,
    pub project_path: PathBuf,
    pub settings: Settings,
    /// Number of finished builds
    pub build_count: u32,
}

impl AppState {
    pub fn new(project_path: PathBuf, settings: Settings, gate: LogGate, interactive: bool) -> Self {
        let enabled = interactive && settings.ui.interactive;
        Self {
            phase: AppPhase::Starting,
            build: BuildStatus::Idle,
            server: ServerInfo::default(),
            controller: InteractiveController::new(gate.clone(), enabled),
            gate,
            project_path,
            settings,
            build_count: 0,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.phase == AppPhase::Quitting
    }

    /// Text for the status line, or `None` when it should not be on screen
    pub fn status_text(&self) -> Option<String> {
        if !self.controller.shows_status() {
            return None;
        }

        let hint = "Press any key for options, Ctrl+C to quit.";
        let text = if self.build.is_failed() {
            format!("Waiting for a successful build. {}", hint)
        } else if self.server.running {
            match self.server.pid {
                Some(pid) => format!("Server running (pid {}). {}", pid, hint),
                None => format!("Server running. {}", hint),
            }
        } else {
            format!("Server stopped. {}", hint)
        };
        Some(text)
    }
}
