//! Domain events emitted by the Engine for external consumers
//!
//! The terminal frontend renders these; anything else that wants to follow
//! the supervisor (tests, a future remote view) subscribes the same way via
//! `Engine::subscribe()`.

use crate::controller::MenuOption;
use sdemon_core::{CompilationReport, Generation};

/// Domain events emitted by the Engine.
///
/// Events are broadcast after each message processing cycle, so subscribers
/// see a consistent view of state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Build
    // ─────────────────────────────────────────────────────────
    /// A watch run started; logs are held until it succeeds
    CompilationStarted,

    /// A build finished, already reduced to what should be shown
    CompilationFinished { report: CompilationReport },

    // ─────────────────────────────────────────────────────────
    // Server Lifecycle
    // ─────────────────────────────────────────────────────────
    ServerStarted {
        pid: Option<u32>,
        generation: Generation,
    },

    /// The running server was sent a hot update
    HotUpdateSent { generation: Generation },

    /// An explicit restart killed the server; a new one follows its exit
    RestartStarted { generation: Generation },

    ServerExited {
        generation: Generation,
        code: Option<i32>,
    },

    ServerError { reason: String },

    RestartRejected { reason: String },

    // ─────────────────────────────────────────────────────────
    // Interactive Menu
    // ─────────────────────────────────────────────────────────
    MenuOpened { selected: MenuOption },

    MenuSelectionChanged { selected: MenuOption },

    MenuClosed,

    // ─────────────────────────────────────────────────────────
    // Status Line
    // ─────────────────────────────────────────────────────────
    /// The status line should show `text`
    StatusShown { text: String },

    /// The status line should be erased
    StatusCleared,

    // ─────────────────────────────────────────────────────────
    // Engine Lifecycle
    // ─────────────────────────────────────────────────────────
    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CompilationStarted => "compilation_started",
            Self::CompilationFinished { .. } => "compilation_finished",
            Self::ServerStarted { .. } => "server_started",
            Self::HotUpdateSent { .. } => "hot_update_sent",
            Self::RestartStarted { .. } => "restart_started",
            Self::ServerExited { .. } => "server_exited",
            Self::ServerError { .. } => "server_error",
            Self::RestartRejected { .. } => "restart_rejected",
            Self::MenuOpened { .. } => "menu_opened",
            Self::MenuSelectionChanged { .. } => "menu_selection_changed",
            Self::MenuClosed => "menu_closed",
            Self::StatusShown { .. } => "status_shown",
            Self::StatusCleared => "status_cleared",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_labels() {
        assert_eq!(EngineEvent::Shutdown.event_type(), "shutdown");
        assert_eq!(
            EngineEvent::CompilationFinished {
                report: CompilationReport::Success
            }
            .event_type(),
            "compilation_finished"
        );
        assert_eq!(
            EngineEvent::ServerExited {
                generation: 1,
                code: Some(0)
            }
            .event_type(),
            "server_exited"
        );
    }

    #[test]
    fn test_events_are_cloneable() {
        let event = EngineEvent::MenuOpened {
            selected: MenuOption::Restart,
        };
        assert_eq!(event.clone(), event);
    }
}
