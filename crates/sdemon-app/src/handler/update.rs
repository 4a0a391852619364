//! Main update function - handles state transitions (TEA pattern)

use sdemon_core::prelude::*;
use sdemon_core::{ChildEvent, CompilationReport, CompilationResult, Generation};
use sdemon_daemon::PauseReason;

use crate::engine_event::EngineEvent;
use crate::message::Message;
use crate::state::{AppPhase, AppState, BuildStatus};

use super::{keys::handle_key, UpdateAction, UpdateResult};

/// Process a message and update state
/// Returns optional follow-up message, action and events
pub fn update(state: &mut AppState, message: Message) -> UpdateResult {
    match message {
        Message::Quit => {
            state.phase = AppPhase::Quitting;
            UpdateResult::none()
        }

        Message::Key(key) => handle_key(state, key),

        Message::InputReady => {
            if state.controller.activate() {
                debug!("Interactive input enabled");
            }
            UpdateResult::none()
        }

        // ─────────────────────────────────────────────────────────
        // Build Messages
        // ─────────────────────────────────────────────────────────
        Message::CompilationStarted => {
            state.gate.hold(PauseReason::Compiling);
            state.build = BuildStatus::Compiling;
            UpdateResult::event(EngineEvent::CompilationStarted)
        }

        Message::CompilationFinished(result) => handle_compilation_finished(state, result),

        // ─────────────────────────────────────────────────────────
        // Server Messages
        // ─────────────────────────────────────────────────────────
        Message::Child(ChildEvent::Message { generation }) => {
            UpdateResult::action(UpdateAction::ChildMessage { generation })
        }

        Message::Child(ChildEvent::Exited { generation, code }) => {
            UpdateResult::action(UpdateAction::ChildExited { generation, code })
        }

        Message::ServerStarted { pid, generation } => {
            state.server.pid = pid;
            state.server.generation = generation;
            state.server.running = true;
            if state.controller.on_server_started() {
                debug!("Restart finished, back to passthrough");
            }
            UpdateResult::event(EngineEvent::ServerStarted { pid, generation })
        }

        Message::ServerExited { generation, code } => handle_server_exited(state, generation, code),

        Message::ServerError { reason } => {
            if state.controller.on_restart_failed() {
                debug!("Restart failed, back to passthrough");
            }
            UpdateResult::event(EngineEvent::ServerError { reason })
        }

        Message::RestartRejected { reason } => {
            state.controller.on_restart_failed();
            UpdateResult::event(EngineEvent::RestartRejected { reason })
        }
    }
}

fn handle_compilation_finished(state: &mut AppState, result: CompilationResult) -> UpdateResult {
    state.build_count += 1;
    if state.phase == AppPhase::Starting {
        state.phase = AppPhase::Running;
    }

    let report = CompilationReport::from(&result);
    state.build = BuildStatus::Finished(report.clone());
    let event = EngineEvent::CompilationFinished {
        report: report.clone(),
    };

    if let CompilationReport::Failed { error } = &report {
        // Logs stay paused so the error is the last thing on screen
        state.gate.hold(PauseReason::Compiling);
        warn!("Build failed: {}", error.lines().next().unwrap_or_default());
        return UpdateResult::event(event);
    }

    state.gate.release(PauseReason::Compiling);
    UpdateResult::action(UpdateAction::SignalHotUpdate).with_event(event)
}

fn handle_server_exited(state: &mut AppState, generation: Generation, code: Option<i32>) -> UpdateResult {
    if generation == state.server.generation {
        state.server.running = false;
        state.server.pid = None;
    }
    state.server.last_exit = Some(code);
    UpdateResult::event(EngineEvent::ServerExited { generation, code })
}
