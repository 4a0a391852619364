//! sdemon-app - Supervisor state and orchestration for Server Demon
//!
//! This crate implements the TEA (The Elm Architecture) pattern for state
//! management, the process supervisor, the interactive controller, the
//! Engine that ties them to the build watcher, and configuration loading.

pub mod config;
pub mod controller;
pub mod engine;
pub mod engine_event;
pub mod handler;
pub mod input_key;
pub mod message;
pub mod signals;
pub mod state;
pub mod supervisor;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod watcher;

// Re-export primary types
pub use config::Settings;
pub use controller::{ControllerState, InteractiveController, KeyOutcome, ListenerState, MenuOption};
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use handler::{UpdateAction, UpdateResult};
pub use input_key::InputKey;
pub use message::Message;
pub use state::{AppPhase, AppState, BuildStatus};
pub use supervisor::{
    ManagedChild, ProcessLauncher, ProcessSupervisor, ServerLauncher, SupervisorOutcome,
};
pub use watcher::{CompilationWatcher, FirstCompilation};
