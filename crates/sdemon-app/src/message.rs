//! Message types for the application (TEA pattern)

use crate::input_key::InputKey;
use sdemon_core::{ChildEvent, CompilationResult, Generation};

/// All possible messages/actions in the application
#[derive(Debug, Clone)]
pub enum Message {
    /// Keyboard event from terminal
    Key(InputKey),

    /// The first build settled and the key listener is running
    InputReady,

    // ─────────────────────────────────────────────────────────
    // Build Messages
    // ─────────────────────────────────────────────────────────
    /// A watch run started (files changed or initial build)
    CompilationStarted,

    /// A build finished
    CompilationFinished(CompilationResult),

    // ─────────────────────────────────────────────────────────
    // Server Messages
    // ─────────────────────────────────────────────────────────
    /// Control-plane event from a managed child
    Child(ChildEvent),

    /// A new server child is running
    ServerStarted {
        pid: Option<u32>,
        generation: Generation,
    },

    /// The current server exited on its own
    ServerExited {
        generation: Generation,
        code: Option<i32>,
    },

    /// Spawning or signalling the server failed
    ServerError { reason: String },

    /// An explicit restart was refused (one is already in progress)
    RestartRejected { reason: String },

    /// Quit now (Ctrl+C, signal handler)
    Quit,
}
