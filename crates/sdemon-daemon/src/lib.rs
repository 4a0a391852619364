//! # sdemon-daemon - Server Process and Build Management
//!
//! Spawns and talks to the managed server process, filters and tags its log
//! output, and drives the external build in watch mode.
//!
//! Depends on [`sdemon_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Process Management
//! - [`ServerProcess`] - Spawn and manage the server child process
//! - [`ServerCommand`] - Program, entry, environment and passthrough arguments
//!
//! ### Protocol
//! - [`ChildMessage`] - Bracketed control message from the server
//! - [`REPLACE_LINE`] / [`CONTROL_KEY`] - "Ready to be replaced" marker from the server
//! - [`HOT_UPDATE_LINE`] - Hot update notification written to the server
//!
//! ### Log Pipeline
//! - [`LogGate`] - Shared pause flag; drops output while held
//! - [`LogTagger`] - Prefixes server output, highlights live-update lines
//! - [`LogPipeline`] / [`LogSink`] - Gate → tagger → terminal
//!
//! ### Build
//! - [`BuildEngine`] - Watch-mode build contract
//! - [`BuildConfig`] - Shared server build configuration
//! - [`CommandBuildEngine`] - Runs an external build command on source changes

pub mod build;
pub mod log_filter;
pub mod process;
pub mod protocol;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use build::{
    parse_build_output, BuildConfig, BuildEngine, BuildMode, CommandBuildEngine,
    ServerBuildOptions, StopSignal, WatchSubscription,
};
pub use log_filter::{
    LogGate, LogPipeline, LogSink, LogTagger, PauseReason, LIVE_UPDATE_MARKER, SERVER_TAG,
};
pub use process::{ServerCommand, ServerProcess};
pub use protocol::{ChildMessage, CONTROL_KEY, HOT_UPDATE_LINE, REPLACE_LINE};
