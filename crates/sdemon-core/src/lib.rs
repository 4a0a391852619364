//! # sdemon-core - Core Domain Types
//!
//! Foundation crate for Server Demon. Provides domain types, error handling,
//! event definitions and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Compilation (`compilation`)
//! - [`CompilationResult`] - Normalized outcome of one build
//! - [`CompilationReport`] - What the terminal shows for a result
//! - [`BuildStats`] - Raw `(has_errors, report)` pair produced by a build engine
//!
//! ### Events (`events`)
//! - [`ChildEvent`] - Control-plane events from the managed server process
//! - [`BuildEvent`] - Watch-run / build-done notifications from a build engine
//! - [`StreamKind`] - Which child stream a log chunk came from
//!
//! ### Types (`types`)
//! - [`LifecycleState`] - Lifecycle of the single managed child
//! - [`Generation`] - Spawn counter identifying one child
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! ```rust
//! use sdemon_core::prelude::*;
//! ```

pub mod ansi;
pub mod compilation;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all Server Demon crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use ansi::{contains_ansi_codes, strip_ansi_codes, without_ansi_codes};
pub use compilation::{BuildStats, CompilationReport, CompilationResult};
pub use error::{Error, Result, ResultExt};
pub use events::{BuildEvent, ChildEvent, StreamKind};
pub use types::{Generation, LifecycleState};
