//! Build outcome types
//!
//! A build engine reports each finished build as [`BuildStats`]: an error flag
//! plus a JSON report. [`CompilationResult`] is the normalized form the rest of
//! the application consumes, and [`CompilationReport`] is what ends up on the
//! terminal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback text when a build reports errors without any message
const UNKNOWN_BUILD_ERROR: &str = "Build reported errors but produced no error message";

/// Raw result of one build, as reported by a build engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    has_errors: bool,
    report: Value,
}

impl BuildStats {
    pub fn new(has_errors: bool, report: Value) -> Self {
        Self { has_errors, report }
    }

    /// Whether the engine considers this build failed
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// JSON report containing `errors` and `warnings` arrays
    pub fn to_json(&self) -> &Value {
        &self.report
    }
}

/// Normalized outcome of one completed build.
///
/// Immutable after creation; `errors` and `warnings` keep the order the build
/// engine reported them in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompilationResult {
    pub has_errors: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CompilationResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            has_errors: true,
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            has_errors: false,
            errors: Vec::new(),
            warnings,
        }
    }

    /// Extract a result from build stats.
    ///
    /// Entries of the `errors`/`warnings` arrays may be plain strings or
    /// objects carrying a `message` (and optionally a `moduleName`).
    pub fn from_stats(stats: &BuildStats) -> Self {
        let report = stats.to_json();
        let errors = extract_messages(report.get("errors"));
        let warnings = extract_messages(report.get("warnings"));

        Self {
            has_errors: stats.has_errors() || !errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A successful build is one the server may be (re)started from
    pub fn is_success(&self) -> bool {
        !self.has_errors
    }
}

fn extract_messages(entries: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(message) => Some(message.clone()),
            Value::Object(fields) => {
                let message = fields.get("message").and_then(Value::as_str)?;
                match fields.get("moduleName").and_then(Value::as_str) {
                    Some(module) => Some(format!("{}\n{}", module, message)),
                    None => Some(message.to_string()),
                }
            }
            _ => None,
        })
        .collect()
}

/// What the terminal shows for a finished build.
///
/// Only the first error is kept: later errors are almost always cascades of
/// the first. Warnings are shown only when there are no errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationReport {
    Success,
    Failed { error: String },
    Warnings { warnings: Vec<String> },
}

impl CompilationReport {
    pub fn from_result(result: &CompilationResult) -> Self {
        if let Some(first) = result.errors.first() {
            return Self::Failed {
                error: first.clone(),
            };
        }
        if result.has_errors {
            return Self::Failed {
                error: UNKNOWN_BUILD_ERROR.to_string(),
            };
        }
        if !result.warnings.is_empty() {
            return Self::Warnings {
                warnings: result.warnings.clone(),
            };
        }
        Self::Success
    }

    /// One-line summary shown next to the status symbol
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Success => "Compiled successfully!",
            Self::Failed { .. } => "Failed to compile.",
            Self::Warnings { .. } => "Compiled with warnings.",
        }
    }

    /// Message body printed below the headline, if any
    pub fn body(&self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::Failed { error } => Some(error.clone()),
            Self::Warnings { warnings } => Some(warnings.join("\n\n")),
        }
    }
}

impl From<&CompilationResult> for CompilationReport {
    fn from(result: &CompilationResult) -> Self {
        Self::from_result(result)
    }
}
