//! Wire protocol between the supervisor and the managed server
//!
//! Messages are single lines wrapped in `[...]`, the same framing machine-mode
//! daemons use so control lines survive being mixed with ordinary output.
//!
//! - supervisor → server: [`HOT_UPDATE_LINE`] on stdin ("your build changed")
//! - server → supervisor: a bracketed JSON object carrying [`CONTROL_KEY`]
//!   on stdout ("replace me"), e.g. [`REPLACE_LINE`]
//!
//! Bracketed output without the key (`[]`, `[ 1 ]`, `["ok"]`) is log output.

use serde_json::Value;

/// Zero-payload hot update notification written to the server's stdin
pub const HOT_UPDATE_LINE: &str = "[{}]";

/// Key that marks a stdout line as a control message
pub const CONTROL_KEY: &str = "sdemon";

/// Canonical "ready to be replaced" line a server prints
pub const REPLACE_LINE: &str = r#"[{"sdemon":"replace"}]"#;

/// Strip the outer brackets from a protocol line
///
/// Returns the inner content if brackets are present.
pub fn strip_brackets(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// A message received from the managed server.
///
/// The payload is kept for logging only; the supervisor reacts to the fact
/// that a message arrived, never to its content.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildMessage {
    pub payload: Value,
}

impl ChildMessage {
    /// Parse a stdout line into a message.
    ///
    /// Returns `None` for ordinary log output: lines that merely start with
    /// `[` such as `[HMR] Updated modules: [3]`, and bracketed JSON that is
    /// not an object with [`CONTROL_KEY`].
    pub fn parse(line: &str) -> Option<Self> {
        let inner = strip_brackets(line)?;
        match serde_json::from_str::<Value>(inner).ok()? {
            Value::Object(map) if map.contains_key(CONTROL_KEY) => Some(Self {
                payload: Value::Object(map),
            }),
            _ => None,
        }
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        format!("message {}", self.payload)
    }
}
