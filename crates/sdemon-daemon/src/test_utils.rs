//! Test utilities for daemon types
//!
//! Provides an in-memory [`LogSink`] and helpers for waiting on child events.

use std::sync::Mutex;
use std::time::Duration;

use sdemon_core::{strip_ansi_codes, ChildEvent, StreamKind};
use tokio::sync::mpsc;

use crate::log_filter::LogSink;

/// Collects every chunk written through a log pipeline
#[derive(Debug, Default)]
pub struct MemorySink {
    chunks: Mutex<Vec<(StreamKind, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all chunks written so far, ANSI codes included
    pub fn chunks(&self) -> Vec<(StreamKind, String)> {
        self.chunks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Written chunks with ANSI codes removed
    pub fn plain_texts(&self) -> Vec<String> {
        self.chunks()
            .into_iter()
            .map(|(_, text)| strip_ansi_codes(&text))
            .collect()
    }

    /// All written output as one plain string
    pub fn joined(&self) -> String {
        self.plain_texts().concat()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().map(|c| c.is_empty()).unwrap_or(true)
    }

    /// Poll until `needle` shows up in the output or `timeout` elapses
    pub async fn wait_for(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.joined().contains(needle) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl LogSink for MemorySink {
    fn write_chunk(&self, stream: StreamKind, text: &str) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push((stream, text.to_string()));
        }
    }
}

/// Receive events until an `Exited` arrives, returning everything seen.
///
/// Returns `None` if no exit was observed within `timeout`.
pub async fn collect_until_exit(
    rx: &mut mpsc::Receiver<ChildEvent>,
    timeout: Duration,
) -> Option<Vec<ChildEvent>> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv()).await.ok()??;
        let is_exit = matches!(event, ChildEvent::Exited { .. });
        seen.push(event);
        if is_exit {
            return Some(seen);
        }
    }
}
