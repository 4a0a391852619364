//! Server log pipeline: gate → tagger → sink
//!
//! Both stdout and stderr of the managed server flow through the same
//! pipeline. The [`LogGate`] is the only admission point to the terminal:
//! while it is paused, chunks are dropped (never queued) so the menu or a
//! compile error owns the screen.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossterm::style::Stylize;
use sdemon_core::prelude::*;
use sdemon_core::StreamKind;

/// Marker printed by the server's hot-update runtime at the start of a line
pub const LIVE_UPDATE_MARKER: &str = "[HMR]";

/// Tag prepended to ordinary server output
pub const SERVER_TAG: &str = "[SERVER]";

/// Why the gate is being held closed.
///
/// Several holders can close the gate independently; it only reopens once
/// every hold has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// The interactive menu owns the terminal
    Menu,
    /// A build is running or its errors are on screen
    Compiling,
}

impl PauseReason {
    fn bit(self) -> u8 {
        match self {
            PauseReason::Menu => 0b01,
            PauseReason::Compiling => 0b10,
        }
    }
}

/// Shared pause flag for server log streams.
///
/// Cloning yields another handle to the same flag. Toggling takes effect for
/// the next chunk; a chunk already admitted is written in full.
#[derive(Debug, Clone, Default)]
pub struct LogGate {
    holds: Arc<AtomicU8>,
}

impl LogGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, reason: PauseReason) {
        let before = self.holds.fetch_or(reason.bit(), Ordering::AcqRel);
        if before == 0 {
            debug!("Log gate closed ({:?})", reason);
        }
    }

    pub fn release(&self, reason: PauseReason) {
        let before = self.holds.fetch_and(!reason.bit(), Ordering::AcqRel);
        if before == reason.bit() {
            debug!("Log gate opened ({:?} released)", reason);
        }
    }

    pub fn is_held(&self, reason: PauseReason) -> bool {
        self.holds.load(Ordering::Acquire) & reason.bit() != 0
    }

    pub fn is_paused(&self) -> bool {
        self.holds.load(Ordering::Acquire) != 0
    }

    /// Pass `chunk` through unchanged, or drop it while paused
    pub fn admit<'a>(&self, chunk: &'a str) -> Option<&'a str> {
        if self.is_paused() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Annotates server output with its origin.
#[derive(Debug, Clone, Copy)]
pub struct LogTagger {
    colored: bool,
}

impl Default for LogTagger {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LogTagger {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    /// Tag one chunk.
    ///
    /// Chunks starting with [`LIVE_UPDATE_MARKER`] came from the hot-update
    /// runtime: the marker is highlighted and nothing is prepended. Everything
    /// else gets the server tag. Fragments of one line are tagged separately.
    pub fn tag(&self, chunk: &str) -> String {
        if chunk.starts_with(LIVE_UPDATE_MARKER) {
            if !self.colored {
                return chunk.to_string();
            }
            let highlighted = LIVE_UPDATE_MARKER.cyan().to_string();
            return chunk.replace(LIVE_UPDATE_MARKER, &highlighted);
        }

        if self.colored {
            format!("{}: {}", SERVER_TAG.blue(), chunk)
        } else {
            format!("{}: {}", SERVER_TAG, chunk)
        }
    }
}

/// Destination for tagged server output
pub trait LogSink: Send + Sync {
    /// Write one tagged chunk. `text` ends with `\n`.
    fn write_chunk(&self, stream: StreamKind, text: &str);
}

/// The full gate → tagger → sink chain shared by both stream readers
#[derive(Clone)]
pub struct LogPipeline {
    gate: LogGate,
    tagger: LogTagger,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for LogPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPipeline")
            .field("gate", &self.gate)
            .field("tagger", &self.tagger)
            .finish_non_exhaustive()
    }
}

impl LogPipeline {
    pub fn new(gate: LogGate, tagger: LogTagger, sink: Arc<dyn LogSink>) -> Self {
        Self { gate, tagger, sink }
    }

    pub fn gate(&self) -> &LogGate {
        &self.gate
    }

    /// Push one chunk through the pipeline.
    ///
    /// Returns `true` if the chunk reached the sink.
    pub fn forward(&self, stream: StreamKind, chunk: &str) -> bool {
        let Some(admitted) = self.gate.admit(chunk) else {
            trace!("dropped {} chunk while paused", stream);
            return false;
        };

        let mut tagged = self.tagger.tag(admitted);
        tagged.push('\n');
        self.sink.write_chunk(stream, &tagged);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemorySink;
    use sdemon_core::strip_ansi_codes;

    fn pipeline(colored: bool) -> (LogPipeline, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let pipeline = LogPipeline::new(LogGate::new(), LogTagger::new(colored), sink.clone());
        (pipeline, sink)
    }

    #[test]
    fn test_gate_open_by_default() {
        let gate = LogGate::new();
        assert!(!gate.is_paused());
        assert_eq!(gate.admit("hello"), Some("hello"));
    }

    #[test]
    fn test_gate_drops_while_paused() {
        let gate = LogGate::new();
        gate.hold(PauseReason::Menu);
        assert!(gate.is_paused());
        assert_eq!(gate.admit("hello"), None);
    }

    #[test]
    fn test_gate_clones_share_state() {
        let gate = LogGate::new();
        let reader = gate.clone();
        gate.hold(PauseReason::Menu);
        assert!(reader.is_paused());
        gate.release(PauseReason::Menu);
        assert!(!reader.is_paused());
    }

    #[test]
    fn test_gate_reopens_only_when_all_holds_released() {
        let gate = LogGate::new();
        gate.hold(PauseReason::Compiling);
        gate.hold(PauseReason::Menu);

        gate.release(PauseReason::Menu);
        assert!(gate.is_paused());
        assert!(gate.is_held(PauseReason::Compiling));

        gate.release(PauseReason::Compiling);
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_release_without_hold_is_noop() {
        let gate = LogGate::new();
        gate.release(PauseReason::Menu);
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_tagger_prefixes_server_output() {
        let tagger = LogTagger::new(false);
        assert_eq!(tagger.tag("listening on :3000"), "[SERVER]: listening on :3000");
    }

    #[test]
    fn test_tagger_decorates_live_update_lines() {
        let tagger = LogTagger::new(true);
        let out = tagger.tag("[HMR] Updated modules: ./src/app.ts");

        assert!(!out.contains(SERVER_TAG));
        assert_eq!(
            strip_ansi_codes(&out),
            "[HMR] Updated modules: ./src/app.ts"
        );
    }

    #[test]
    fn test_tagger_marker_in_middle_is_tagged() {
        let tagger = LogTagger::new(false);
        assert_eq!(tagger.tag("saw [HMR] later"), "[SERVER]: saw [HMR] later");
    }

    #[test]
    fn test_tagger_colored_server_tag_keeps_content() {
        let tagger = LogTagger::new(true);
        let out = tagger.tag("GET / 200");
        assert_eq!(strip_ansi_codes(&out), "[SERVER]: GET / 200");
    }

    #[test]
    fn test_pipeline_passes_all_bytes_when_open() {
        let (pipeline, sink) = pipeline(true);
        let chunks = ["first", "second line", "[HMR] Hot update applied"];
        for chunk in chunks {
            assert!(pipeline.forward(StreamKind::Stdout, chunk));
        }

        let written = sink.plain_texts();
        assert_eq!(written.len(), 3);
        for (chunk, out) in chunks.iter().zip(&written) {
            assert!(out.contains(chunk), "{:?} missing from {:?}", chunk, out);
            assert!(out.ends_with('\n'));
        }
    }

    #[test]
    fn test_pipeline_drops_everything_while_paused() {
        let (pipeline, sink) = pipeline(true);
        pipeline.gate().hold(PauseReason::Menu);

        assert!(!pipeline.forward(StreamKind::Stdout, "hidden"));
        assert!(!pipeline.forward(StreamKind::Stderr, "also hidden"));
        assert!(sink.is_empty());

        pipeline.gate().release(PauseReason::Menu);
        assert!(pipeline.forward(StreamKind::Stderr, "visible"));
        assert_eq!(sink.plain_texts(), vec!["[SERVER]: visible\n".to_string()]);
    }

    #[test]
    fn test_pipeline_keeps_stream_kind() {
        let (pipeline, sink) = pipeline(false);
        pipeline.forward(StreamKind::Stderr, "boom");
        assert_eq!(sink.chunks()[0].0, StreamKind::Stderr);
    }
}
