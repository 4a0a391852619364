//! Engine-level supervision tests
//!
//! Drives a full [`Engine`] through its message channel with a build engine
//! fed by the test and a [`FakeLauncher`] standing in for server processes.
//!
//! Run with: cargo test --test supervision

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use sdemon_app::test_utils::FakeLauncher;
use sdemon_app::{Engine, EngineEvent, InputKey, Message, Settings};
use sdemon_core::prelude::*;
use sdemon_core::{BuildEvent, BuildStats, ChildEvent};
use sdemon_daemon::{BuildEngine, LogGate, StopSignal, WatchSubscription};

// ─────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────

/// Build engine whose builds are pushed by the test
struct FedEngine {
    rx: mpsc::Receiver<BuildEvent>,
}

impl BuildEngine for FedEngine {
    fn watch(self, tx: mpsc::Sender<BuildEvent>) -> Result<WatchSubscription> {
        let (subscription, stop) = WatchSubscription::channel();
        tokio::spawn(forward(self.rx, tx, stop));
        Ok(subscription)
    }
}

async fn forward(
    mut rx: mpsc::Receiver<BuildEvent>,
    tx: mpsc::Sender<BuildEvent>,
    mut stop: StopSignal,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            _ = stop.stopped() => break,
        }
    }
}

struct Harness {
    engine: Engine<FakeLauncher>,
    launcher: FakeLauncher,
    builds: mpsc::Sender<BuildEvent>,
    events: broadcast::Receiver<EngineEvent>,
}

impl Harness {
    /// Start the engine and complete the first (successful) build
    async fn started() -> Self {
        let launcher = FakeLauncher::new();
        let mut engine = Engine::with_launcher(
            PathBuf::from("/tmp/project"),
            Settings::default(),
            launcher.clone(),
            LogGate::new(),
            true,
        );
        let events = engine.subscribe();
        let (builds, rx) = mpsc::channel(16);
        let first = engine.start_build_watch(FedEngine { rx }).unwrap();

        let mut harness = Self {
            engine,
            launcher,
            builds,
            events,
        };
        harness.build(false, json!({})).await;
        first.wait().await.unwrap();
        harness.send(Message::InputReady);
        harness.drain_events();
        harness
    }

    /// Push one build cycle and process the resulting messages
    async fn build(&mut self, has_errors: bool, report: serde_json::Value) {
        self.builds.send(BuildEvent::WatchRunStarted).await.unwrap();
        self.builds
            .send(BuildEvent::Done(BuildStats::new(has_errors, report)))
            .await
            .unwrap();
        self.pump(2).await;
    }

    /// Receive and process `count` messages from the engine channel
    async fn pump(&mut self, count: usize) {
        for _ in 0..count {
            let msg = timeout(Duration::from_secs(2), self.engine.msg_rx.recv())
                .await
                .expect("timed out waiting for a message")
                .expect("message channel closed");
            self.engine.process_message(msg);
        }
    }

    fn send(&mut self, msg: Message) {
        self.engine.process_message(msg);
    }

    fn key(&mut self, key: InputKey) {
        self.send(Message::Key(key));
    }

    fn exit(&mut self, generation: u64, code: Option<i32>) {
        self.send(Message::Child(ChildEvent::Exited { generation, code }));
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

// ─────────────────────────────────────────────────────────
// Build cycle
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_build_starts_server_and_rebuilds_hot_update_it() {
    let mut h = Harness::started().await;
    assert_eq!(h.launcher.snapshot().launched, vec![1]);

    h.build(false, json!({})).await;
    h.build(false, json!({ "warnings": ["unused variable"] })).await;

    let log = h.launcher.snapshot();
    assert_eq!(log.launched, vec![1]);
    assert_eq!(log.hot_updates, vec![1, 1]);
}

#[tokio::test]
async fn test_failed_build_reports_first_error_and_sends_nothing() {
    let mut h = Harness::started().await;

    h.build(true, json!({ "errors": ["first", "second"] })).await;

    let events = h.drain_events();
    assert!(events.contains(&EngineEvent::CompilationFinished {
        report: sdemon_core::CompilationReport::Failed {
            error: "first".to_string()
        }
    }));
    assert!(h.launcher.snapshot().hot_updates.is_empty());
    assert!(h.engine.gate().is_paused());

    // The next good build resumes output and updates the running server
    h.build(false, json!({})).await;
    assert!(!h.engine.gate().is_paused());
    assert_eq!(h.launcher.snapshot().hot_updates, vec![1]);
}

#[tokio::test]
async fn test_crashed_server_is_started_by_next_good_build() {
    let mut h = Harness::started().await;
    h.exit(1, Some(1));
    assert!(!h.engine.state.server.running);

    h.build(false, json!({})).await;

    let log = h.launcher.snapshot();
    assert_eq!(log.launched, vec![1, 2]);
    assert!(log.hot_updates.is_empty());
    assert!(h.engine.state.server.running);
}

// ─────────────────────────────────────────────────────────
// Single child
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_at_most_one_child_through_restarts_and_replacements() {
    let mut h = Harness::started().await;

    // Menu restart: old child exits before the new one starts
    h.key(InputKey::Char(' '));
    h.key(InputKey::Enter);
    assert_eq!(h.launcher.snapshot().launched, vec![1]);
    h.exit(1, None);
    assert_eq!(h.launcher.snapshot().launched, vec![1, 2]);

    // Child-requested replacement
    h.send(Message::Child(ChildEvent::Message { generation: 2 }));
    assert_eq!(h.launcher.snapshot().launched, vec![1, 2, 3]);

    // Late events from replaced children change nothing
    h.exit(2, None);
    h.send(Message::Child(ChildEvent::Message { generation: 1 }));

    h.build(false, json!({})).await;

    let log = h.launcher.snapshot();
    assert_eq!(log.launched, vec![1, 2, 3]);
    assert_eq!(log.hot_updates, vec![3]);
    assert_eq!(log.max_live, 1);
    assert_eq!(h.engine.state.server.generation, 3);
}

#[tokio::test]
async fn test_keys_are_ignored_while_restart_is_pending() {
    let mut h = Harness::started().await;
    h.key(InputKey::Char('x'));
    h.key(InputKey::Char('1'));
    h.drain_events();

    // Keys are ignored while waiting, so a restart request can only come
    // from the menu once the server is back
    h.key(InputKey::Enter);
    assert!(h.drain_events().is_empty());

    h.exit(1, None);
    assert_eq!(h.launcher.snapshot().launched, vec![1, 2]);
    assert_eq!(h.launcher.snapshot().max_live, 1);
}

// ─────────────────────────────────────────────────────────
// Interactive controller
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_output_is_held_while_menu_is_open() {
    let mut h = Harness::started().await;
    assert!(!h.engine.gate().is_paused());

    h.key(InputKey::Char('m'));
    assert!(h.engine.gate().is_paused());

    // A rebuild while the menu is open still updates the server
    h.build(false, json!({})).await;
    assert!(h.engine.gate().is_paused());
    assert_eq!(h.launcher.snapshot().hot_updates, vec![1]);

    h.key(InputKey::Char('2'));
    assert!(!h.engine.gate().is_paused());
    assert!(h.drain_events().contains(&EngineEvent::MenuClosed));
}

#[tokio::test]
async fn test_menu_survives_repeated_open_close() {
    let mut h = Harness::started().await;

    for _ in 0..3 {
        h.key(InputKey::Char('a'));
        h.key(InputKey::Down);
        h.key(InputKey::Enter);
    }

    let controller = &h.engine.state.controller;
    assert_eq!(controller.attach_count(), 4);
    assert_eq!(controller.detach_count(), 3);
    assert!(!h.engine.gate().is_paused());
}

#[tokio::test]
async fn test_interrupt_quits_from_menu_and_stops_server() {
    let mut h = Harness::started().await;
    h.key(InputKey::Char('q'));

    h.key(InputKey::CharCtrl('c'));
    assert!(h.engine.should_quit());

    h.engine.shutdown().await;
    assert!(h.launcher.snapshot().live.is_empty());
    assert_eq!(h.drain_events().last(), Some(&EngineEvent::Shutdown));
}
