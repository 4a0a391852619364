//! Engine - orchestration state shared by the terminal runner and tests
//!
//! The Engine owns the message channel, the TEA state, the process
//! supervisor, the compilation watcher and the event broadcaster. Messages
//! are processed one at a time on the caller's task; supervisor outcomes are
//! fed back as follow-up messages within the same cycle.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use sdemon_core::prelude::*;
use sdemon_core::{ChildEvent, LifecycleState};
use sdemon_daemon::{
    BuildConfig, BuildEngine, CommandBuildEngine, LogGate, LogPipeline, LogSink, LogTagger,
};

use crate::config::Settings;
use crate::engine_event::EngineEvent;
use crate::handler::{self, UpdateAction};
use crate::message::Message;
use crate::signals;
use crate::state::AppState;
use crate::supervisor::{ProcessLauncher, ProcessSupervisor, ServerLauncher, SupervisorOutcome};
use crate::watcher::{CompilationWatcher, FirstCompilation};

/// Capacity of the unified message channel
const MESSAGE_CAPACITY: usize = 256;

/// Capacity of the child event channel
const CHILD_EVENT_CAPACITY: usize = 64;

/// Capacity of the engine event broadcaster
const EVENT_CAPACITY: usize = 256;

/// Lightweight snapshot of state for change detection.
///
/// Captured before message processing, compared after to detect
/// what changed and emit appropriate EngineEvents.
#[derive(Debug, Clone, PartialEq)]
struct StateSnapshot {
    status: Option<String>,
}

impl StateSnapshot {
    fn capture(state: &AppState) -> Self {
        Self {
            status: state.status_text(),
        }
    }
}

/// Orchestration engine for Server Demon.
pub struct Engine<L: ServerLauncher = ProcessLauncher> {
    /// TEA application state (the Model)
    pub state: AppState,

    /// Sender half of the unified message channel.
    /// Clone this to give to input sources (signal handler, key reader, watcher).
    pub msg_tx: mpsc::Sender<Message>,

    /// Receiver half of the unified message channel.
    pub msg_rx: mpsc::Receiver<Message>,

    supervisor: ProcessSupervisor<L>,

    build_config: BuildConfig,

    /// Subscription to the build engine, once started
    watcher: Option<CompilationWatcher>,

    /// Sender for the shutdown signal. Send `true` to stop background tasks.
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine<ProcessLauncher> {
    /// Create an Engine that runs real server processes.
    ///
    /// - Wires the log pipeline (gate, tagger, `sink`) into the launcher
    /// - Bridges child events into the message channel
    /// - Spawns the OS signal handler
    ///
    /// `extra_args` are passed to the server verbatim. Must be called from
    /// within a tokio runtime.
    pub fn new(
        project_path: PathBuf,
        settings: Settings,
        extra_args: Vec<String>,
        interactive: bool,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let build_config = settings.build_config(&project_path);
        let command = settings.server_command(&build_config, extra_args);
        debug!("Server command: {:?}", command.argv());

        let gate = LogGate::new();
        let pipeline = LogPipeline::new(gate.clone(), LogTagger::new(settings.ui.color), sink);
        let (child_tx, child_rx) = mpsc::channel::<ChildEvent>(CHILD_EVENT_CAPACITY);
        let launcher = ProcessLauncher::new(command, child_tx, pipeline);

        let engine = Self::with_launcher(project_path, settings, launcher, gate, interactive);

        spawn_child_event_bridge(child_rx, engine.msg_tx.clone(), engine.shutdown_rx.clone());
        signals::spawn_signal_handler(engine.msg_tx.clone());

        engine
    }

    /// Build engine running the configured build command
    pub fn command_build_engine(&self) -> Result<CommandBuildEngine> {
        CommandBuildEngine::new(self.build_config.clone())
    }
}

impl<L: ServerLauncher> Engine<L> {
    /// Create an Engine around an arbitrary launcher.
    ///
    /// `gate` must be the gate used by the launcher's log pipeline. No signal
    /// handler is installed.
    pub fn with_launcher(
        project_path: PathBuf,
        settings: Settings,
        launcher: L,
        gate: LogGate,
        interactive: bool,
    ) -> Self {
        let build_config = settings.build_config(&project_path);
        let state = AppState::new(project_path, settings, gate, interactive);
        let (msg_tx, msg_rx) = mpsc::channel::<Message>(MESSAGE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state,
            msg_tx,
            msg_rx,
            supervisor: ProcessSupervisor::new(launcher),
            build_config,
            watcher: None,
            shutdown_tx,
            shutdown_rx,
            event_tx,
        }
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind (buffer full), older events are
    /// dropped. Use `broadcast::error::RecvError::Lagged` to detect this.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Get a clone of the message sender for spawning input sources.
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    /// Get a clone of the shutdown receiver for background tasks.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn supervisor(&self) -> &ProcessSupervisor<L> {
        &self.supervisor
    }

    pub fn build_config(&self) -> &BuildConfig {
        &self.build_config
    }

    pub fn gate(&self) -> &LogGate {
        &self.state.gate
    }

    pub fn should_quit(&self) -> bool {
        self.state.should_quit()
    }

    /// Subscribe to `engine` and start forwarding its builds.
    ///
    /// Returns the one-shot outcome of the first build. Fails if the engine
    /// rejects its configuration.
    pub fn start_build_watch<E: BuildEngine>(&mut self, engine: E) -> Result<FirstCompilation> {
        if let Some(mut previous) = self.watcher.take() {
            warn!("Build watch already running; replacing it");
            previous.stop();
        }

        let (watcher, first) = CompilationWatcher::start(engine, self.msg_tx.clone())?;
        self.watcher = Some(watcher);
        Ok(first)
    }

    /// Process a single message through the TEA update cycle.
    ///
    /// Runs `handler::update()`, dispatches any resulting `UpdateAction` to
    /// the supervisor and processes follow-up messages until the cycle
    /// settles. Emits EngineEvents in order, then status line changes.
    pub fn process_message(&mut self, msg: Message) {
        let pre = StateSnapshot::capture(&self.state);

        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            trace!("Processing {:?}", msg);
            let result = handler::update(&mut self.state, msg);

            for event in result.events {
                self.emit(event);
            }
            if let Some(follow_up) = result.message {
                queue.push_back(follow_up);
            }
            if let Some(action) = result.action {
                if let Some(follow_up) = self.handle_action(action) {
                    queue.push_back(follow_up);
                }
            }
        }

        let post = StateSnapshot::capture(&self.state);
        self.emit_events(&pre, &post);
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Run one action against the supervisor, returning the follow-up message
    fn handle_action(&mut self, action: UpdateAction) -> Option<Message> {
        let result = match action {
            UpdateAction::SignalHotUpdate => self.supervisor.signal_hot_update(),
            UpdateAction::Restart => self.supervisor.restart(),
            UpdateAction::ChildMessage { generation } => {
                self.supervisor.on_child_message(generation)
            }
            UpdateAction::ChildExited { generation, code } => {
                self.supervisor.on_child_exit(generation, code)
            }
        };

        if self.supervisor.state() == LifecycleState::Absent {
            self.state.server.running = false;
            self.state.server.pid = None;
        }

        match result {
            Ok(outcome) => self.handle_outcome(outcome),
            Err(e @ Error::RestartInProgress) => {
                debug!("Restart rejected: {}", e);
                Some(Message::RestartRejected {
                    reason: e.to_string(),
                })
            }
            Err(e) => Some(Message::ServerError {
                reason: e.to_string(),
            }),
        }
    }

    fn handle_outcome(&self, outcome: SupervisorOutcome) -> Option<Message> {
        match outcome {
            SupervisorOutcome::Spawned { pid, generation } => {
                Some(Message::ServerStarted { pid, generation })
            }
            SupervisorOutcome::Exited { generation, code } => {
                Some(Message::ServerExited { generation, code })
            }
            SupervisorOutcome::HotUpdateSent { generation } => {
                self.emit(EngineEvent::HotUpdateSent { generation });
                None
            }
            SupervisorOutcome::RestartPending { generation } => {
                self.emit(EngineEvent::RestartStarted { generation });
                None
            }
            SupervisorOutcome::Killed { .. } | SupervisorOutcome::Ignored => None,
        }
    }

    /// Initiate shutdown: stop the build watch, signal background tasks,
    /// kill the server and wait for it.
    pub async fn shutdown(&mut self) {
        self.emit(EngineEvent::Shutdown);

        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }

        let _ = self.shutdown_tx.send(true);

        match self.supervisor.shutdown().await {
            Ok(SupervisorOutcome::Killed { generation }) => {
                info!("Server generation {} stopped", generation)
            }
            Ok(_) => {}
            Err(e) => warn!("Server shutdown failed: {}", e),
        }
        self.state.server.running = false;
    }

    /// Emit status line changes detected between snapshots
    fn emit_events(&self, pre: &StateSnapshot, post: &StateSnapshot) {
        if pre.status == post.status {
            return;
        }
        match &post.status {
            Some(text) => self.emit(EngineEvent::StatusShown { text: text.clone() }),
            None => self.emit(EngineEvent::StatusCleared),
        }
    }

    /// Emit a single EngineEvent to all subscribers.
    ///
    /// send() returns Err only if there are no receivers -- that's fine.
    fn emit(&self, event: EngineEvent) {
        trace!("EngineEvent: {}", event.event_type());
        let _ = self.event_tx.send(event);
    }
}

/// Forward child events into the message loop until shutdown
fn spawn_child_event_bridge(
    mut child_rx: mpsc::Receiver<ChildEvent>,
    msg_tx: mpsc::Sender<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = child_rx.recv() => {
                    let Some(event) = event else { break };
                    if msg_tx.send(Message::Child(event)).await.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Child event bridge stopped");
    });
}
