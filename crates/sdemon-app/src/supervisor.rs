//! Process supervisor - owns the single managed server
//!
//! Decides when to spawn, signal or kill the server in response to build
//! completions, child messages, child exits and explicit restarts. At most
//! one child handle is held at any time, and every child is tagged with a
//! generation so events from an already-replaced child are ignored.
//!
//! ```text
//! Absent ──spawn──▶ Starting ──ok──▶ Running ──restart──▶ Exiting
//!   ▲                  │                │                    │
//!   └────spawn error───┘   exit/replace─┘         exit event─┘ (respawn)
//! ```

use tokio::sync::mpsc;

use sdemon_core::prelude::*;
use sdemon_core::{ChildEvent, Generation, LifecycleState};
use sdemon_daemon::{LogPipeline, ServerCommand, ServerProcess};

/// A running server as seen by the supervisor
#[trait_variant::make(ManagedChild: Send)]
pub trait LocalManagedChild {
    fn pid(&self) -> Option<u32>;

    /// Notify the child that a new build is ready
    fn send_hot_update(&self) -> Result<()>;

    /// Request termination; the exit arrives later as a child event
    fn kill(&mut self);

    /// Kill and wait for the exit
    async fn shutdown(&mut self) -> Result<()>;
}

/// Starts server processes for the supervisor
pub trait ServerLauncher: Send {
    type Child: ManagedChild;

    fn launch(&mut self, generation: Generation) -> Result<Self::Child>;
}

impl ManagedChild for ServerProcess {
    fn pid(&self) -> Option<u32> {
        self.id()
    }

    fn send_hot_update(&self) -> Result<()> {
        ServerProcess::send_hot_update(self)
    }

    fn kill(&mut self) {
        ServerProcess::kill(self)
    }

    async fn shutdown(&mut self) -> Result<()> {
        ServerProcess::shutdown(self).await
    }
}

/// Launches real OS processes
pub struct ProcessLauncher {
    command: ServerCommand,
    event_tx: mpsc::Sender<ChildEvent>,
    pipeline: LogPipeline,
}

impl ProcessLauncher {
    pub fn new(
        command: ServerCommand,
        event_tx: mpsc::Sender<ChildEvent>,
        pipeline: LogPipeline,
    ) -> Self {
        Self {
            command,
            event_tx,
            pipeline,
        }
    }

    pub fn command(&self) -> &ServerCommand {
        &self.command
    }
}

impl ServerLauncher for ProcessLauncher {
    type Child = ServerProcess;

    fn launch(&mut self, generation: Generation) -> Result<ServerProcess> {
        ServerProcess::spawn(
            &self.command,
            generation,
            self.event_tx.clone(),
            self.pipeline.clone(),
        )
    }
}

/// What a supervisor operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// A new child is running
    Spawned {
        pid: Option<u32>,
        generation: Generation,
    },
    /// The running child was told about a new build
    HotUpdateSent { generation: Generation },
    /// The child was killed; a replacement spawns once its exit is observed
    RestartPending { generation: Generation },
    /// The current child exited on its own
    Exited {
        generation: Generation,
        code: Option<i32>,
    },
    /// The child was killed during shutdown
    Killed { generation: Generation },
    /// Nothing to do (stale event or already handled)
    Ignored,
}

/// Owns the managed server and its lifecycle state
pub struct ProcessSupervisor<L: ServerLauncher> {
    launcher: L,
    state: LifecycleState,
    current: Option<L::Child>,
    /// Generation of the most recent spawn attempt
    generation: Generation,
    /// Set by `restart()` while waiting for the old child's exit
    respawn_pending: bool,
}

impl<L: ServerLauncher> ProcessSupervisor<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            state: LifecycleState::Absent,
            current: None,
            generation: 0,
            respawn_pending: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(ManagedChild::pid)
    }

    pub fn is_respawn_pending(&self) -> bool {
        self.respawn_pending
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    fn transition(&mut self, next: LifecycleState) {
        if !self.state.can_transition_to(next) {
            warn!("Unexpected server transition {} -> {}", self.state, next);
        }
        trace!("server {} -> {}", self.state, next);
        self.state = next;
    }

    /// Start a new child. Only legal while no child is held.
    pub fn spawn_child(&mut self) -> Result<SupervisorOutcome> {
        if self.state != LifecycleState::Absent {
            warn!("Spawn requested while server is {}; ignoring", self.state);
            return Ok(SupervisorOutcome::Ignored);
        }

        self.transition(LifecycleState::Starting);
        self.generation += 1;
        let generation = self.generation;

        match self.launcher.launch(generation) {
            Ok(child) => {
                let pid = ManagedChild::pid(&child);
                self.current = Some(child);
                self.transition(LifecycleState::Running);
                info!("Server generation {} running (pid {:?})", generation, pid);
                Ok(SupervisorOutcome::Spawned { pid, generation })
            }
            Err(e) => {
                self.transition(LifecycleState::Absent);
                error!("Failed to start server: {}", e);
                Err(e)
            }
        }
    }

    /// React to a successful build.
    ///
    /// A running child gets the hot update message; with no child one is
    /// spawned. While a restart is pending this does nothing, the respawn
    /// picks up the new build.
    pub fn signal_hot_update(&mut self) -> Result<SupervisorOutcome> {
        match self.state {
            LifecycleState::Running => {
                let Some(child) = self.current.as_ref() else {
                    return Err(Error::process("running server has no handle"));
                };
                ManagedChild::send_hot_update(child)?;
                debug!("Hot update sent to generation {}", self.generation);
                Ok(SupervisorOutcome::HotUpdateSent {
                    generation: self.generation,
                })
            }
            LifecycleState::Absent => self.spawn_child(),
            LifecycleState::Starting | LifecycleState::Exiting => {
                debug!("Hot update skipped while server is {}", self.state);
                Ok(SupervisorOutcome::Ignored)
            }
        }
    }

    /// The child asked to be replaced (e.g. it could not apply an update).
    ///
    /// The current child is killed without waiting and a replacement is
    /// spawned right away. Messages from replaced children are ignored.
    pub fn on_child_message(&mut self, generation: Generation) -> Result<SupervisorOutcome> {
        if generation != self.generation || self.state != LifecycleState::Running {
            debug!(
                "Ignoring message from generation {} (current {}, {})",
                generation, self.generation, self.state
            );
            return Ok(SupervisorOutcome::Ignored);
        }

        info!("Server generation {} requested replacement", generation);
        if let Some(mut child) = self.current.take() {
            ManagedChild::kill(&mut child);
        }
        self.transition(LifecycleState::Absent);
        self.spawn_child()
    }

    /// Explicit restart: kill, wait for the exit, then spawn.
    ///
    /// Rejected with [`Error::RestartInProgress`] while a previous restart has
    /// not finished.
    pub fn restart(&mut self) -> Result<SupervisorOutcome> {
        match self.state {
            LifecycleState::Running => {
                if let Some(child) = self.current.as_mut() {
                    ManagedChild::kill(child);
                }
                self.respawn_pending = true;
                self.transition(LifecycleState::Exiting);
                info!("Restarting server generation {}", self.generation);
                Ok(SupervisorOutcome::RestartPending {
                    generation: self.generation,
                })
            }
            LifecycleState::Absent => self.spawn_child(),
            LifecycleState::Starting | LifecycleState::Exiting => Err(Error::RestartInProgress),
        }
    }

    /// The OS reaped a child.
    pub fn on_child_exit(
        &mut self,
        generation: Generation,
        code: Option<i32>,
    ) -> Result<SupervisorOutcome> {
        if generation != self.generation || self.state == LifecycleState::Absent {
            debug!(
                "Ignoring exit of generation {} (current {}, {})",
                generation, self.generation, self.state
            );
            return Ok(SupervisorOutcome::Ignored);
        }

        self.current = None;
        let respawn = std::mem::take(&mut self.respawn_pending);
        self.transition(LifecycleState::Absent);

        if respawn {
            debug!("Generation {} exited, spawning replacement", generation);
            return self.spawn_child();
        }

        match code {
            Some(0) => info!("Server generation {} exited cleanly", generation),
            other => warn!("Server generation {} failed: exit {:?}", generation, other),
        }
        Ok(SupervisorOutcome::Exited { generation, code })
    }

    /// Kill the current child and wait for it to exit
    pub async fn shutdown(&mut self) -> Result<SupervisorOutcome> {
        self.respawn_pending = false;
        let Some(mut child) = self.current.take() else {
            self.state = LifecycleState::Absent;
            return Ok(SupervisorOutcome::Ignored);
        };

        let generation = self.generation;
        let result = ManagedChild::shutdown(&mut child).await;
        self.state = LifecycleState::Absent;
        result?;
        Ok(SupervisorOutcome::Killed { generation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeLauncher;

    fn supervisor() -> (ProcessSupervisor<FakeLauncher>, FakeLauncher) {
        let launcher = FakeLauncher::new();
        (ProcessSupervisor::new(launcher.clone()), launcher)
    }

    #[test]
    fn test_starts_absent() {
        let (sup, _) = supervisor();
        assert_eq!(sup.state(), LifecycleState::Absent);
        assert_eq!(sup.generation(), 0);
        assert_eq!(sup.current_pid(), None);
    }

    #[test]
    fn test_child_handle_reached_through_trait() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();
        assert_eq!(sup.current_pid(), Some(10_001));

        sup.signal_hot_update().unwrap();
        sup.restart().unwrap();
        sup.on_child_exit(1, None).unwrap();
        sup.on_child_message(2).unwrap();

        let log = launcher.snapshot();
        assert_eq!(log.hot_updates, vec![1]);
        assert_eq!(log.killed, vec![1, 2]);
        assert_eq!(sup.current_pid(), Some(10_003));
    }

    #[test]
    fn test_first_hot_update_spawns() {
        let (mut sup, launcher) = supervisor();
        let outcome = sup.signal_hot_update().unwrap();

        assert!(matches!(
            outcome,
            SupervisorOutcome::Spawned { generation: 1, .. }
        ));
        assert_eq!(sup.state(), LifecycleState::Running);
        assert_eq!(launcher.snapshot().launched, vec![1]);
    }

    #[test]
    fn test_hot_update_is_idempotent_for_running_child() {
        let (mut sup, launcher) = supervisor();
        sup.signal_hot_update().unwrap();

        for _ in 0..3 {
            assert_eq!(
                sup.signal_hot_update().unwrap(),
                SupervisorOutcome::HotUpdateSent { generation: 1 }
            );
        }

        let log = launcher.snapshot();
        assert_eq!(log.launched, vec![1]);
        assert_eq!(log.hot_updates, vec![1, 1, 1]);
        assert!(log.killed.is_empty());
    }

    #[test]
    fn test_child_message_replaces_child() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();

        let outcome = sup.on_child_message(1).unwrap();
        assert!(matches!(
            outcome,
            SupervisorOutcome::Spawned { generation: 2, .. }
        ));

        let log = launcher.snapshot();
        assert_eq!(log.killed, vec![1]);
        assert_eq!(log.launched, vec![1, 2]);
        assert_eq!(log.max_live, 1);
    }

    #[test]
    fn test_stale_child_message_ignored() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();
        sup.on_child_message(1).unwrap();

        // A second message from the replaced child must not spawn again
        assert_eq!(sup.on_child_message(1).unwrap(), SupervisorOutcome::Ignored);
        assert_eq!(launcher.snapshot().launched, vec![1, 2]);
    }

    #[test]
    fn test_stale_exit_ignored_after_replacement() {
        let (mut sup, _) = supervisor();
        sup.spawn_child().unwrap();
        sup.on_child_message(1).unwrap();

        assert_eq!(
            sup.on_child_exit(1, None).unwrap(),
            SupervisorOutcome::Ignored
        );
        assert_eq!(sup.state(), LifecycleState::Running);
        assert_eq!(sup.generation(), 2);
    }

    #[test]
    fn test_restart_waits_for_exit_before_spawning() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();

        assert_eq!(
            sup.restart().unwrap(),
            SupervisorOutcome::RestartPending { generation: 1 }
        );
        assert_eq!(sup.state(), LifecycleState::Exiting);
        assert!(sup.is_respawn_pending());
        assert_eq!(launcher.snapshot().launched, vec![1]);

        let outcome = sup.on_child_exit(1, None).unwrap();
        assert!(matches!(
            outcome,
            SupervisorOutcome::Spawned { generation: 2, .. }
        ));
        assert!(!sup.is_respawn_pending());

        let log = launcher.snapshot();
        assert_eq!(log.launched, vec![1, 2]);
        assert_eq!(log.max_live, 1);
    }

    #[test]
    fn test_restart_while_absent_spawns_immediately() {
        let (mut sup, _) = supervisor();
        let outcome = sup.restart().unwrap();
        assert!(matches!(outcome, SupervisorOutcome::Spawned { .. }));
    }

    #[test]
    fn test_concurrent_restart_rejected() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();
        sup.restart().unwrap();

        let err = sup.restart().unwrap_err();
        assert!(matches!(err, Error::RestartInProgress));
        assert_eq!(launcher.snapshot().killed, vec![1]);
    }

    #[test]
    fn test_hot_update_during_restart_is_noop() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();
        sup.restart().unwrap();

        assert_eq!(sup.signal_hot_update().unwrap(), SupervisorOutcome::Ignored);
        assert!(launcher.snapshot().hot_updates.is_empty());
    }

    #[test]
    fn test_exit_without_pending_restart_stays_absent() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();

        assert_eq!(
            sup.on_child_exit(1, Some(1)).unwrap(),
            SupervisorOutcome::Exited {
                generation: 1,
                code: Some(1)
            }
        );
        assert_eq!(sup.state(), LifecycleState::Absent);
        assert_eq!(launcher.snapshot().launched, vec![1]);
    }

    #[test]
    fn test_next_build_after_crash_spawns() {
        let (mut sup, _) = supervisor();
        sup.spawn_child().unwrap();
        sup.on_child_exit(1, Some(0)).unwrap();

        let outcome = sup.signal_hot_update().unwrap();
        assert!(matches!(
            outcome,
            SupervisorOutcome::Spawned { generation: 2, .. }
        ));
    }

    #[test]
    fn test_spawn_failure_returns_to_absent() {
        let (mut sup, launcher) = supervisor();
        launcher.fail_next_launches(1);

        let err = sup.signal_hot_update().unwrap_err();
        assert!(matches!(err, Error::ProcessSpawn { .. }));
        assert_eq!(sup.state(), LifecycleState::Absent);

        // The next attempt succeeds with a fresh generation
        let outcome = sup.signal_hot_update().unwrap();
        assert!(matches!(
            outcome,
            SupervisorOutcome::Spawned { generation: 2, .. }
        ));
    }

    #[test]
    fn test_spawn_while_running_ignored() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();
        assert_eq!(sup.spawn_child().unwrap(), SupervisorOutcome::Ignored);
        assert_eq!(launcher.snapshot().launched, vec![1]);
    }

    #[test]
    fn test_single_child_over_mixed_sequence() {
        let (mut sup, launcher) = supervisor();
        sup.signal_hot_update().unwrap();
        sup.signal_hot_update().unwrap();
        sup.on_child_message(1).unwrap();
        sup.restart().unwrap();
        let _ = sup.restart();
        sup.signal_hot_update().unwrap();
        sup.on_child_exit(2, None).unwrap();
        sup.on_child_message(3).unwrap();
        sup.on_child_exit(3, Some(0)).unwrap();

        let log = launcher.snapshot();
        assert_eq!(log.max_live, 1);
        assert_eq!(log.launched, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_shutdown_kills_current_child() {
        let (mut sup, launcher) = supervisor();
        sup.spawn_child().unwrap();

        assert_eq!(
            sup.shutdown().await.unwrap(),
            SupervisorOutcome::Killed { generation: 1 }
        );
        assert_eq!(sup.state(), LifecycleState::Absent);
        assert_eq!(launcher.snapshot().killed, vec![1]);

        assert_eq!(sup.shutdown().await.unwrap(), SupervisorOutcome::Ignored);
    }
}
