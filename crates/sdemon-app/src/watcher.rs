//! Compilation watcher - bridges a build engine into the message loop
//!
//! Subscribes to a [`BuildEngine`] and turns its events into
//! [`Message::CompilationStarted`] / [`Message::CompilationFinished`], in the
//! order the engine emitted them. The first finished build also resolves a
//! one-shot [`FirstCompilation`] that startup waits on.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use sdemon_core::prelude::*;
use sdemon_core::{BuildEvent, CompilationResult};
use sdemon_daemon::{BuildEngine, WatchSubscription};

use crate::message::Message;

/// Capacity of the build event channel
const BUILD_EVENT_CAPACITY: usize = 16;

/// Resolves once, with the outcome of the first build
#[derive(Debug)]
pub struct FirstCompilation {
    rx: oneshot::Receiver<Result<CompilationResult>>,
}

impl FirstCompilation {
    /// `Ok` for a build without errors, `Err(Error::Build)` otherwise.
    ///
    /// Fails with `ChannelClosed` if the watcher stopped before any build
    /// finished.
    pub async fn wait(self) -> Result<CompilationResult> {
        self.rx.await.map_err(|_| Error::ChannelClosed)?
    }
}

/// Running subscription to a build engine
pub struct CompilationWatcher {
    subscription: WatchSubscription,
    task: JoinHandle<()>,
}

impl CompilationWatcher {
    /// Subscribe to `engine` and forward its events to `msg_tx`.
    ///
    /// Errors from the engine itself (bad configuration, watcher setup) are
    /// returned here and are fatal to the caller.
    pub fn start<E: BuildEngine>(
        engine: E,
        msg_tx: mpsc::Sender<Message>,
    ) -> Result<(Self, FirstCompilation)> {
        let (build_tx, build_rx) = mpsc::channel(BUILD_EVENT_CAPACITY);
        let subscription = engine.watch(build_tx)?;
        let (first_tx, first_rx) = oneshot::channel();

        let task = tokio::spawn(forward_build_events(build_rx, msg_tx, first_tx));
        info!("Compilation watcher started");

        Ok((
            Self { subscription, task },
            FirstCompilation { rx: first_rx },
        ))
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active() && !self.task.is_finished()
    }

    /// Stop the underlying subscription and the forwarding task
    pub fn stop(&mut self) {
        if self.subscription.is_active() {
            debug!("Stopping compilation watcher");
        }
        self.subscription.stop();
        self.task.abort();
    }
}

impl Drop for CompilationWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn forward_build_events(
    mut build_rx: mpsc::Receiver<BuildEvent>,
    msg_tx: mpsc::Sender<Message>,
    first_tx: oneshot::Sender<Result<CompilationResult>>,
) {
    let mut first_tx = Some(first_tx);

    while let Some(event) = build_rx.recv().await {
        match event {
            BuildEvent::WatchRunStarted => {
                if msg_tx.send(Message::CompilationStarted).await.is_err() {
                    break;
                }
            }
            BuildEvent::Done(stats) => {
                let result = CompilationResult::from_stats(&stats);
                trace!(
                    "Build done: {} errors, {} warnings",
                    result.errors.len(),
                    result.warnings.len()
                );

                // The message goes first so the loop sees the build before startup resumes
                if msg_tx
                    .send(Message::CompilationFinished(result.clone()))
                    .await
                    .is_err()
                {
                    break;
                }

                if let Some(tx) = first_tx.take() {
                    let outcome = if result.has_errors {
                        let message = result
                            .errors
                            .first()
                            .cloned()
                            .unwrap_or_else(|| "first build failed".to_string());
                        Err(Error::build(message))
                    } else {
                        Ok(result)
                    };
                    let _ = tx.send(outcome);
                }
            }
        }
    }

    debug!("Build event stream ended");
}
