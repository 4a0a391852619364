//! Test utilities for the supervisor and engine
//!
//! [`FakeLauncher`] stands in for real OS processes and records every launch,
//! hot update and kill so tests can check ordering and the single-child rule.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use sdemon_core::prelude::*;
use sdemon_core::Generation;

use crate::supervisor::{ManagedChild, ServerLauncher};

/// Everything a [`FakeLauncher`] observed
#[derive(Debug, Clone, Default)]
pub struct LaunchLog {
    pub launched: Vec<Generation>,
    pub hot_updates: Vec<Generation>,
    pub killed: Vec<Generation>,
    /// Children launched and not yet killed
    pub live: BTreeSet<Generation>,
    /// Largest number of live children ever observed
    pub max_live: usize,
    pending_failures: usize,
}

/// Launcher whose children are plain records
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    log: Arc<Mutex<LaunchLog>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` launches fail with `Error::ProcessSpawn`
    pub fn fail_next_launches(&self, count: usize) {
        if let Ok(mut log) = self.log.lock() {
            log.pending_failures = count;
        }
    }

    pub fn snapshot(&self) -> LaunchLog {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ServerLauncher for FakeLauncher {
    type Child = FakeChild;

    fn launch(&mut self, generation: Generation) -> Result<FakeChild> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| Error::process("launch log poisoned"))?;

        if log.pending_failures > 0 {
            log.pending_failures -= 1;
            return Err(Error::ProcessSpawn {
                reason: "simulated spawn failure".to_string(),
            });
        }

        log.launched.push(generation);
        log.live.insert(generation);
        log.max_live = log.max_live.max(log.live.len());

        Ok(FakeChild {
            generation,
            log: Arc::clone(&self.log),
        })
    }
}

/// A child that only exists in a [`LaunchLog`]
#[derive(Debug)]
pub struct FakeChild {
    generation: Generation,
    log: Arc<Mutex<LaunchLog>>,
}

impl FakeChild {
    fn record_kill(&self) {
        if let Ok(mut log) = self.log.lock() {
            if log.live.remove(&self.generation) {
                log.killed.push(self.generation);
            }
        }
    }
}

impl Drop for FakeChild {
    fn drop(&mut self) {
        // A released handle is no longer live, whether or not it was killed
        if let Ok(mut log) = self.log.lock() {
            log.live.remove(&self.generation);
        }
    }
}

impl ManagedChild for FakeChild {
    fn pid(&self) -> Option<u32> {
        u32::try_from(self.generation).ok().map(|g| 10_000 + g)
    }

    fn send_hot_update(&self) -> Result<()> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| Error::process("launch log poisoned"))?;
        log.hot_updates.push(self.generation);
        Ok(())
    }

    fn kill(&mut self) {
        self.record_kill();
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.record_kill();
        Ok(())
    }
}
