//! Core domain types for the managed server

use serde::{Deserialize, Serialize};

/// Monotonic counter identifying one spawned server process.
///
/// Every event coming from a child carries the generation it was spawned
/// with, so events from an already-replaced child can be told apart from
/// events of the current one.
pub type Generation = u64;

/// Lifecycle of the single managed server process.
///
/// `Absent → Starting → Running → Exiting → Absent`. A failed spawn goes
/// straight from `Starting` back to `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Absent,
    Starting,
    Running,
    Exiting,
}

impl LifecycleState {
    /// Whether a process currently occupies the server slot (port, etc.)
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Absent, Starting)
                | (Starting, Running)
                | (Starting, Absent)
                | (Running, Exiting)
                | (Running, Absent)
                | (Exiting, Absent)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Absent => write!(f, "absent"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Exiting => write!(f, "exiting"),
        }
    }
}
