//! Handler module - TEA update function and event handlers
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch
//! - `keys`: Key event handling for the interactive controller

pub(crate) mod keys;
pub(crate) mod update;


use sdemon_core::Generation;

use crate::engine_event::EngineEvent;
use crate::message::Message;

// Re-export main entry point
pub use update::update;

/// Actions that the event loop should perform against the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    /// A build succeeded: hot update the running server or start one
    SignalHotUpdate,

    /// Explicit restart chosen from the menu
    Restart,

    /// A child asked to be replaced
    ChildMessage { generation: Generation },

    /// A child exited
    ChildExited {
        generation: Generation,
        code: Option<i32>,
    },
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message to process
    pub message: Option<Message>,
    /// Optional action for the event loop to perform
    pub action: Option<UpdateAction>,
    /// Events for subscribers, in order
    pub events: Vec<EngineEvent>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            ..Self::default()
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn event(event: EngineEvent) -> Self {
        Self {
            events: vec![event],
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: EngineEvent) -> Self {
        self.events.push(event);
        self
    }
}
