//! Key event handling

use crate::controller::KeyOutcome;
use crate::engine_event::EngineEvent;
use crate::input_key::InputKey;
use crate::message::Message;
use crate::state::AppState;

use super::{UpdateAction, UpdateResult};

/// Route a key press through the interactive controller
pub fn handle_key(state: &mut AppState, key: InputKey) -> UpdateResult {
    match state.controller.handle_key(&key) {
        KeyOutcome::Ignored => UpdateResult::none(),
        KeyOutcome::Exit => UpdateResult::message(Message::Quit),
        KeyOutcome::MenuOpened { selected } => {
            UpdateResult::event(EngineEvent::MenuOpened { selected })
        }
        KeyOutcome::SelectionChanged { selected } => {
            UpdateResult::event(EngineEvent::MenuSelectionChanged { selected })
        }
        KeyOutcome::ShowStdout => UpdateResult::event(EngineEvent::MenuClosed),
        KeyOutcome::Restart => {
            UpdateResult::action(UpdateAction::Restart).with_event(EngineEvent::MenuClosed)
        }
    }
}
