//! Interactive controller - passthrough vs. menu over keyboard input
//!
//! In passthrough the key listener is attached and server logs stream to the
//! terminal. Any key opens the menu: the gate takes the `Menu` hold and the
//! listener is detached until the chosen action has finished. Every path out
//! of the menu reattaches exactly once.

use sdemon_core::prelude::*;
use sdemon_daemon::{LogGate, PauseReason};

use crate::input_key::InputKey;

/// Entries of the interactive menu, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    Restart,
    ShowStdout,
}

impl MenuOption {
    pub const ALL: [MenuOption; 2] = [MenuOption::Restart, MenuOption::ShowStdout];

    pub fn label(&self) -> &'static str {
        match self {
            MenuOption::Restart => "Restart",
            MenuOption::ShowStdout => "Show stdout",
        }
    }

    fn index(&self) -> usize {
        match self {
            MenuOption::Restart => 0,
            MenuOption::ShowStdout => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(&self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Passthrough,
    /// Menu on screen, listener detached
    Menu { selected: MenuOption },
    /// "Restart" chosen; waiting for the new server before reattaching
    AwaitingRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    Attached,
    #[default]
    Detached,
}

/// What a key press did to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    /// Quit right away
    Exit,
    MenuOpened { selected: MenuOption },
    SelectionChanged { selected: MenuOption },
    /// Menu closed, logs stream again
    ShowStdout,
    /// Menu closed, a restart must be issued
    Restart,
}

/// Keyboard state machine
#[derive(Debug)]
pub struct InteractiveController {
    state: ControllerState,
    listener: ListenerState,
    attach_count: u32,
    detach_count: u32,
    gate: LogGate,
    enabled: bool,
    active: bool,
}

impl InteractiveController {
    /// `enabled` is false when stdin is not a terminal or input is disabled
    pub fn new(gate: LogGate, enabled: bool) -> Self {
        Self {
            state: ControllerState::Passthrough,
            listener: ListenerState::Detached,
            attach_count: 0,
            detach_count: 0,
            gate,
            enabled,
            active: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn listener(&self) -> ListenerState {
        self.listener
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count
    }

    pub fn detach_count(&self) -> u32 {
        self.detach_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether key input is being handled at all
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the status line belongs on screen
    pub fn shows_status(&self) -> bool {
        self.active && self.state == ControllerState::Passthrough
    }

    /// Start listening once the first build has completed.
    ///
    /// Returns `false` if input is disabled or listening already started.
    pub fn activate(&mut self) -> bool {
        if !self.enabled || self.active {
            return false;
        }
        self.active = true;
        self.state = ControllerState::Passthrough;
        self.attach();
        true
    }

    pub fn attach(&mut self) {
        if self.listener == ListenerState::Attached {
            warn!("Key listener already attached");
            return;
        }
        self.listener = ListenerState::Attached;
        self.attach_count += 1;
    }

    pub fn detach(&mut self) {
        if self.listener == ListenerState::Detached {
            warn!("Key listener already detached");
            return;
        }
        self.listener = ListenerState::Detached;
        self.detach_count += 1;
    }

    /// Handle one key press
    pub fn handle_key(&mut self, key: &InputKey) -> KeyOutcome {
        if !self.active {
            return KeyOutcome::Ignored;
        }

        if key.is_interrupt() {
            return KeyOutcome::Exit;
        }

        match self.state {
            ControllerState::Passthrough => {
                if self.listener != ListenerState::Attached {
                    return KeyOutcome::Ignored;
                }
                self.enter_menu()
            }
            ControllerState::Menu { selected } => self.handle_menu_key(selected, key),
            ControllerState::AwaitingRestart => KeyOutcome::Ignored,
        }
    }

    fn enter_menu(&mut self) -> KeyOutcome {
        self.gate.hold(PauseReason::Menu);
        self.detach();
        let selected = MenuOption::Restart;
        self.state = ControllerState::Menu { selected };
        debug!("Menu opened");
        KeyOutcome::MenuOpened { selected }
    }

    fn handle_menu_key(&mut self, selected: MenuOption, key: &InputKey) -> KeyOutcome {
        let moved = match key {
            InputKey::Up | InputKey::Char('k') | InputKey::BackTab => selected.previous(),
            InputKey::Down | InputKey::Char('j') | InputKey::Tab => selected.next(),
            InputKey::Char('1') => return self.choose(MenuOption::Restart),
            InputKey::Char('2') => return self.choose(MenuOption::ShowStdout),
            InputKey::Enter => return self.choose(selected),
            _ => return KeyOutcome::Ignored,
        };

        self.state = ControllerState::Menu { selected: moved };
        KeyOutcome::SelectionChanged { selected: moved }
    }

    fn choose(&mut self, option: MenuOption) -> KeyOutcome {
        debug!("Menu choice: {}", option.label());
        match option {
            MenuOption::ShowStdout => {
                self.resume();
                KeyOutcome::ShowStdout
            }
            MenuOption::Restart => {
                self.state = ControllerState::AwaitingRestart;
                KeyOutcome::Restart
            }
        }
    }

    /// Back to passthrough: reopen the gate and reattach
    fn resume(&mut self) {
        self.gate.release(PauseReason::Menu);
        self.state = ControllerState::Passthrough;
        self.attach();
    }

    /// A server started. Ends a pending restart.
    ///
    /// Returns `true` if the controller went back to passthrough.
    pub fn on_server_started(&mut self) -> bool {
        self.finish_restart()
    }

    /// The restart was rejected or the spawn failed.
    pub fn on_restart_failed(&mut self) -> bool {
        self.finish_restart()
    }

    fn finish_restart(&mut self) -> bool {
        if self.state != ControllerState::AwaitingRestart {
            return false;
        }
        self.resume();
        true
    }
}
