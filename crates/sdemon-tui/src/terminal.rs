//! Terminal setup and restoration

use std::io::Write;

use crossterm::tty::IsTty;
use crossterm::{cursor, execute, terminal};

use sdemon_core::prelude::*;

/// Whether both stdin and stdout are attached to a terminal
pub fn is_interactive() -> bool {
    std::io::stdin().is_tty() && std::io::stdout().is_tty()
}

/// Put the terminal back the way we found it
pub fn restore() {
    let _ = terminal::disable_raw_mode();
    let mut stdout = std::io::stdout();
    let _ = execute!(stdout, cursor::Show);
    let _ = stdout.flush();
}

/// Install a panic hook that restores the terminal
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore();
        original_hook(panic_info);
    }));
}

/// Raw mode for as long as the guard lives.
///
/// Raw mode delivers single key presses (and Ctrl+C as a key) without
/// waiting for Enter.
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| Error::TerminalInit(format!("Failed to enable raw mode: {}", e)))?;
        debug!("Raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        } else {
            debug!("Raw mode disabled");
        }
    }
}
