//! Abstract input key event, independent of terminal library.
//!
//! Keeps the controller free of crossterm types; the TUI converts its key
//! events at the boundary.

/// Abstract input key event, independent of terminal library.
/// Converted from crossterm::event::KeyEvent at the TUI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKey {
    // Character keys
    /// Regular character key (a-z, 0-9, symbols)
    Char(char),
    /// Character with Ctrl modifier (Ctrl+a, Ctrl+c, etc.)
    CharCtrl(char),

    // Navigation
    Up,
    Down,
    Left,
    Right,

    // Action keys
    Enter,
    Esc,
    Tab,
    /// Shift+Tab (BackTab)
    BackTab,
    Backspace,

    /// Any other key; still counts as "a key was pressed"
    Other,
}

impl InputKey {
    /// Ctrl+C (`0x03` on a raw terminal)
    pub fn is_interrupt(&self) -> bool {
        matches!(self, InputKey::CharCtrl('c'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_key_equality() {
        assert_eq!(InputKey::Char('a'), InputKey::Char('a'));
        assert_ne!(InputKey::Char('a'), InputKey::Char('b'));
        assert_eq!(InputKey::CharCtrl('c'), InputKey::CharCtrl('c'));
        assert_ne!(InputKey::CharCtrl('c'), InputKey::Char('c'));
    }

    #[test]
    fn test_is_interrupt() {
        assert!(InputKey::CharCtrl('c').is_interrupt());
        assert!(!InputKey::Char('c').is_interrupt());
        assert!(!InputKey::CharCtrl('d').is_interrupt());
        assert!(!InputKey::Esc.is_interrupt());
    }
}
