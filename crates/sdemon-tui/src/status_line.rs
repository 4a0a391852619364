//! Ephemeral status line
//!
//! A single line kept at the bottom of the output without a trailing
//! newline, so it can be erased and redrawn around every write.

use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};

#[derive(Debug, Default)]
pub struct StatusLine {
    text: Option<String>,
    drawn: bool,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    /// Replace the text. Takes effect on the next draw.
    pub fn set(&mut self, text: Option<String>) {
        self.text = text;
    }

    pub fn draw<W: Write>(&mut self, out: &mut W, colored: bool) -> io::Result<()> {
        let Some(text) = self.text.as_deref() else {
            return Ok(());
        };
        if self.drawn {
            return Ok(());
        }

        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        if colored {
            queue!(out, Print(text.dim()))?;
        } else {
            queue!(out, Print(text))?;
        }
        self.drawn = true;
        Ok(())
    }

    pub fn erase<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.drawn {
            return Ok(());
        }
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        self.drawn = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdemon_core::strip_ansi_codes;

    fn plain(out: &[u8]) -> String {
        strip_ansi_codes(&String::from_utf8_lossy(out))
    }

    #[test]
    fn test_draw_without_text_is_noop() {
        let mut line = StatusLine::new();
        let mut out = Vec::new();
        line.draw(&mut out, false).unwrap();

        assert!(out.is_empty());
        assert!(!line.is_drawn());
    }

    #[test]
    fn test_draw_once_until_erased() {
        let mut line = StatusLine::new();
        line.set(Some("Server running".to_string()));
        let mut out = Vec::new();

        line.draw(&mut out, false).unwrap();
        line.draw(&mut out, false).unwrap();
        assert_eq!(plain(&out), "Server running");
        assert!(!plain(&out).contains('\n'));

        line.erase(&mut out).unwrap();
        assert!(!line.is_drawn());
        line.draw(&mut out, false).unwrap();
        assert_eq!(plain(&out), "Server runningServer running");
    }

    #[test]
    fn test_erase_when_not_drawn_writes_nothing() {
        let mut line = StatusLine::new();
        let mut out = Vec::new();
        line.erase(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
