//! Shared terminal output
//!
//! Everything that reaches the terminal goes through one [`Screen`]: server
//! logs (via [`TerminalSink`]), build reports, the menu and the status line.
//! Plain text is written above the overlays (menu, status line), which are
//! erased before the write and redrawn after it.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use sdemon_app::MenuOption;
use sdemon_core::prelude::*;
use sdemon_core::StreamKind;
use sdemon_daemon::LogSink;

use crate::menu::menu_lines;
use crate::status_line::StatusLine;

/// A screen shared between the log sink and the renderer
pub type SharedScreen<W> = Arc<Mutex<Screen<W>>>;

#[derive(Debug)]
pub struct Screen<W: Write> {
    out: W,
    /// Raw mode needs explicit carriage returns
    raw: bool,
    colored: bool,
    status: StatusLine,
    menu: Option<MenuOption>,
    /// Lines the drawn menu occupies
    menu_height: u16,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W, colored: bool) -> Self {
        Self {
            out,
            raw: false,
            colored,
            status: StatusLine::new(),
            menu: None,
            menu_height: 0,
        }
    }

    pub fn shared(self) -> SharedScreen<W> {
        Arc::new(Mutex::new(self))
    }

    pub fn set_raw(&mut self, raw: bool) {
        self.raw = raw;
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status.text()
    }

    pub fn menu(&self) -> Option<MenuOption> {
        self.menu
    }

    /// Write text above the overlays
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.hide_overlays()?;
        let text = translate_newlines(text, self.raw);
        self.out.write_all(text.as_bytes())?;
        self.show_overlays()?;
        self.out.flush()
    }

    /// Write a full line of text above the overlays
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_text(&format!("{}\n", line))
    }

    pub fn set_status(&mut self, text: String) -> io::Result<()> {
        self.status.erase(&mut self.out)?;
        self.status.set(Some(text));
        if self.menu.is_none() {
            self.status.draw(&mut self.out, self.colored)?;
        }
        self.out.flush()
    }

    pub fn clear_status(&mut self) -> io::Result<()> {
        self.status.erase(&mut self.out)?;
        self.status.set(None);
        self.out.flush()
    }

    pub fn show_menu(&mut self, selected: MenuOption) -> io::Result<()> {
        self.status.erase(&mut self.out)?;
        self.erase_menu()?;
        self.menu = Some(selected);
        self.draw_menu()?;
        self.out.flush()
    }

    pub fn close_menu(&mut self) -> io::Result<()> {
        self.erase_menu()?;
        self.menu = None;
        self.status.draw(&mut self.out, self.colored)?;
        self.out.flush()
    }

    fn draw_menu(&mut self) -> io::Result<()> {
        let Some(selected) = self.menu else {
            return Ok(());
        };
        if self.menu_height > 0 {
            return Ok(());
        }

        let lines = menu_lines(selected, self.colored);
        for line in &lines {
            queue!(self.out, Print(line), Print("\r\n"))?;
        }
        self.menu_height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        Ok(())
    }

    fn erase_menu(&mut self) -> io::Result<()> {
        if self.menu_height == 0 {
            return Ok(());
        }
        queue!(
            self.out,
            MoveToPreviousLine(self.menu_height),
            Clear(ClearType::FromCursorDown)
        )?;
        self.menu_height = 0;
        Ok(())
    }

    fn hide_overlays(&mut self) -> io::Result<()> {
        self.status.erase(&mut self.out)?;
        self.erase_menu()
    }

    fn show_overlays(&mut self) -> io::Result<()> {
        self.draw_menu()?;
        if self.menu.is_none() {
            self.status.draw(&mut self.out, self.colored)?;
        }
        Ok(())
    }
}

/// In raw mode `\n` only moves down a line; carriage returns are explicit
fn translate_newlines(text: &str, raw: bool) -> Cow<'_, str> {
    if !raw || !text.contains('\n') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\n', "\r\n"))
}

/// [`LogSink`] writing server output to a [`Screen`]
pub struct TerminalSink<W: Write> {
    screen: SharedScreen<W>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(screen: SharedScreen<W>) -> Self {
        Self { screen }
    }
}

impl<W: Write + Send> LogSink for TerminalSink<W> {
    fn write_chunk(&self, stream: StreamKind, text: &str) {
        let Ok(mut screen) = self.screen.lock() else {
            return;
        };
        if let Err(e) = screen.write_text(text) {
            trace!("Failed to write server {}: {}", stream, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdemon_core::strip_ansi_codes;

    fn plain<W: Write + AsRef<[u8]>>(screen: &Screen<W>) -> String {
        strip_ansi_codes(&String::from_utf8_lossy(screen.writer().as_ref()))
    }

    #[test]
    fn test_translate_newlines() {
        assert_eq!(translate_newlines("a\nb\n", false), "a\nb\n");
        assert_eq!(translate_newlines("a\nb\n", true), "a\r\nb\r\n");
        assert_eq!(translate_newlines("a\r\nb", true), "a\r\nb");
        assert!(matches!(translate_newlines("none", true), Cow::Borrowed(_)));
    }

    #[test]
    fn test_text_written_before_status_is_redrawn() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.set_status("ready".to_string()).unwrap();
        screen.write_text("[SERVER]: hello\n").unwrap();

        assert_eq!(plain(&screen), "ready[SERVER]: hello\nready");
    }

    #[test]
    fn test_raw_mode_uses_crlf() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.set_raw(true);
        screen.write_line("Compiling...").unwrap();

        assert_eq!(plain(&screen), "Compiling...\r\n");
    }

    #[test]
    fn test_menu_hides_status() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.set_status("ready".to_string()).unwrap();
        screen.show_menu(MenuOption::Restart).unwrap();

        let out = plain(&screen);
        assert!(out.ends_with("What would you like to do?\r\n❯ 1. Restart\r\n  2. Show stdout\r\n"));
        assert_eq!(screen.menu(), Some(MenuOption::Restart));
    }

    #[test]
    fn test_text_during_menu_stays_above_it() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.show_menu(MenuOption::Restart).unwrap();
        screen.write_line("Compiling...").unwrap();

        let out = plain(&screen);
        let compiling = out.find("Compiling...").unwrap();
        let last_prompt = out.rfind("What would you like to do?").unwrap();
        assert!(compiling < last_prompt);
    }

    #[test]
    fn test_reselect_redraws_menu() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.show_menu(MenuOption::Restart).unwrap();
        screen.show_menu(MenuOption::ShowStdout).unwrap();

        assert!(plain(&screen).ends_with("  1. Restart\r\n❯ 2. Show stdout\r\n"));
    }

    #[test]
    fn test_close_menu_restores_status() {
        let mut screen = Screen::new(Vec::new(), false);
        screen.set_status("ready".to_string()).unwrap();
        screen.show_menu(MenuOption::Restart).unwrap();
        screen.close_menu().unwrap();

        assert!(plain(&screen).ends_with("ready"));
        assert_eq!(screen.menu(), None);
    }

    #[test]
    fn test_sink_writes_through_screen() {
        let screen = Screen::new(Vec::new(), false).shared();
        let sink = TerminalSink::new(Arc::clone(&screen));
        sink.write_chunk(StreamKind::Stderr, "[SERVER]: oops\n");

        let screen = screen.lock().unwrap();
        assert_eq!(plain(&*screen), "[SERVER]: oops\n");
    }
}
