//! Engine event rendering

use std::io::{self, Write};

use sdemon_app::EngineEvent;
use sdemon_core::prelude::*;

use crate::report;
use crate::screen::{Screen, SharedScreen};

/// Draws engine events onto a shared screen
pub struct Renderer<W: Write> {
    screen: SharedScreen<W>,
    colored: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(screen: SharedScreen<W>, colored: bool) -> Self {
        Self { screen, colored }
    }

    /// Render one event. Write errors are logged, never fatal.
    pub fn render(&self, event: &EngineEvent) {
        let Ok(mut screen) = self.screen.lock() else {
            warn!("Screen lock poisoned; dropping {}", event.event_type());
            return;
        };
        if let Err(e) = self.draw(&mut screen, event) {
            debug!("Failed to render {}: {}", event.event_type(), e);
        }
    }

    fn draw(&self, screen: &mut Screen<W>, event: &EngineEvent) -> io::Result<()> {
        match event {
            EngineEvent::CompilationStarted => {
                screen.write_line(&report::compiling_text(self.colored))
            }
            EngineEvent::CompilationFinished { report: outcome } => {
                screen.write_line(&report::compilation_text(outcome, self.colored))
            }
            EngineEvent::ServerExited { code, .. } => {
                screen.write_line(&report::server_exit_text(*code))
            }
            EngineEvent::ServerError { reason } => {
                screen.write_line(&report::server_error_text(reason))
            }
            EngineEvent::RestartRejected { reason } => {
                screen.write_line(&report::restart_rejected_text(reason))
            }
            EngineEvent::RestartStarted { .. } => screen.write_line(report::RESTARTING),
            EngineEvent::ServerStarted { pid, generation } => {
                debug!("Server generation {} started (pid {:?})", generation, pid);
                Ok(())
            }
            EngineEvent::HotUpdateSent { .. } => Ok(()),
            EngineEvent::MenuOpened { selected } | EngineEvent::MenuSelectionChanged { selected } => {
                screen.show_menu(*selected)
            }
            EngineEvent::MenuClosed => screen.close_menu(),
            EngineEvent::StatusShown { text } => screen.set_status(text.clone()),
            EngineEvent::StatusCleared => screen.clear_status(),
            EngineEvent::Shutdown => {
                screen.close_menu()?;
                screen.clear_status()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdemon_app::MenuOption;
    use sdemon_core::{strip_ansi_codes, CompilationReport};

    fn renderer() -> (Renderer<Vec<u8>>, SharedScreen<Vec<u8>>) {
        let screen = Screen::new(Vec::new(), false).shared();
        (Renderer::new(screen.clone(), false), screen)
    }

    fn output(screen: &SharedScreen<Vec<u8>>) -> String {
        let screen = screen.lock().unwrap();
        strip_ansi_codes(&String::from_utf8_lossy(screen.writer()))
    }

    #[test]
    fn test_compilation_cycle_output() {
        let (renderer, screen) = renderer();
        renderer.render(&EngineEvent::CompilationStarted);
        renderer.render(&EngineEvent::CompilationFinished {
            report: CompilationReport::Failed {
                error: "Module not found".to_string(),
            },
        });

        assert_eq!(
            output(&screen),
            "Compiling...\nFailed to compile.\n\nModule not found\n"
        );
    }

    #[test]
    fn test_server_exit_notice() {
        let (renderer, screen) = renderer();
        renderer.render(&EngineEvent::ServerExited {
            generation: 1,
            code: Some(2),
        });
        assert_eq!(output(&screen), "Server exited with code 2\n");
    }

    #[test]
    fn test_menu_events_drive_screen() {
        let (renderer, screen) = renderer();
        renderer.render(&EngineEvent::StatusShown {
            text: "ready".to_string(),
        });
        renderer.render(&EngineEvent::MenuOpened {
            selected: MenuOption::Restart,
        });
        assert_eq!(screen.lock().unwrap().menu(), Some(MenuOption::Restart));

        renderer.render(&EngineEvent::MenuSelectionChanged {
            selected: MenuOption::ShowStdout,
        });
        assert_eq!(screen.lock().unwrap().menu(), Some(MenuOption::ShowStdout));

        renderer.render(&EngineEvent::MenuClosed);
        assert_eq!(screen.lock().unwrap().menu(), None);
        assert!(output(&screen).ends_with("ready"));
    }

    #[test]
    fn test_shutdown_clears_overlays() {
        let (renderer, screen) = renderer();
        renderer.render(&EngineEvent::StatusShown {
            text: "ready".to_string(),
        });
        renderer.render(&EngineEvent::Shutdown);

        let screen = screen.lock().unwrap();
        assert_eq!(screen.status_text(), None);
        assert_eq!(screen.menu(), None);
    }
}
