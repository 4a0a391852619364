//! Main runner - entry point and event loop
//!
//! Startup order:
//! 1. build the Engine with a terminal log sink
//! 2. start the build watch (configuration errors end the run here)
//! 3. process messages while waiting for the first build
//! 4. once it settles, enter raw mode, start the key reader and go interactive

use std::io::{Stdout, Write};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};

use sdemon_app::config;
use sdemon_app::message::Message;
use sdemon_app::{Engine, EngineEvent, FirstCompilation};
use sdemon_core::prelude::*;

use crate::event::KeyReader;
use crate::render::Renderer;
use crate::screen::{Screen, SharedScreen, TerminalSink};
use crate::terminal::{self, RawModeGuard};

/// How the runner was invoked
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Arguments passed to the server verbatim
    pub extra_args: Vec<String>,
    /// Disable the interactive menu even on a terminal
    pub no_input: bool,
}

/// Run the supervisor for the project at `project_path`.
///
/// Returns an error only for failures that should end the process with a
/// non-zero status (bad build configuration, unusable terminal).
pub async fn run_with_project(project_path: &Path, options: RunOptions) -> Result<()> {
    terminal::install_panic_hook();

    let settings = config::load_settings(project_path);
    let colored = settings.ui.color;
    let interactive = !options.no_input && settings.ui.interactive && terminal::is_interactive();
    info!(
        "Starting in {} (interactive={})",
        project_path.display(),
        interactive
    );

    let screen = Screen::new(std::io::stdout(), colored).shared();
    let sink = Arc::new(TerminalSink::new(Arc::clone(&screen)));

    let mut engine = Engine::new(
        project_path.to_path_buf(),
        settings,
        options.extra_args,
        interactive,
        sink,
    );
    let mut events = engine.subscribe();
    let renderer = Renderer::new(Arc::clone(&screen), colored);

    let build_engine = engine.command_build_engine()?;
    let first = engine.start_build_watch(build_engine)?;

    let mut session = Session::default();
    run_loop(&mut engine, first, &mut events, &renderer, &screen, interactive, &mut session).await;

    // Stop reading keys before the terminal leaves raw mode
    session.key_reader = None;
    engine.shutdown().await;
    render_pending(&mut events, &renderer);
    set_raw(&screen, false);
    session.raw_guard = None;

    info!("Server Demon exited");
    Ok(())
}

/// Terminal resources acquired once the first build settles
#[derive(Default)]
struct Session {
    raw_guard: Option<RawModeGuard>,
    key_reader: Option<KeyReader>,
}

async fn run_loop<W: Write>(
    engine: &mut Engine,
    first: FirstCompilation,
    events: &mut broadcast::Receiver<EngineEvent>,
    renderer: &Renderer<W>,
    screen: &SharedScreen<Stdout>,
    interactive: bool,
    session: &mut Session,
) {
    let first = first.wait();
    tokio::pin!(first);
    let mut first_settled = false;

    loop {
        tokio::select! {
            outcome = &mut first, if !first_settled => {
                first_settled = true;
                match outcome {
                    Ok(_) => debug!("First build succeeded"),
                    // Startup continues; the error is already on screen
                    Err(e) => warn!("First build did not succeed: {}", e),
                }
                if interactive {
                    go_interactive(engine, screen, session);
                }
            }
            msg = engine.msg_rx.recv() => {
                let Some(msg) = msg else {
                    warn!("Message channel closed");
                    break;
                };
                engine.process_message(msg);
                render_pending(events, renderer);
                if engine.should_quit() {
                    break;
                }
            }
        }
    }
}

fn go_interactive(engine: &Engine, screen: &SharedScreen<Stdout>, session: &mut Session) {
    match RawModeGuard::new() {
        Ok(guard) => {
            set_raw(screen, true);
            session.raw_guard = Some(guard);
            session.key_reader = Some(KeyReader::spawn(engine.msg_sender()));
            if engine.msg_tx.try_send(Message::InputReady).is_err() {
                warn!("Could not enable interactive input");
            }
        }
        Err(e) => warn!("Interactive input unavailable: {}", e),
    }
}

fn set_raw(screen: &SharedScreen<Stdout>, raw: bool) {
    if let Ok(mut screen) = screen.lock() {
        screen.set_raw(raw);
    }
}

/// Render every event published since the last call
pub fn render_pending<W: Write>(events: &mut broadcast::Receiver<EngineEvent>, renderer: &Renderer<W>) {
    loop {
        match events.try_recv() {
            Ok(event) => renderer.render(&event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!("Renderer skipped {} events", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}
