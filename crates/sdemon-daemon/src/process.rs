//! Server process management

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Notify};

use crate::log_filter::LogPipeline;
use crate::protocol::{ChildMessage, HOT_UPDATE_LINE};
use sdemon_core::prelude::*;
use sdemon_core::{without_ansi_codes, ChildEvent, Generation, StreamKind};

/// How long [`ServerProcess::shutdown`] waits for the OS to reap the child
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything needed to launch the server once.
///
/// The command line is `<program> <extra_args...> <entry>`, so passthrough
/// arguments reach the runtime (`node --inspect build/index.js`). With an
/// empty `program` the entry itself is executed and the arguments follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerCommand {
    pub program: String,
    pub entry: PathBuf,
    pub working_dir: PathBuf,
    /// Variables forced on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub extra_args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>, entry: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            entry: entry.into(),
            working_dir: PathBuf::from("."),
            env: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Entry resolved against the working directory
    pub fn entry_path(&self) -> PathBuf {
        if self.entry.is_absolute() {
            self.entry.clone()
        } else {
            self.working_dir.join(&self.entry)
        }
    }

    /// Executable and argument list, in launch order
    pub fn argv(&self) -> (String, Vec<String>) {
        let entry = self.entry_path().to_string_lossy().into_owned();
        if self.program.is_empty() {
            (entry, self.extra_args.clone())
        } else {
            let mut args = self.extra_args.clone();
            args.push(entry);
            (self.program.clone(), args)
        }
    }

    /// Locate the executable on `PATH`
    pub fn resolve_program(&self) -> Result<PathBuf> {
        let (program, _) = self.argv();
        which::which(&program).map_err(|_| Error::ProgramNotFound { program })
    }
}

/// Manages the server child process.
///
/// The `Child` handle is moved into a `wait_for_exit` task that reaps it and
/// emits `ChildEvent::Exited` tagged with this process's generation. The
/// handle keeps a kill channel, an `exited` flag for synchronous checks, and
/// an exit [`Notify`] so shutdown can await the reap without polling.
pub struct ServerProcess {
    generation: Generation,
    /// Lines for the child's stdin
    stdin_tx: mpsc::Sender<String>,
    pid: Option<u32>,
    /// Consumed by the first kill (or on drop)
    kill_tx: Option<oneshot::Sender<()>>,
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
}

impl std::fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProcess")
            .field("generation", &self.generation)
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}

impl ServerProcess {
    /// Spawn the server described by `command`.
    ///
    /// Control messages go to `event_tx`; log output goes through `pipeline`.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        command: &ServerCommand,
        generation: Generation,
        event_tx: mpsc::Sender<ChildEvent>,
        pipeline: LogPipeline,
    ) -> Result<Self> {
        let entry = command.entry_path();
        if !entry.exists() {
            return Err(Error::MissingOutput { path: entry });
        }

        let program_path = command.resolve_program()?;
        let (program, args) = command.argv();

        info!(
            "Spawning server (generation {}): {} {}",
            generation,
            program,
            args.join(" ")
        );

        let mut child = Command::new(&program_path)
            .args(&args)
            .current_dir(&command.working_dir)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ProgramNotFound {
                        program: program.clone(),
                    }
                } else {
                    Error::ProcessSpawn {
                        reason: e.to_string(),
                    }
                }
            })?;

        let pid = child.id();
        info!("Server process started with PID: {:?}", pid);

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::process("child stdio was not piped"));
        };

        Ok(Self::attach(
            child,
            stdin,
            stdout,
            stderr,
            generation,
            event_tx,
            pipeline,
        ))
    }

    /// Wire up the stdio and wait tasks for an already-spawned child
    fn attach(
        child: Child,
        stdin: tokio::process::ChildStdin,
        stdout: tokio::process::ChildStdout,
        stderr: tokio::process::ChildStderr,
        generation: Generation,
        event_tx: mpsc::Sender<ChildEvent>,
        pipeline: LogPipeline,
    ) -> Self {
        let pid = child.id();

        let (stdin_tx, stdin_rx) = mpsc::channel::<String>(32);
        tokio::spawn(Self::stdin_writer(stdin, stdin_rx));

        tokio::spawn(Self::stdout_reader(
            stdout,
            generation,
            event_tx.clone(),
            pipeline.clone(),
        ));
        tokio::spawn(Self::stderr_reader(stderr, pipeline));

        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(Self::wait_for_exit(
            child,
            generation,
            kill_rx,
            event_tx,
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
        ));

        Self {
            generation,
            stdin_tx,
            pid,
            kill_tx: Some(kill_tx),
            exited,
            exit_notify,
        }
    }

    /// Background task: owns `child`, waits for it to exit, emits `ChildEvent::Exited`.
    ///
    /// Ends either when the child exits on its own or when `kill_rx` fires,
    /// in which case the child is killed first and then reaped.
    async fn wait_for_exit(
        mut child: Child,
        generation: Generation,
        kill_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<ChildEvent>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
    ) {
        let code: Option<i32> = tokio::select! {
            result = child.wait() => {
                match result {
                    Ok(status) => {
                        info!("Server (generation {}) exited with status: {:?}", generation, status);
                        status.code()
                    }
                    Err(e) => {
                        error!("Error waiting for server process: {}", e);
                        None
                    }
                }
            }
            _ = kill_rx => {
                debug!("Kill requested for server generation {}", generation);
                if let Err(e) = child.kill().await {
                    error!("Failed to kill server process: {}", e);
                }
                match child.wait().await {
                    Ok(status) => status.code(),
                    Err(e) => {
                        error!("Error waiting after kill: {}", e);
                        None
                    }
                }
            }
        };

        // Flag before event so has_exited() is true once the event is observed
        exited.store(true, Ordering::Release);
        exit_notify.notify_waiters();

        let _ = event_tx
            .send(ChildEvent::Exited { generation, code })
            .await;
    }

    /// Route stdout lines: control messages become events, the rest is log output.
    async fn stdout_reader(
        stdout: tokio::process::ChildStdout,
        generation: Generation,
        tx: mpsc::Sender<ChildEvent>,
        pipeline: LogPipeline,
    ) {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
            if let Some(message) = ChildMessage::parse(&line) {
                debug!(
                    "Server generation {} sent {}",
                    generation,
                    message.summary()
                );
                if tx.send(ChildEvent::Message { generation }).await.is_err() {
                    debug!("child event channel closed");
                    break;
                }
                continue;
            }

            trace!("stdout: {}", without_ansi_codes(&line));
            pipeline.forward(StreamKind::Stdout, &line);
        }

        debug!("stdout reader finished (generation {})", generation);
    }

    async fn stderr_reader(stderr: tokio::process::ChildStderr, pipeline: LogPipeline) {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();

        while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
            trace!("stderr: {}", without_ansi_codes(&line));
            pipeline.forward(StreamKind::Stderr, &line);
        }

        debug!("stderr reader finished");
    }

    /// Write lines to stdin
    async fn stdin_writer(mut stdin: tokio::process::ChildStdin, mut rx: mpsc::Receiver<String>) {
        while let Some(line) = rx.recv().await {
            debug!("Sending to server: {}", line);

            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                error!("Failed to write to stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.write_all(b"\n").await {
                error!("Failed to write newline: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("Failed to flush stdin: {}", e);
                break;
            }
        }

        debug!("stdin writer finished");
    }

    /// Tell the server a new build is ready to be hot-applied.
    ///
    /// Non-blocking; fails if the stdin writer is gone or backed up.
    pub fn send_hot_update(&self) -> Result<()> {
        self.stdin_tx
            .try_send(HOT_UPDATE_LINE.to_string())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::channel_send("stdin queue full"),
                mpsc::error::TrySendError::Closed(_) => Error::ChannelClosed,
            })
    }

    /// Request termination without waiting for it.
    ///
    /// The exit is reported later as `ChildEvent::Exited`. Calling this more
    /// than once is harmless.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            // The wait task may already be gone if the child exited by itself
            let _ = tx.send(());
        }
    }

    /// Kill the server and wait for the OS to reap it.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.has_exited() {
            debug!("Server already exited, nothing to shut down");
            return Ok(());
        }

        // Register before the final check so a notify in between is not lost
        let exit_notify = Arc::clone(&self.exit_notify);
        let notified = exit_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        self.kill();
        if self.has_exited() {
            return Ok(());
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, notified).await {
            Ok(()) => {
                info!("Server process stopped");
                Ok(())
            }
            Err(_) => Err(Error::process(format!(
                "server did not exit within {}s",
                SHUTDOWN_TIMEOUT.as_secs()
            ))),
        }
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Read one line, replacing invalid UTF-8 instead of failing.
///
/// The trailing `\n` (or `\r\n`) is removed. Returns `None` at EOF or on a
/// read error.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => {
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            Some(String::from_utf8_lossy(buf).into_owned())
        }
        Err(e) => {
            debug!("Failed to read server output: {}", e);
            None
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("ServerProcess dropped while process may still be running");
            self.kill();
        }
        // kill_on_drop(true) on the Child is the final safety net
        debug!("ServerProcess dropped");
    }
}
