//! Build engine contract and the command-driven implementation
//!
//! A [`BuildEngine`] runs in watch mode and reports each (re)build through
//! [`BuildEvent`]s. [`CommandBuildEngine`] drives an external bundler: it runs
//! the configured command once at start and again after every debounced
//! source change.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};

use sdemon_core::prelude::*;
use sdemon_core::{BuildEvent, BuildStats};

/// Default source entry (relative to the project root)
pub const DEFAULT_ENTRY: &str = "./index.ts";

/// Default output directory (relative to the project root)
pub const DEFAULT_OUTPUT_PATH: &str = "build";

/// Default bundle file name inside the output directory
pub const DEFAULT_OUTPUT_FILENAME: &str = "index.js";

/// Default debounce duration in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Source extensions that trigger a rebuild
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "json"];

/// Path components never watched
pub const DEFAULT_IGNORE: &[&str] = &["build", "node_modules", ".git"];

/// Optimization mode handed to the build command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to [`BuildConfig::server`]
#[derive(Debug, Clone)]
pub struct ServerBuildOptions {
    pub mode: BuildMode,
    pub entry: PathBuf,
    /// Emit debug-friendly output (path info, inline source maps)
    pub is_debug: bool,
    /// Directory relative paths are resolved against
    pub root: PathBuf,
}

impl Default for ServerBuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Development,
            entry: PathBuf::from(DEFAULT_ENTRY),
            is_debug: true,
            root: PathBuf::from("."),
        }
    }
}

/// Configuration for building the server bundle in watch mode
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub mode: BuildMode,
    /// Absolute source entry
    pub entry: PathBuf,
    /// Directory containing the entry
    pub context: PathBuf,
    /// Absolute output directory
    pub output_path: PathBuf,
    pub output_filename: String,
    pub is_debug: bool,
    pub project_root: PathBuf,
    /// Build command and its arguments
    pub command: String,
    pub args: Vec<String>,
    /// Watched directories (relative to the project root)
    pub watch_paths: Vec<PathBuf>,
    /// Watched file extensions (empty = all files)
    pub extensions: Vec<String>,
    /// Path components that never trigger a rebuild
    pub ignore: Vec<String>,
    pub debounce: Duration,
}

impl BuildConfig {
    /// Shared config for building a server bundle.
    ///
    /// Resolves the entry to an absolute path, derives the context from it and
    /// fixes the output to `<root>/build/index.js`.
    pub fn server(options: ServerBuildOptions) -> Self {
        let root = resolve(&options.root, Path::new("."));
        let entry = resolve(&root, &options.entry);
        let context = entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.clone());

        Self {
            mode: options.mode,
            entry,
            context,
            output_path: root.join(DEFAULT_OUTPUT_PATH),
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            is_debug: options.is_debug,
            project_root: root,
            command: String::new(),
            args: Vec::new(),
            watch_paths: vec![PathBuf::from(".")],
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            ignore: DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = command.into();
        self.args = args;
        self
    }

    pub fn with_output(mut self, path: impl AsRef<Path>, filename: impl Into<String>) -> Self {
        self.output_path = resolve(&self.project_root, path.as_ref());
        self.output_filename = filename.into();
        self
    }

    pub fn with_watch_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.watch_paths = paths;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce = Duration::from_millis(ms);
        self
    }

    /// Path of the bundle the server process runs
    pub fn output_entry(&self) -> PathBuf {
        self.output_path.join(&self.output_filename)
    }

    /// Check the configuration before any build is attempted
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::config_invalid("build command is empty"));
        }
        if self.output_filename.trim().is_empty() {
            return Err(Error::config_invalid("output filename is empty"));
        }
        if !self.entry.exists() {
            return Err(Error::config_invalid(format!(
                "entry not found: {}",
                self.entry.display()
            )));
        }
        if which::which(&self.command).is_err() {
            return Err(Error::config_invalid(format!(
                "build command not found: {}",
                self.command
            )));
        }
        Ok(())
    }

    /// Variables describing this build, exported to the build command
    pub fn build_env(&self) -> Vec<(String, String)> {
        vec![
            ("SDEMON_MODE".to_string(), self.mode.to_string()),
            ("SDEMON_ENTRY".to_string(), path_string(&self.entry)),
            ("SDEMON_CONTEXT".to_string(), path_string(&self.context)),
            ("SDEMON_OUTPUT_PATH".to_string(), path_string(&self.output_path)),
            (
                "SDEMON_OUTPUT_FILENAME".to_string(),
                self.output_filename.clone(),
            ),
            ("SDEMON_DEBUG".to_string(), self.is_debug.to_string()),
        ]
    }

    /// Whether a changed path should trigger a rebuild
    pub fn is_relevant_change(&self, path: &Path) -> bool {
        if path.starts_with(&self.output_path) {
            return false;
        }

        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        let ignored = relative.components().any(|c| match c {
            Component::Normal(name) => self.ignore.iter().any(|i| name == i.as_str()),
            _ => false,
        });
        if ignored {
            return false;
        }

        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    dunce::canonicalize(&joined).unwrap_or(joined)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Handle to a running watch. Dropping it stops the watch.
#[derive(Debug)]
pub struct WatchSubscription {
    stop_tx: watch::Sender<bool>,
}

/// Engine-side half of a [`WatchSubscription`]
#[derive(Debug, Clone)]
pub struct StopSignal {
    stop_rx: watch::Receiver<bool>,
}

impl WatchSubscription {
    /// Create a subscription and the signal its engine listens on
    pub fn channel() -> (Self, StopSignal) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (Self { stop_tx }, StopSignal { stop_rx })
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_active(&self) -> bool {
        !*self.stop_tx.borrow()
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Resolves once the subscription is stopped or dropped
    pub async fn stopped(&mut self) {
        while !*self.stop_rx.borrow_and_update() {
            if self.stop_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// A bundler running in watch mode
pub trait BuildEngine: Send + Sized + 'static {
    /// Start watching. The first build starts immediately.
    ///
    /// Every build is announced with `WatchRunStarted` and concluded with
    /// `Done`. Must be called from within a tokio runtime.
    fn watch(self, tx: mpsc::Sender<BuildEvent>) -> Result<WatchSubscription>;
}

/// Runs an external build command on start and after every source change.
#[derive(Debug, Clone)]
pub struct CommandBuildEngine {
    config: BuildConfig,
}

impl CommandBuildEngine {
    /// Create an engine, rejecting a malformed configuration
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build loop: one build at a time, a change during a build queues one more
    async fn run_builds(
        config: BuildConfig,
        tx: mpsc::Sender<BuildEvent>,
        mut trigger_rx: mpsc::Receiver<()>,
        mut stop: StopSignal,
    ) {
        loop {
            if tx.send(BuildEvent::WatchRunStarted).await.is_err() {
                break;
            }

            let stats = tokio::select! {
                stats = run_build_command(&config) => stats,
                _ = stop.stopped() => break,
            };

            if tx.send(BuildEvent::Done(stats)).await.is_err() {
                break;
            }

            tokio::select! {
                trigger = trigger_rx.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                }
                _ = stop.stopped() => break,
            }
        }

        debug!("build loop finished");
    }

    /// Blocking file watcher feeding the build loop
    fn run_watcher(
        config: BuildConfig,
        trigger_tx: mpsc::Sender<()>,
        stop: StopSignal,
    ) -> Result<()> {
        let filter = config.clone();
        let mut debouncer = new_debouncer(config.debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .filter(|event| event.paths.iter().any(|p| filter.is_relevant_change(p)))
                        .count();
                    if relevant == 0 {
                        return;
                    }
                    debug!("Build watcher detected {} change(s)", relevant);
                    // Full means a rebuild is already queued
                    let _ = trigger_tx.try_send(());
                }
                Err(errors) => {
                    for error in errors {
                        warn!("Build watcher error: {:?}", error);
                    }
                }
            }
        })
        .map_err(|e| Error::watcher(format!("failed to create watcher: {}", e)))?;

        for relative_path in &config.watch_paths {
            let full_path = config.project_root.join(relative_path);
            if !full_path.exists() {
                warn!("Watch path does not exist: {}", full_path.display());
                continue;
            }
            debouncer
                .watch(&full_path, RecursiveMode::Recursive)
                .map_err(|e| Error::watcher(format!("{}: {}", full_path.display(), e)))?;
            info!("Watching: {}", full_path.display());
        }

        std::thread::spawn(move || {
            // Keep the debouncer alive until the subscription stops
            let _debouncer = debouncer;
            while !stop.is_stopped() {
                std::thread::sleep(Duration::from_millis(100));
            }
            info!("Build watcher stopping");
        });

        Ok(())
    }
}

impl BuildEngine for CommandBuildEngine {
    fn watch(self, tx: mpsc::Sender<BuildEvent>) -> Result<WatchSubscription> {
        let (subscription, stop) = WatchSubscription::channel();
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);

        Self::run_watcher(self.config.clone(), trigger_tx, stop.clone())?;
        tokio::spawn(Self::run_builds(self.config, tx, trigger_rx, stop));

        Ok(subscription)
    }
}

/// Run the build command once and turn its output into stats
async fn run_build_command(config: &BuildConfig) -> BuildStats {
    debug!("Running build: {} {}", config.command, config.args.join(" "));

    let output = Command::new(&config.command)
        .args(&config.args)
        .current_dir(&config.project_root)
        .envs(config.build_env())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit = match output.status.code() {
                Some(code) => format!("build command exited with code {}", code),
                None => "build command was terminated by a signal".to_string(),
            };
            parse_build_output(output.status.success(), &stdout, &stderr, &exit)
        }
        Err(e) => {
            error!("Failed to run build command: {}", e);
            let message = format!("failed to run {}: {}", config.command, e);
            BuildStats::new(true, json!({ "errors": [message], "warnings": [] }))
        }
    }
}

/// Derive build stats from a finished build command.
///
/// A stdout line holding a JSON object with `errors` or `warnings` is taken
/// as the report. Without one, a failed command yields a single error from
/// its stderr (or stdout, or `exit_summary`), and lines starting with
/// `warning` become warnings.
pub fn parse_build_output(success: bool, stdout: &str, stderr: &str, exit_summary: &str) -> BuildStats {
    if let Some(report) = find_json_report(stdout) {
        let report_errors = report
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty());
        return BuildStats::new(!success || report_errors, report);
    }

    let warnings: Vec<String> = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().starts_with("warning"))
        .map(str::to_string)
        .collect();

    let errors: Vec<String> = if success {
        Vec::new()
    } else if !stderr.trim().is_empty() {
        vec![stderr.trim().to_string()]
    } else if !stdout.trim().is_empty() {
        vec![stdout.trim().to_string()]
    } else {
        vec![exit_summary.to_string()]
    };

    BuildStats::new(!success, json!({ "errors": errors, "warnings": warnings }))
}

fn find_json_report(stdout: &str) -> Option<Value> {
    stdout.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        let is_report = value.get("errors").is_some() || value.get("warnings").is_some();
        is_report.then_some(value)
    })
}
