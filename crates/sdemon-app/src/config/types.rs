//! Configuration types for Server Demon
//!
//! Defines `Settings` (`.sdemon/config.toml`) and its sections.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sdemon_daemon::build::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_ENTRY, DEFAULT_EXTENSIONS, DEFAULT_IGNORE,
    DEFAULT_OUTPUT_FILENAME, DEFAULT_OUTPUT_PATH,
};
use sdemon_daemon::{BuildConfig, BuildMode, ServerBuildOptions, ServerCommand};

/// Application settings (.sdemon/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub ui: UiSettings,
}

/// How the server bundle is built and when it is rebuilt
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BuildSettings {
    /// Build command, run from the project root
    #[serde(default = "default_build_command")]
    pub command: String,

    #[serde(default = "default_build_args")]
    pub args: Vec<String>,

    /// Source entry of the server
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_output_filename")]
    pub output_filename: String,

    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<PathBuf>,

    /// File extensions that trigger a rebuild (empty = all)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Path components that never trigger a rebuild
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            args: default_build_args(),
            entry: default_entry(),
            output_path: default_output_path(),
            output_filename: default_output_filename(),
            watch_paths: default_watch_paths(),
            extensions: default_extensions(),
            ignore: default_ignore(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_build_command() -> String {
    "npx".to_string()
}

fn default_build_args() -> Vec<String> {
    ["webpack", "--config", "webpack.config.js"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_entry() -> PathBuf {
    PathBuf::from(DEFAULT_ENTRY)
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_output_filename() -> String {
    DEFAULT_OUTPUT_FILENAME.to_string()
}

fn default_watch_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect()
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// How the built server is launched
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Runtime that executes the bundle (empty = execute the bundle directly)
    #[serde(default = "default_program")]
    pub program: String,

    /// Environment variable forced to `mode_value` for the server
    #[serde(default = "default_mode_var")]
    pub mode_var: String,

    #[serde(default = "default_mode_value")]
    pub mode_value: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            mode_var: default_mode_var(),
            mode_value: default_mode_value(),
        }
    }
}

fn default_program() -> String {
    "node".to_string()
}

fn default_mode_var() -> String {
    "NODE_ENV".to_string()
}

fn default_mode_value() -> String {
    "development".to_string()
}

/// Terminal behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UiSettings {
    /// Colorize tags and compile output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Enable the key-driven menu when stdin is a terminal
    #[serde(default = "default_true")]
    pub interactive: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            color: true,
            interactive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Build configuration for the project at `project_root`
    pub fn build_config(&self, project_root: &Path) -> BuildConfig {
        let build = &self.build;
        BuildConfig::server(ServerBuildOptions {
            mode: BuildMode::Development,
            entry: build.entry.clone(),
            is_debug: true,
            root: project_root.to_path_buf(),
        })
        .with_command(build.command.clone(), build.args.clone())
        .with_output(&build.output_path, build.output_filename.clone())
        .with_watch_paths(build.watch_paths.clone())
        .with_extensions(build.extensions.clone())
        .with_ignore(build.ignore.clone())
        .with_debounce_ms(build.debounce_ms)
    }

    /// Launch command for the bundle produced by `build`.
    ///
    /// `extra_args` are passed through verbatim.
    pub fn server_command(&self, build: &BuildConfig, extra_args: Vec<String>) -> ServerCommand {
        let mut command = ServerCommand::new(self.server.program.clone(), build.output_entry())
            .with_working_dir(build.project_root.clone())
            .with_extra_args(extra_args);
        if !self.server.mode_var.is_empty() {
            command = command.with_env(self.server.mode_var.clone(), self.server.mode_value.clone());
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.build.command, "npx");
        assert_eq!(
            settings.build.args,
            vec!["webpack", "--config", "webpack.config.js"]
        );
        assert_eq!(settings.build.entry, PathBuf::from("./index.ts"));
        assert_eq!(settings.build.debounce_ms, 300);
        assert_eq!(settings.server.program, "node");
        assert_eq!(settings.server.mode_var, "NODE_ENV");
        assert_eq!(settings.server.mode_value, "development");
        assert!(settings.ui.color);
        assert!(settings.ui.interactive);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [build]
            command = "esbuild"

            [ui]
            color = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.build.command, "esbuild");
        assert_eq!(settings.build.output_filename, "index.js");
        assert!(!settings.ui.color);
        assert!(settings.ui.interactive);
        assert_eq!(settings.server, ServerSettings::default());
    }

    #[test]
    fn test_build_config_uses_settings() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.build.output_path = PathBuf::from("dist");
        settings.build.output_filename = "server.js".to_string();
        settings.build.debounce_ms = 50;

        let config = settings.build_config(dir.path());
        assert_eq!(config.command, "npx");
        assert!(config.output_entry().ends_with("dist/server.js"));
        assert_eq!(config.debounce.as_millis(), 50);
    }

    #[test]
    fn test_server_command_forces_mode_and_passes_args() {
        let dir = tempdir().unwrap();
        let settings = Settings::default();
        let build = settings.build_config(dir.path());

        let command = settings.server_command(&build, vec!["--inspect".to_string()]);
        assert_eq!(command.program, "node");
        assert_eq!(command.entry, build.output_entry());
        assert_eq!(
            command.env,
            vec![("NODE_ENV".to_string(), "development".to_string())]
        );

        let (_, args) = command.argv();
        assert_eq!(args.first().map(String::as_str), Some("--inspect"));
    }

    #[test]
    fn test_server_command_without_mode_var() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.server.mode_var.clear();
        let build = settings.build_config(dir.path());

        let command = settings.server_command(&build, Vec::new());
        assert!(command.env.is_empty());
    }
}
