//! Settings parser for .sdemon/config.toml

use super::types::Settings;
use sdemon_core::prelude::*;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.toml";
const SDEMON_DIR: &str = ".sdemon";

const DEFAULT_CONFIG: &str = r#"# Server Demon Configuration

[build]
# Build command, run from the project root on start and on every change.
# It receives SDEMON_MODE, SDEMON_ENTRY, SDEMON_OUTPUT_PATH and
# SDEMON_OUTPUT_FILENAME in its environment. A stdout line such as
# {"errors":[],"warnings":[]} is used as the build report.
command = "npx"
args = ["webpack", "--config", "webpack.config.js"]
entry = "./index.ts"
output_path = "build"
output_filename = "index.js"
watch_paths = ["."]
extensions = ["ts", "tsx", "js", "json"]
ignore = ["build", "node_modules", ".git"]
debounce_ms = 300

[server]
program = "node"            # Empty = execute the bundle directly
mode_var = "NODE_ENV"
mode_value = "development"

[ui]
color = true
interactive = true          # Key-driven menu (only when stdin is a terminal)
"#;

/// Path of the config file for a project
pub fn config_path(project_path: &Path) -> PathBuf {
    project_path.join(SDEMON_DIR).join(CONFIG_FILENAME)
}

/// Load settings from .sdemon/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = config_path(project_path);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create the default config file in .sdemon/
///
/// Never overwrites an existing file. Returns `true` if a file was written.
pub fn init_config_dir(project_path: &Path) -> Result<bool> {
    let sdemon_dir = project_path.join(SDEMON_DIR);

    if !sdemon_dir.exists() {
        std::fs::create_dir_all(&sdemon_dir)
            .map_err(|e| Error::config(format!("Failed to create .sdemon dir: {}", e)))?;
    }

    let config_path = sdemon_dir.join(CONFIG_FILENAME);
    if config_path.exists() {
        debug!("Config already exists at {:?}", config_path);
        return Ok(false);
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
    info!("Wrote default config to {:?}", config_path);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".sdemon");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            r#"
[build]
command = "node"
args = ["scripts/build.js"]
debounce_ms = 100

[server]
program = ""
mode_value = "test"
"#,
        )
        .unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings.build.command, "node");
        assert_eq!(settings.build.args, vec!["scripts/build.js"]);
        assert_eq!(settings.build.debounce_ms, 100);
        assert_eq!(settings.server.program, "");
        assert_eq!(settings.server.mode_var, "NODE_ENV");
        assert_eq!(settings.server.mode_value, "test");
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".sdemon");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[build\ncommand = ").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_init_config_dir_writes_parseable_defaults() {
        let temp = tempdir().unwrap();
        assert!(init_config_dir(temp.path()).unwrap());

        let path = config_path(temp.path());
        assert!(path.exists());
        assert_eq!(load_settings(temp.path()), Settings::default());
    }

    #[test]
    fn test_init_config_dir_never_overwrites() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".sdemon");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[ui]\ncolor = false\n").unwrap();

        assert!(!init_config_dir(temp.path()).unwrap());
        assert!(!load_settings(temp.path()).ui.color);
    }
}
