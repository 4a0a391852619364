//! Configuration file parsing for Server Demon
//!
//! Supports:
//! - `.sdemon/config.toml` - Build, server and UI settings

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings};
pub use types::*;
