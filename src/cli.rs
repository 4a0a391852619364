//! Command-line interface

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

/// Server Demon - keeps a development server in sync with its watch-mode build
#[derive(Parser, Debug)]
#[command(name = "sdemon")]
#[command(about = "Supervise a development server alongside its watch-mode build", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Build in watch mode and run the server, hot updating it on every rebuild
    Start(StartArgs),
    /// Write the default .sdemon/config.toml
    Init(InitArgs),
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct StartArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Never open the interactive menu
    #[arg(long)]
    pub no_input: bool,

    /// Arguments passed to the server unchanged (everything after the
    /// options above, with or without a `--` separator)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub server_args: Vec<String>,
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct InitArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub project: Option<PathBuf>,
}

/// Resolve the project directory, falling back to the working directory
pub fn resolve_project(project: Option<&Path>) -> PathBuf {
    let path = match project {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    dunce::canonicalize(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_missing_project_keeps_path() {
        let path = resolve_project(Some(Path::new("/definitely/not/here")));
        assert_eq!(path, PathBuf::from("/definitely/not/here"));
    }

    #[test]
    fn test_resolve_existing_project_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_project(Some(dir.path()));
        assert!(path.is_absolute());
        assert!(path.exists());
    }
}
