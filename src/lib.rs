//! Server Demon Library
//!
//! A development supervisor that runs a server next to its watch-mode build
//! and keeps the two in sync.

pub mod cli;

use sdemon_app::config;
use sdemon_core::prelude::*;
use sdemon_tui::RunOptions;

use crate::cli::{Cli, Command, InitArgs, StartArgs};

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Start(args) => start(args).await,
        Command::Init(args) => init(args),
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let project_path = cli::resolve_project(args.project.as_deref());
    info!("Project: {}", project_path.display());
    if !args.server_args.is_empty() {
        debug!("Server arguments: {:?}", args.server_args);
    }

    let result = sdemon_tui::run_with_project(&project_path, run_options(args)).await;
    if let Err(ref e) = result {
        error!("Application error: {:?}", e);
    }
    result
}

fn init(args: InitArgs) -> Result<()> {
    let project_path = cli::resolve_project(args.project.as_deref());
    let path = config::config_path(&project_path);
    if config::init_config_dir(&project_path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists; left unchanged", path.display());
    }
    Ok(())
}

/// Runner options for `sdemon start`
pub fn run_options(args: StartArgs) -> RunOptions {
    RunOptions {
        extra_args: args.server_args,
        no_input: args.no_input,
    }
}

/// Text printed for an error that ends the process
pub fn fatal_message(error: &Error) -> String {
    match error {
        Error::ConfigInvalid { .. } => {
            format!("Failed to compile.\n\n{}", error)
        }
        _ => error.to_string(),
    }
}
