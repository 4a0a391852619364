//! Server Demon - a development supervisor for a server and its build
//!
//! This is the binary entry point. All logic lives in the library.

use clap::Parser;
use sdemon_core::prelude::*;
use server_demon::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize error handling
    color_eyre::install().map_err(|e| Error::terminal(e.to_string()))?;

    // Initialize logging (to file, since the server owns stdout)
    sdemon_core::logging::init()?;

    match server_demon::run(cli).await {
        Ok(()) => {
            info!("Server Demon exiting");
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            error!("Fatal: {}", e);
            eprintln!("{}", server_demon::fatal_message(&e));
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}
