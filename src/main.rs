// ABOUTME: Main entry point for gwt
//
// Binary: gwt
// Usage: gwt <COMMAND>
// - up: launch agents on branches and run the interactive loop
// - hook: spool an agent hook event for the running instance
// - status: show the tmux session and panes of a repository

#![allow(missing_docs)]

use anyhow::Result;
use clap::Parser;
use gwt::app::runtime::restore_terminal;
use gwt::cli::{self, Cli, Commands};
use gwt::logging;
use tracing::error;

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        restore_terminal();
        error!("Application panicked: {}", panic_info);
        eprintln!("gwt panicked: {panic_info}");
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let interactive = matches!(args.command, Commands::Up(_));
    if interactive {
        if let Err(e) = logging::setup_file_logging() {
            eprintln!("Warning: file logging disabled: {e:#}");
        }
        setup_panic_handler();
    } else {
        logging::setup_stderr_logging();
    }

    let result = match args.command {
        Commands::Up(up_args) => cli::up::execute(up_args).await,
        Commands::Hook(hook_args) => cli::hook::execute(hook_args).await,
        Commands::Status(status_args) => cli::status::execute(status_args, args.format).await,
    };

    // Ensure terminal is cleaned up on any error
    if interactive && result.is_err() {
        restore_terminal();
    }
    result
}
