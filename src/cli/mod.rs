// ABOUTME: CLI argument parsing and command routing for gwt
//
// Provides command-line interface for:
// - Launching agents on branches and running the interactive loop (up)
// - Forwarding agent hook events to the running instance (hook)
// - Listing the panes of a repository's session (status)

pub mod hook;
pub mod status;
pub mod up;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run one coding agent per git worktree in tmux panes
#[derive(Parser)]
#[command(name = "gwt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch agents and run the interactive loop
    Up(UpArgs),

    /// Record an agent hook event (reads the JSON payload from stdin)
    Hook(HookArgs),

    /// Show the panes of a repository's session
    Status(StatusArgs),
}

#[derive(clap::Args)]
pub struct UpArgs {
    /// Repository root (defaults to the current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Agent id; looked up in [agents.<id>] of the config
    #[arg(long, default_value = "claude")]
    pub agent: String,

    /// Branch and worktree as NAME=PATH (repeatable)
    #[arg(long = "branch", value_parser = parse_branch_spec)]
    pub branches: Vec<(String, PathBuf)>,

    /// Only show the branch list; launch nothing at startup
    #[arg(long)]
    pub no_launch: bool,
}

#[derive(clap::Args)]
pub struct HookArgs {
    /// Event name; overrides the payload's event_name
    pub event: Option<String>,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Repository root (defaults to the current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,
}

/// Parse `NAME=PATH`
pub fn parse_branch_spec(raw: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got {raw:?}"))?;
    let name = name.trim();
    let path = path.trim();
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got {raw:?}"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

/// Resolve `--repo`, defaulting to the current directory
pub fn resolve_repo(repo: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = match repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    Ok(path.canonicalize().unwrap_or(path))
}
