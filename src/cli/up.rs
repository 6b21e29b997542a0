// ABOUTME: `gwt up`: open the repository's tmux session, launch agents, and run the interactive loop

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{resolve_repo, UpArgs};
use crate::app::orchestrator::{BranchEntry, Orchestrator, OrchestratorOptions};
use crate::app::runtime;
use crate::app::termination::ExitGuard;
use crate::config::GwtConfig;
use crate::launch::{ConfiguredLauncher, LaunchSpec};
use crate::notifier::EventSpool;
use crate::panes::reader::{PaneActivity, ReaderPool, ReaderSettings};
use crate::panes::registry::PaneRegistry;
use crate::panes::status::StatusEngine;
use crate::panes::terminate::StopPolicy;
use crate::tmux::{
    check_tmux, generate_session_name, is_inside_tmux, Multiplexer, PaneId, ProcessRunner,
    SessionOptions, TmuxGateway,
};

/// Set by tmux to the pane a client process runs in
const TMUX_PANE_ENV: &str = "TMUX_PANE";

/// Wire every component from `config` into an orchestrator
///
/// Returns the orchestrator and the receiving end of its readers' activity channel.
pub fn build(
    config: &GwtConfig,
    args: &UpArgs,
    gateway: Arc<dyn Multiplexer>,
) -> Result<(Orchestrator, mpsc::UnboundedReceiver<PaneActivity>)> {
    let repo_root = resolve_repo(args.repo.clone())?;
    let registry = Arc::new(
        PaneRegistry::new(Arc::clone(&gateway))
            .with_stop_policy(StopPolicy::with_grace(config.exit.stop_grace())),
    );
    let launcher = Arc::new(ConfiguredLauncher::new(config.agents.clone()));
    let engine = StatusEngine::from_config(&config.panes);
    let spool = EventSpool::new(config.events_dir()?, config.notifier.event_expiry());
    let exit_guard = ExitGuard::new(config.exit.confirm_window());

    let (activity_tx, activity_rx) = mpsc::unbounded_channel();
    let readers = ReaderPool::new(
        gateway,
        ReaderSettings {
            interval: config.panes.reader_interval(),
            tail_lines: config.panes.tail_lines,
            join_timeout: config.panes.reader_join_timeout(),
        },
        activity_tx,
    );

    let branches = args
        .branches
        .iter()
        .map(|(name, path)| BranchEntry::new(name.clone(), path.clone()))
        .collect();

    let options = OrchestratorOptions {
        repo_root,
        agent_id: args.agent.clone(),
        sessions_dir: config.sessions_dir()?,
        enable_mouse: config.tmux.enable_mouse,
    };

    let orchestrator = Orchestrator::new(registry, launcher, engine, spool, exit_guard, options)
        .with_readers(readers)
        .with_branches(branches);
    Ok((orchestrator, activity_rx))
}

/// gwt's own pane, from the value of `$TMUX_PANE`
fn control_pane_from(value: Option<String>) -> Option<PaneId> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| v.starts_with('%'))
        .map(PaneId::new)
}

/// Rerun `gwt up` with the same arguments, from `cwd`
fn relaunch_spec(exe: &Path, args: Vec<String>, cwd: &Path) -> LaunchSpec {
    let mut spec = LaunchSpec::new(exe.to_string_lossy(), cwd);
    spec.args = args;
    spec
}

/// Outside tmux: start a session running this same command, then attach to it
///
/// The copy inside the session finds itself in tmux and takes over there.
fn relaunch_in_session(gateway: &TmuxGateway, args: &UpArgs) -> Result<()> {
    let repo_root = resolve_repo(args.repo.clone())?;
    let repo_name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let existing = gateway.list_sessions().context("Failed to list tmux sessions")?;
    let name = generate_session_name(&repo_name, &existing);

    let exe = std::env::current_exe().context("Failed to locate the gwt executable")?;
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let argv = std::env::args_os()
        .skip(1)
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    gateway
        .spawn_session(&name, &relaunch_spec(&exe, argv, &cwd))
        .context("Failed to start tmux session")?;

    info!("attaching to tmux session {}", name);
    attach_to_session(&name)
}

/// Replace this process with `tmux attach-session`
fn attach_to_session(session_name: &str) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let err = std::process::Command::new("tmux")
        .args(["attach-session", "-t", session_name])
        .exec();
    anyhow::bail!("Failed to attach to session {}: {}", session_name, err)
}

pub async fn execute(args: UpArgs) -> Result<()> {
    let config = GwtConfig::load().context("Failed to load gwt config")?;

    let runner = ProcessRunner::tmux(config.tmux.command_timeout());
    let version = check_tmux(&runner).context("tmux is required")?;
    info!("using tmux {}", version);

    let gateway = TmuxGateway::with_timeout(config.tmux.command_timeout())
        .with_options(SessionOptions {
            history_limit: config.tmux.history_limit,
            return_key: config.tmux.return_key().map(str::to_string),
        })
        .with_split_env(version.supports_split_env())
        .with_full_split(version.supports_full_split());
    if !is_inside_tmux() {
        return relaunch_in_session(&gateway, &args);
    }
    let gateway: Arc<dyn Multiplexer> = Arc::new(gateway);

    let (mut orchestrator, activity_rx) = build(&config, &args, gateway)?;
    match control_pane_from(std::env::var(TMUX_PANE_ENV).ok()) {
        Some(control) => orchestrator
            .adopt_session(&control)
            .context("Failed to take over the current tmux session")?,
        None => {
            warn!("{} is not set; opening a separate tmux session", TMUX_PANE_ENV);
            orchestrator
                .ensure_session()
                .context("Failed to open tmux session")?
        }
    };
    orchestrator.adopt_orphans();

    if !args.no_launch {
        for (branch, worktree) in &args.branches {
            match orchestrator.launch(branch, worktree) {
                Ok(pane_id) => info!("launched {} on {} in {}", args.agent, branch, pane_id),
                Err(e) => warn!("could not launch {} on {}: {}", args.agent, branch, e),
            }
        }
    }

    runtime::run(orchestrator, activity_rx, config.panes.poll_interval()).await
}
