// ABOUTME: `gwt status`: show the tmux session recorded for a repository and its panes

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use super::{resolve_repo, OutputFormat, StatusArgs};
use crate::config::GwtConfig;
use crate::panes::model::SessionRecord;
use crate::tmux::{GatewayError, Multiplexer, RawPaneRecord, SessionHandle, TmuxGateway};

/// JSON output structure for the status command
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub session_name: String,
    pub repo_root: String,
    pub created_at: String,
    pub is_running: bool,
    pub panes: Vec<PaneOutput>,
}

#[derive(Debug, Serialize)]
pub struct PaneOutput {
    pub pane_id: String,
    pub command: String,
    pub pid: Option<u32>,
    pub dead: bool,
}

impl From<&RawPaneRecord> for PaneOutput {
    fn from(record: &RawPaneRecord) -> Self {
        Self {
            pane_id: record.pane_id.to_string(),
            command: record.command.clone(),
            pid: record.pid,
            dead: record.dead,
        }
    }
}

/// Build the report for `record` by asking the multiplexer for its panes
pub fn collect(record: &SessionRecord, gateway: &dyn Multiplexer) -> Result<StatusOutput> {
    let handle = SessionHandle::new(record.session_name.clone());
    let (is_running, panes) = match gateway.list_panes(&handle) {
        Ok(panes) => (true, panes.iter().map(PaneOutput::from).collect()),
        Err(GatewayError::NotFound { .. }) => (false, Vec::new()),
        Err(e) => return Err(e).context("Failed to list panes"),
    };

    Ok(StatusOutput {
        session_name: record.session_name.clone(),
        repo_root: record.repo_root.display().to_string(),
        created_at: record.created_at.to_rfc3339(),
        is_running,
        panes,
    })
}

fn print_text(output: &StatusOutput) {
    let state = if output.is_running {
        "\x1b[32m●\x1b[0m Running"
    } else {
        "\x1b[31m●\x1b[0m Gone"
    };

    println!("Session: {}", output.session_name);
    println!("{}", "━".repeat(44));
    println!("Repository:   {}", output.repo_root);
    println!("Status:       {state}");
    println!("Created:      {}", output.created_at);
    if output.panes.is_empty() {
        return;
    }
    println!();
    println!("Panes:");
    for pane in &output.panes {
        let pid = pane.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
        let dead = if pane.dead { " (dead)" } else { "" };
        println!("  {:<6} {:<16} pid {pid}{dead}", pane.pane_id, pane.command);
    }
}

#[allow(clippy::unused_async)]
pub async fn execute(args: StatusArgs, format: OutputFormat) -> Result<()> {
    let config = GwtConfig::load()?;
    let repo_root = resolve_repo(args.repo)?;
    let record = SessionRecord::find_for_repo(&config.sessions_dir()?, &repo_root)
        .context("Failed to read session records")?
        .ok_or_else(|| {
            anyhow!(
                "No gwt session recorded for {}. Use 'gwt up' to start one.",
                repo_root.display()
            )
        })?;

    let gateway = TmuxGateway::with_timeout(config.tmux.command_timeout());
    let output = collect(&record, &gateway)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize status")?
        ),
        OutputFormat::Text => print_text(&output),
    }
    Ok(())
}
