// ABOUTME: Event loop wiring: terminal input, activity readers, and the poll tick on one task
//
// Keyboard input is read on a dedicated thread and forwarded over a channel so
// the loop can select over input, reader activity, and the poll interval.
// Gateway calls block, so handlers run under `block_in_place`.

use crate::app::events::EventHandler;
use crate::app::focus::FocusState;
use crate::app::orchestrator::Orchestrator;
use crate::panes::model::Pane;
use crate::panes::reader::PaneActivity;
use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::block_in_place;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Restore the terminal; safe to call more than once
pub fn restore_terminal() {
    let _ = terminal::disable_raw_mode();
    let _ = crossterm::execute!(io::stdout(), cursor::Show);
}

fn spawn_input_thread(tx: UnboundedSender<Event>) -> io::Result<()> {
    thread::Builder::new()
        .name("gwt-input".to_string())
        .spawn(move || loop {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            return;
                        }
                    }
                    Err(e) => debug!("terminal read failed: {}", e),
                },
                Ok(false) => {
                    if tx.is_closed() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("terminal poll failed: {}", e);
                    return;
                }
            }
        })?;
    Ok(())
}

/// Run the interactive loop until the user exits
pub async fn run(
    mut orchestrator: Orchestrator,
    mut activity_rx: UnboundedReceiver<PaneActivity>,
    poll_interval: Duration,
) -> Result<()> {
    terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    let result = event_loop(&mut orchestrator, &mut activity_rx, poll_interval).await;
    restore_terminal();
    if !orchestrator.should_quit() {
        // Loop ended on an error; still tear panes down
        block_in_place(|| orchestrator.shutdown());
    }
    result
}

async fn event_loop(
    orchestrator: &mut Orchestrator,
    activity_rx: &mut UnboundedReceiver<PaneActivity>,
    poll_interval: Duration,
) -> Result<()> {
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    spawn_input_thread(key_tx).context("Failed to start input thread")?;

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stdout = io::stdout();

    info!("interactive loop started");
    render(orchestrator, &mut stdout)?;

    while !orchestrator.should_quit() {
        tokio::select! {
            _ = ticker.tick() => {
                let report = block_in_place(|| orchestrator.poll_tick(Instant::now()));
                if !report.changes.is_empty() || !report.removed.is_empty() {
                    debug!("tick: {} changes, {} removed", report.changes.len(), report.removed.len());
                }
            }
            Some(activity) = activity_rx.recv() => {
                orchestrator.on_activity(activity);
                continue;
            }
            maybe_event = key_rx.recv() => {
                let Some(input) = maybe_event else {
                    anyhow::bail!("terminal input closed");
                };
                match input {
                    Event::Key(key) => {
                        if let Some(app_event) = EventHandler::handle_key_event(key, &orchestrator.key_context()) {
                            block_in_place(|| orchestrator.handle_event(app_event, Instant::now()));
                        }
                    }
                    Event::Resize(_, _) => block_in_place(|| orchestrator.apply_layout()),
                    _ => {}
                }
            }
        }

        if !orchestrator.should_quit() {
            render(orchestrator, &mut stdout)?;
        }
    }

    info!("interactive loop finished");
    Ok(())
}

fn pane_line(pane: &Pane, focused: bool) -> String {
    format!(
        "{} {} {:<24} {:<8} {:<8} {}",
        if focused { ">" } else { " " },
        pane.status.indicator(),
        pane.branch,
        pane.status.to_string(),
        pane.pane_id,
        pane.uptime_string()
    )
}

/// Draw the branch list and pane status into the control pane
pub fn render<W: Write>(orchestrator: &Orchestrator, out: &mut W) -> Result<()> {
    let snapshot = orchestrator.snapshot();
    let focus = orchestrator.registry().focus_state();

    let mut lines = vec!["Branches".to_string()];
    for (i, branch) in orchestrator.branches().iter().enumerate() {
        let marker = if i == orchestrator.selected() && focus == FocusState::BranchList {
            ">"
        } else {
            " "
        };
        lines.push(format!("{marker} {}", branch.name));
    }
    lines.push(String::new());
    lines.push(format!("Agents ({})", snapshot.len()));
    for pane in &snapshot {
        lines.push(pane_line(pane, focus.is_pane(&pane.pane_id)));
    }
    lines.push(String::new());
    if let Some(notice) = orchestrator.notice() {
        lines.push(notice.to_string());
    }
    lines.push("Tab focus  Enter launch  x stop  Esc Esc exit".to_string());

    queue!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    for line in lines {
        queue!(out, Print(line), Print("\r\n"))?;
    }
    out.flush()?;
    Ok(())
}
